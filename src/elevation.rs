//! Administrator check performed once at startup.
//!
//! Package managers such as winget and choco need an elevated shell for
//! machine-wide installs. When required and missing, the program asks the OS
//! to start a new elevated copy of itself and the current copy exits.

use std::ffi::OsString;
use std::io;

/// Platform seam for the privilege check and the relaunch.
pub trait Privileges {
    fn is_elevated(&self) -> bool;

    /// Start an elevated copy of the current executable with `args`.
    fn relaunch_elevated(&self, args: &[String]) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// Keep running in this process.
    Continue,
    /// An elevated copy was started; this process should exit.
    Relaunched,
}

pub fn check_elevation(
    privileges: &impl Privileges,
    required: bool,
    args: &[String],
) -> Startup {
    if !required || privileges.is_elevated() {
        return Startup::Continue;
    }

    match privileges.relaunch_elevated(args) {
        Ok(()) => {
            tracing::info!("relaunched with administrator rights");
            Startup::Relaunched
        }
        Err(err) => {
            tracing::warn!("elevation declined or failed, continuing without it: {err}");
            Startup::Continue
        }
    }
}

/// Arguments to hand to the relaunched copy, without the program name.
/// Non-Unicode arguments are converted lossily rather than rejected.
pub fn relaunch_args(args: impl IntoIterator<Item = OsString>) -> Vec<String> {
    args.into_iter()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

/// Quote each argument for a Windows command line.
pub fn quote_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| quote_arg(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Backslashes are literal unless they precede a quote, so a run of them is
/// doubled before an embedded quote and before the closing quote.
fn quote_arg(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    let mut backslashes = 0;
    for ch in arg.chars() {
        match ch {
            '\\' => backslashes += 1,
            '"' => {
                quoted.extend(std::iter::repeat_n('\\', backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            _ => {
                quoted.extend(std::iter::repeat_n('\\', backslashes));
                quoted.push(ch);
                backslashes = 0;
            }
        }
    }
    quoted.extend(std::iter::repeat_n('\\', backslashes * 2));
    quoted.push('"');
    quoted
}

/// The real operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPrivileges;

#[cfg(windows)]
impl Privileges for SystemPrivileges {
    fn is_elevated(&self) -> bool {
        unsafe { windows_sys::Win32::UI::Shell::IsUserAnAdmin() != 0 }
    }

    fn relaunch_elevated(&self, args: &[String]) -> io::Result<()> {
        use std::ffi::OsStr;
        use std::iter::once;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::UI::Shell::ShellExecuteW;
        use windows_sys::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

        fn wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(once(0)).collect()
        }

        let exe = std::env::current_exe()?;
        let verb = wide(OsStr::new("runas"));
        let file = wide(exe.as_os_str());
        let params = wide(OsStr::new(&quote_args(args)));

        let result = unsafe {
            ShellExecuteW(
                0,
                verb.as_ptr(),
                file.as_ptr(),
                params.as_ptr(),
                std::ptr::null(),
                SW_SHOWNORMAL,
            )
        };

        // ShellExecuteW reports success with a value greater than 32.
        if result as isize > 32 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(not(windows))]
impl Privileges for SystemPrivileges {
    fn is_elevated(&self) -> bool {
        true
    }

    fn relaunch_elevated(&self, _args: &[String]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "elevation is only supported on Windows",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakePrivileges {
        elevated: bool,
        relaunch_ok: bool,
        relaunched_with: RefCell<Option<Vec<String>>>,
    }

    impl FakePrivileges {
        fn new(elevated: bool, relaunch_ok: bool) -> Self {
            Self {
                elevated,
                relaunch_ok,
                relaunched_with: RefCell::new(None),
            }
        }
    }

    impl Privileges for FakePrivileges {
        fn is_elevated(&self) -> bool {
            self.elevated
        }

        fn relaunch_elevated(&self, args: &[String]) -> io::Result<()> {
            *self.relaunched_with.borrow_mut() = Some(args.to_vec());
            if self.relaunch_ok {
                Ok(())
            } else {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "cancelled"))
            }
        }
    }

    fn args() -> Vec<String> {
        vec!["--script".to_string(), "C:\\tools\\installer.ps1".to_string()]
    }

    #[test]
    fn not_required_never_relaunches() {
        let fake = FakePrivileges::new(false, true);
        assert_eq!(check_elevation(&fake, false, &args()), Startup::Continue);
        assert!(fake.relaunched_with.borrow().is_none());
    }

    #[test]
    fn already_elevated_continues() {
        let fake = FakePrivileges::new(true, true);
        assert_eq!(check_elevation(&fake, true, &args()), Startup::Continue);
        assert!(fake.relaunched_with.borrow().is_none());
    }

    #[test]
    fn relaunches_with_same_arguments() {
        let fake = FakePrivileges::new(false, true);
        assert_eq!(check_elevation(&fake, true, &args()), Startup::Relaunched);
        assert_eq!(fake.relaunched_with.borrow().as_deref(), Some(args().as_slice()));
    }

    #[test]
    fn declined_relaunch_continues() {
        let fake = FakePrivileges::new(false, false);
        assert_eq!(check_elevation(&fake, true, &args()), Startup::Continue);
    }

    #[test]
    fn quote_args_wraps_each_argument() {
        let quoted = quote_args(&["a b".to_string(), "say \"hi\"".to_string()]);
        assert_eq!(quoted, "\"a b\" \"say \\\"hi\\\"\"");
    }

    #[test]
    fn quote_args_keeps_trailing_backslashes_literal() {
        let quoted = quote_args(&[
            "--script".to_string(),
            r"C:\tools\".to_string(),
            r"a\b".to_string(),
            r#"x\"y"#.to_string(),
        ]);
        assert_eq!(quoted, r#""--script" "C:\tools\\" "a\b" "x\\\"y""#);
    }

    #[test]
    fn relaunch_args_skip_program_name() {
        let args = relaunch_args(["wdt.exe", "run", "--no-elevate"].map(OsString::from));
        assert_eq!(args, ["run", "--no-elevate"]);
    }

    #[cfg(unix)]
    #[test]
    fn relaunch_args_tolerate_non_unicode() {
        use std::os::unix::ffi::OsStringExt;

        let args = relaunch_args([
            OsString::from("wdt"),
            OsString::from_vec(b"--script=caf\xE9.ps1".to_vec()),
        ]);
        assert_eq!(args, ["--script=caf\u{FFFD}.ps1"]);
    }
}
