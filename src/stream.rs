//! Runs the install script under its interpreter and streams the combined
//! output to a listener and a transcript file.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, LineWriter, PipeReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::model::run::{FAILURE_EXIT_CODE, RunOutcome};
use crate::text;

/// Arguments that make PowerShell run a file non-interactively, skipping the
/// user profile and bypassing the execution policy for this process only.
pub const POWERSHELL_ARGS: [&str; 4] = ["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"];

/// Program plus the arguments placed before the script path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub program: String,
    pub args: Vec<String>,
}

impl Interpreter {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn powershell(program: impl Into<String>) -> Self {
        Self::new(program, POWERSHELL_ARGS)
    }

    /// `powershell.exe` on Windows, `pwsh` elsewhere.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Self::powershell("powershell.exe")
        } else {
            Self::powershell("pwsh")
        }
    }

    fn command(&self, script: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(script)
            .stdin(Stdio::null());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        cmd
    }

    /// Spawn with stdout and stderr sharing one pipe, so the reader sees lines
    /// in the order the child wrote them.
    fn spawn_merged(&self, script: &Path) -> io::Result<(Child, PipeReader)> {
        let (reader, writer) = io::pipe()?;
        let mut cmd = self.command(script);
        cmd.stdout(writer.try_clone()?).stderr(writer);
        let child = cmd.spawn()?;
        // The command still owns our copies of the write end; the reader only
        // reaches end of file once those are closed.
        drop(cmd);
        Ok((child, reader))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::platform_default()
    }
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub script: PathBuf,
    pub log_path: PathBuf,
    pub interpreter: Interpreter,
}

impl RunRequest {
    pub fn new(script: impl Into<PathBuf>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            log_path: log_path.into(),
            interpreter: Interpreter::default(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: Interpreter) -> Self {
        self.interpreter = interpreter;
        self
    }
}

/// Run the script to completion on the current thread.
///
/// `on_line` receives every output line in arrival order, including the
/// single diagnostic line emitted when the run cannot start. `on_done` is
/// called exactly once with the exit code, or [`FAILURE_EXIT_CODE`] when no
/// process ran.
pub fn run_script(
    request: &RunRequest,
    mut on_line: impl FnMut(&str),
    on_done: impl FnOnce(i32),
) -> RunOutcome {
    let outcome = stream(request, &mut on_line);
    on_done(outcome.exit_code());
    outcome
}

fn stream(request: &RunRequest, on_line: &mut dyn FnMut(&str)) -> RunOutcome {
    if !request.script.is_file() {
        let name = request
            .script
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| request.script.display().to_string());
        tracing::warn!(script = %request.script.display(), "run requested for missing script");
        on_line(&format!("Error: {name} not found!"));
        return RunOutcome::MissingScript;
    }

    let (mut child, output) = match request.interpreter.spawn_merged(&request.script) {
        Ok(spawned) => spawned,
        Err(source) => {
            on_line(&format!("Failed to start installer: {source}"));
            let err = Error::Spawn {
                program: request.interpreter.program.clone(),
                source,
            };
            tracing::error!("{err}");
            return RunOutcome::StartFailed;
        }
    };

    tracing::info!(
        program = %request.interpreter.program,
        script = %request.script.display(),
        pid = child.id(),
        "run started"
    );

    mirror_output(&request.log_path, output, on_line);

    match child.wait() {
        Ok(status) => {
            let code = status.code().unwrap_or(FAILURE_EXIT_CODE);
            tracing::info!(code, "run exited");
            RunOutcome::Completed(code)
        }
        Err(err) => {
            tracing::error!("waiting for installer failed: {err}");
            on_line(&format!("Failed to wait for installer: {err}"));
            RunOutcome::Completed(FAILURE_EXIT_CODE)
        }
    }
}

/// Forward each output line to `on_line` and the transcript. The transcript is
/// closed when this returns, before the process is waited on.
fn mirror_output(log_path: &Path, output: impl Read, on_line: &mut dyn FnMut(&str)) {
    let mut log = match open_log(log_path) {
        Ok(log) => Some(log),
        Err(err) => {
            tracing::warn!("{err}");
            on_line(&format!("Warning: {err}"));
            None
        }
    };

    let mut reader = BufReader::new(output);
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!("reading child output failed: {err}");
                break;
            }
        }

        let line = text::decode_line(&raw);
        on_line(&line);

        if let Some(writer) = log.as_mut() {
            if let Err(err) = writeln!(writer, "{line}") {
                tracing::warn!(path = %log_path.display(), "run log write failed: {err}");
                on_line(&format!("Warning: run log write failed: {err}"));
                log = None;
            }
        }
    }

    if let Some(mut writer) = log {
        if let Err(err) = writer.flush() {
            tracing::warn!(path = %log_path.display(), "run log flush failed: {err}");
        }
    }
}

fn open_log(path: &Path) -> Result<LineWriter<File>> {
    let log_open = |source| Error::LogOpen {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(log_open)?;
    }
    File::create(path).map(LineWriter::new).map_err(log_open)
}

/// A run executing on its own thread. Lines arrive on one channel; the
/// outcome arrives once, after the last line.
pub struct RunHandle {
    lines: Receiver<String>,
    outcome: Receiver<RunOutcome>,
    worker: JoinHandle<()>,
}

/// Start `run_script` on a background thread.
pub fn spawn_run(request: RunRequest) -> Result<RunHandle> {
    let (line_tx, lines) = mpsc::channel::<String>();
    let (outcome_tx, outcome) = mpsc::sync_channel::<RunOutcome>(1);

    let worker = thread::Builder::new()
        .name("wdt-run".to_string())
        .spawn(move || {
            let outcome = run_script(
                &request,
                |line| {
                    let _ = line_tx.send(line.to_string());
                },
                |code| tracing::debug!(code, "run reported done"),
            );
            drop(line_tx);
            let _ = outcome_tx.send(outcome);
        })
        .map_err(Error::Worker)?;

    Ok(RunHandle {
        lines,
        outcome,
        worker,
    })
}

impl RunHandle {
    /// Non-blocking: the lines received so far and, if the run has ended, its
    /// outcome. Once an outcome is returned every line has been returned too.
    pub fn poll(&self) -> (Vec<String>, Option<RunOutcome>) {
        let outcome = match self.outcome.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                tracing::error!("run worker exited without reporting an outcome");
                Some(RunOutcome::Completed(FAILURE_EXIT_CODE))
            }
        };
        let lines = self.lines.try_iter().collect();
        (lines, outcome)
    }

    /// Block until the run ends, handing each remaining line to `on_line`.
    pub fn wait(self, mut on_line: impl FnMut(String)) -> RunOutcome {
        for line in self.lines.iter() {
            on_line(line);
        }
        let outcome = self
            .outcome
            .recv()
            .unwrap_or(RunOutcome::Completed(FAILURE_EXIT_CODE));
        let _ = self.worker.join();
        outcome
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}
