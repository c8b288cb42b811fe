use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "wdt",
    about = "Windows Dev Tools Installer: preview and run an install script",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Script to preview and run (default: installer.ps1 next to the executable)
    #[arg(long, global = true)]
    pub script: Option<PathBuf>,

    /// Where the run transcript is written (default: installer.log next to the executable)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Config file to layer over the defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Do not ask for administrator rights
    #[arg(long, global = true)]
    pub no_elevate: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print the install plan and exit
    Plan,

    /// Run the script without the interface, streaming output to stdout
    Run,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_opens_interface() {
        let cli = Cli::try_parse_from(["wdt"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.no_elevate);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["wdt", "run", "--script", "setup.ps1", "--no-elevate"])
            .unwrap();
        assert_eq!(cli.command, Some(Command::Run));
        assert_eq!(cli.script, Some(PathBuf::from("setup.ps1")));
        assert!(cli.no_elevate);
    }
}
