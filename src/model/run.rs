/// Exit code reported when no process exit code exists.
pub const FAILURE_EXIT_CODE: i32 = -1;

/// Terminal state of a streamer run. Exactly one is produced per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process ran and exited with this code.
    Completed(i32),
    /// The interpreter could not be spawned.
    StartFailed,
    /// The script did not exist; nothing was spawned.
    MissingScript,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed(code) => *code,
            RunOutcome::StartFailed | RunOutcome::MissingScript => FAILURE_EXIT_CODE,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code() == 0
    }

    /// Closing line appended to the log view once a run ends.
    pub fn summary(&self) -> String {
        let code = self.exit_code();
        if code == 0 {
            "Installation completed successfully.".to_string()
        } else {
            format!("Installation finished with errors. Exit code: {code}")
        }
    }
}

/// Host-side view of the streamer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    NotStarted,
    Running,
    Finished(RunOutcome),
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }

    pub fn label(&self) -> String {
        match self {
            RunState::NotStarted => "idle".to_string(),
            RunState::Running => "running".to_string(),
            RunState::Finished(RunOutcome::Completed(code)) => format!("exit {code}"),
            RunState::Finished(RunOutcome::StartFailed) => "start failed".to_string(),
            RunState::Finished(RunOutcome::MissingScript) => "script missing".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_states_report_sentinel() {
        assert_eq!(RunOutcome::StartFailed.exit_code(), FAILURE_EXIT_CODE);
        assert_eq!(RunOutcome::MissingScript.exit_code(), FAILURE_EXIT_CODE);
        assert_eq!(RunOutcome::Completed(3).exit_code(), 3);
    }

    #[test]
    fn summary_depends_on_exit_code() {
        assert_eq!(
            RunOutcome::Completed(0).summary(),
            "Installation completed successfully."
        );
        assert_eq!(
            RunOutcome::StartFailed.summary(),
            "Installation finished with errors. Exit code: -1"
        );
    }

    #[test]
    fn only_running_is_running() {
        assert!(RunState::Running.is_running());
        assert!(!RunState::NotStarted.is_running());
        assert!(!RunState::Finished(RunOutcome::Completed(0)).is_running());
    }
}
