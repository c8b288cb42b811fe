/// Severity of a streamed log line, guessed from its wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTone {
    Error,
    Success,
    Warning,
    Normal,
}

impl LogTone {
    pub fn of(line: &str) -> Self {
        let lower = line.to_lowercase();
        if ["error", "failed", "not found"].iter().any(|k| lower.contains(k)) {
            LogTone::Error
        } else if ["success", "completed", "done"].iter().any(|k| lower.contains(k)) {
            LogTone::Success
        } else if lower.contains("warning") {
            LogTone::Warning
        } else {
            LogTone::Normal
        }
    }
}
