/// Application interaction modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Normal mode: single-key actions and scrolling.
    #[default]
    Normal,
    /// Command palette (`:` prefix).
    Command,
    /// Key reference overlay.
    Help,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Normal => "NORMAL",
            Mode::Command => "COMMAND",
            Mode::Help => "HELP",
        }
    }
}
