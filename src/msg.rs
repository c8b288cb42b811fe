use crossterm::event::KeyEvent;
use std::path::PathBuf;

/// All possible messages that drive state transitions.
#[derive(Debug)]
pub enum Msg {
    // -- Input events (raw)
    Key(KeyEvent),
    Resize(u16, u16),

    // -- Actions
    StartRun,
    ReloadPlan,
    ClearLog,
    Command(String),

    // -- File I/O
    ScriptChanged(PathBuf),

    // -- System
    Tick,
    Quit,
}
