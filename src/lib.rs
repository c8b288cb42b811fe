//! Core of the Windows Dev Tools Installer: script plan preview and the
//! background process streamer. The `wdt` binary is a thin shell over this.

pub mod elevation;
pub mod error;
pub mod extract;
pub mod model;
pub mod render;
pub mod stream;
pub mod text;
pub mod tone;

pub use error::{Error, Result};
pub use extract::{PlanExtractor, extract_plan};
pub use model::config::AppConfig;
pub use model::plan::{Bucket, InstallPlan};
pub use model::run::{FAILURE_EXIT_CODE, RunOutcome, RunState};
pub use render::{render_missing, render_plan};
pub use stream::{Interpreter, RunHandle, RunRequest, run_script, spawn_run};
