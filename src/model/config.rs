use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::extract::PlanExtractor;
use crate::stream::{Interpreter, RunRequest};

const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub script: ScriptConfig,
    pub run: RunConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub require_admin: bool,
    pub watch_script: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptConfig {
    pub path: String,
    pub comment_marker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub interpreter: String,
    pub interpreter_args: Vec<String>,
    pub log_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    pub tick_ms: u64,
    pub max_log_lines: usize,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config. Keys in the
    /// user file override defaults one by one.
    pub fn load(user_path: Option<&Path>) -> Result<Self> {
        let user = match user_path {
            // A file named on the command line must exist.
            Some(path) => Some(read_user_config(path)?),
            None => match default_user_config_path() {
                Some(path) if path.exists() => Some(read_user_config(&path)?),
                _ => None,
            },
        };

        Self::from_layers(DEFAULTS, user.as_deref())
    }

    pub fn from_layers(defaults: &str, user: Option<&str>) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(defaults)?;
        if let Some(user) = user {
            let overlay: toml::Table = toml::from_str(user)?;
            merge_tables(&mut table, overlay);
        }

        let config = toml::Value::Table(table).try_into::<AppConfig>()?;
        config.comment_marker()?;
        if config.ui.tick_ms == 0 {
            return Err(Error::config("ui.tick_ms must be greater than zero"));
        }
        Ok(config)
    }

    pub fn comment_marker(&self) -> Result<char> {
        let mut chars = self.script.comment_marker.chars();
        match (chars.next(), chars.next()) {
            (Some(marker), None) if !marker.is_whitespace() => Ok(marker),
            _ => Err(Error::config(format!(
                "script.comment_marker must be a single character, got {:?}",
                self.script.comment_marker
            ))),
        }
    }

    pub fn extractor(&self) -> Result<PlanExtractor> {
        Ok(PlanExtractor::new(self.comment_marker()?))
    }

    pub fn interpreter(&self) -> Interpreter {
        let program = self.run.interpreter.trim();
        if program.is_empty() {
            let default = Interpreter::platform_default();
            return Interpreter::new(default.program, self.run.interpreter_args.clone());
        }
        Interpreter::new(program, self.run.interpreter_args.clone())
    }

    pub fn script_path(&self, base: &Path) -> PathBuf {
        resolve_path(base, &self.script.path)
    }

    pub fn log_path(&self, base: &Path) -> PathBuf {
        resolve_path(base, &self.run.log_file)
    }

    pub fn run_request(&self, base: &Path) -> RunRequest {
        RunRequest::new(self.script_path(base), self.log_path(base))
            .with_interpreter(self.interpreter())
    }
}

/// Directory relative paths are resolved against: the one holding the
/// executable, or the working directory if that cannot be determined.
pub fn base_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "wdt")
}

fn read_user_config(path: &Path) -> Result<String> {
    tracing::info!(path = %path.display(), "loading user config");
    fs::read_to_string(path)
        .map_err(|err| Error::config(format!("cannot read config {}: {err}", path.display())))
}

fn default_user_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, incoming),
                _ => {
                    base.insert(key, toml::Value::Table(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn resolve_path(base: &Path, raw: &str) -> PathBuf {
    let path = expand_tilde(raw);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn expand_tilde(raw: &str) -> PathBuf {
    if !raw.starts_with('~') {
        return PathBuf::from(raw);
    }

    if let Some(base_dirs) = directories::BaseDirs::new() {
        let home = base_dirs.home_dir().to_string_lossy();
        return PathBuf::from(raw.replacen('~', &home, 1));
    }

    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let config = AppConfig::from_layers(DEFAULTS, None).unwrap();
        assert!(config.general.require_admin);
        assert_eq!(config.script.path, "installer.ps1");
        assert_eq!(config.comment_marker().unwrap(), '#');
        assert_eq!(config.run.log_file, "installer.log");
        assert_eq!(
            config.run.interpreter_args,
            ["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"]
        );
    }

    #[test]
    fn user_layer_overrides_single_keys() {
        let user = "[script]\npath = \"setup.ps1\"\n\n[ui]\nmax_log_lines = 10\n";
        let config = AppConfig::from_layers(DEFAULTS, Some(user)).unwrap();

        assert_eq!(config.script.path, "setup.ps1");
        assert_eq!(config.script.comment_marker, "#");
        assert_eq!(config.ui.max_log_lines, 10);
        assert_eq!(config.ui.tick_ms, 50);
    }

    #[test]
    fn multi_char_marker_is_rejected() {
        let user = "[script]\ncomment_marker = \"//\"\n";
        let err = AppConfig::from_layers(DEFAULTS, Some(user)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_user_file_is_a_toml_error() {
        let err = AppConfig::from_layers(DEFAULTS, Some("[script\n")).unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn empty_interpreter_uses_platform_default() {
        let config = AppConfig::from_layers(DEFAULTS, None).unwrap();
        let interpreter = config.interpreter();
        assert_eq!(interpreter.program, Interpreter::platform_default().program);

        let user = "[run]\ninterpreter = \"pwsh\"\ninterpreter_args = [\"-File\"]\n";
        let config = AppConfig::from_layers(DEFAULTS, Some(user)).unwrap();
        assert_eq!(config.interpreter(), Interpreter::new("pwsh", ["-File"]));
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let config = AppConfig::from_layers(DEFAULTS, None).unwrap();
        let base = Path::new("/opt/wdt");
        assert_eq!(config.script_path(base), base.join("installer.ps1"));
        assert_eq!(config.log_path(base), base.join("installer.log"));
    }

    #[test]
    fn load_reads_explicit_user_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[general]\nrequire_admin = false\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(!config.general.require_admin);
        assert!(config.general.watch_script);
    }

    #[test]
    fn explicit_missing_user_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nope.toml");

        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("nope.toml")));
    }
}
