use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The script exists but could not be read.
    #[error("cannot read script {}: {source}", path.display())]
    ScriptRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot open run log {}: {source}", path.display())]
    LogOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The background run thread could not be created.
    #[error("failed to start run worker: {0}")]
    Worker(#[source] io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_read_names_the_path() {
        let err = Error::ScriptRead {
            path: PathBuf::from("installer.ps1"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "cannot read script installer.ps1: denied");
    }

    #[test]
    fn config_helper_wraps_message() {
        let err = Error::config("bad marker");
        assert_eq!(err.to_string(), "configuration error: bad marker");
    }
}
