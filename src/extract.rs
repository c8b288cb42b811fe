//! Line-oriented scan of an install script into an [`InstallPlan`].
//!
//! This is keyword matching, not parsing: any line is classifiable and the
//! scan never fails on unusual script content.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::plan::{Bucket, InstallPlan};
use crate::text::{self, Encoding};

pub const DEFAULT_COMMENT_MARKER: char = '#';

/// One line of the script as read from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLine<'a> {
    pub raw: &'a str,
    pub trimmed: &'a str,
}

impl<'a> ScriptLine<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            trimmed: raw.trim(),
        }
    }

    /// Blank lines and comments never reach a bucket.
    pub fn is_skipped(&self, comment_marker: char) -> bool {
        self.trimmed.is_empty() || self.trimmed.starts_with(comment_marker)
    }

    pub fn bucket(&self) -> Bucket {
        classify(self.trimmed)
    }
}

/// Bucket for a single trimmed line. First match wins: winget, choco, pip,
/// then other.
pub fn classify(line: &str) -> Bucket {
    let lower = line.to_lowercase();
    let installs = lower.contains("install");

    if lower.contains("winget") && installs {
        Bucket::Winget
    } else if (lower.contains("choco ") || lower.contains("choco.exe")) && installs {
        Bucket::Choco
    } else if (lower.contains("pip ") || lower.contains("pip3 ") || lower.contains("python -m pip"))
        && installs
    {
        Bucket::Pip
    } else {
        Bucket::Other
    }
}

#[derive(Debug, Clone)]
pub struct PlanExtractor {
    comment_marker: char,
}

impl Default for PlanExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMENT_MARKER)
    }
}

impl PlanExtractor {
    pub fn new(comment_marker: char) -> Self {
        Self { comment_marker }
    }

    pub fn comment_marker(&self) -> char {
        self.comment_marker
    }

    /// Scan the script at `path`. A missing file yields an empty plan with
    /// `is_found() == false`; other read failures are errors.
    pub fn extract(&self, path: &Path) -> Result<InstallPlan> {
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "script not found");
            return Ok(InstallPlan::missing());
        }

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(InstallPlan::missing());
            }
            Err(source) => {
                return Err(Error::ScriptRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let decoded = text::decode(&bytes);
        if decoded.encoding == Encoding::Windows1252 {
            tracing::debug!(path = %path.display(), "script is not utf-8, read as windows-1252");
        }

        let plan = self.scan(&decoded.text);
        tracing::info!(
            path = %path.display(),
            winget = plan.lines(Bucket::Winget).len(),
            choco = plan.lines(Bucket::Choco).len(),
            pip = plan.lines(Bucket::Pip).len(),
            other = plan.lines(Bucket::Other).len(),
            "plan extracted"
        );
        Ok(plan)
    }

    /// Classify already-decoded script text.
    pub fn scan(&self, script: &str) -> InstallPlan {
        let mut plan = InstallPlan::found_empty();
        // A lone `\r` also ends a line; the empty piece inside `\r\n` is
        // skipped like any blank line.
        for line in script.split(['\r', '\n']).map(ScriptLine::new) {
            if line.is_skipped(self.comment_marker) {
                continue;
            }
            plan.push(line.bucket(), line.trimmed.to_string());
        }
        plan
    }
}

/// Scan with the default `#` comment marker.
pub fn extract_plan(path: &Path) -> Result<InstallPlan> {
    PlanExtractor::default().extract(path)
}
