//! Meta file parsing for isolate
//!
//! After each run the isolator writes a key-value meta file (time used,
//! memory, exit status). This module parses it and folds the raw entries
//! into a [`SandboxMeta`].

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::isolate::IsolateError;
use crate::types::{SandboxMeta, SandboxStatus};

/// Error from strict meta file parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("meta file parse error at line {line_number}: {message} (line: {line:?})")]
pub struct MetaParseError {
    /// Line number (1-indexed) where the error occurred
    pub line_number: usize,
    /// The problematic line content
    pub line: String,
    /// Description of the error
    pub message: String,
}

/// Parsed meta file from Isolate.
#[derive(Debug, Clone, Default)]
pub struct MetaFile {
    /// Raw key-value pairs from the meta file
    pub entries: HashMap<String, String>,
}

impl MetaFile {
    /// Lenient parse: malformed lines are skipped.
    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();

        // Entries are colon-separated; values may themselves contain colons.
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                if !key.is_empty() {
                    entries.insert(key.to_owned(), value.trim().to_owned());
                }
            }
        }

        Self { entries }
    }

    /// Strict parse: any non-empty line without a colon separator, or with an
    /// empty key, is an error.
    pub fn try_parse(content: &str) -> Result<Self, MetaParseError> {
        let mut entries = HashMap::new();

        for (line_idx, line) in content.lines().enumerate() {
            let line_number = line_idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match trimmed.split_once(':') {
                Some((key, value)) => {
                    let key = key.trim();
                    if key.is_empty() {
                        return Err(MetaParseError {
                            line_number,
                            line: line.to_owned(),
                            message: "empty key before colon".to_owned(),
                        });
                    }
                    entries.insert(key.to_owned(), value.trim().to_owned());
                }
                None => {
                    return Err(MetaParseError {
                        line_number,
                        line: line.to_owned(),
                        message: "missing colon separator".to_owned(),
                    });
                }
            }
        }

        Ok(Self { entries })
    }

    /// Load and parse a meta file from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, IsolateError> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Ok(Self::parse(&content))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Termination status, with OOM kills reported as `MemoryExceeded`.
    pub fn status(&self) -> SandboxStatus {
        let status = SandboxStatus::from_code(self.get("status"));
        if status == SandboxStatus::Signaled && self.oom_killed() {
            return SandboxStatus::MemoryExceeded;
        }
        status
    }

    /// Whether the kernel killed the process for exceeding its memory limit.
    ///
    /// Isolate sets `cg-oom-killed` in cgroup mode; without cgroups the only
    /// trace is the out-of-memory wording of the kill message.
    fn oom_killed(&self) -> bool {
        if self.get("cg-oom-killed").is_some() {
            return true;
        }
        self.get("message")
            .map(|m| {
                let m = m.to_lowercase();
                m.contains("out of memory") || m.contains("memory limit")
            })
            .unwrap_or(false)
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.get_i32("exitcode")
    }

    pub fn signal(&self) -> Option<i32> {
        self.get_i32("exitsig")
    }

    pub fn time(&self) -> f64 {
        self.get_f64("time").unwrap_or(0.0)
    }

    pub fn wall_time(&self) -> f64 {
        self.get_f64("time-wall").unwrap_or(0.0)
    }

    pub fn memory(&self) -> u64 {
        self.get_u64("max-rss").unwrap_or(0)
    }

    pub fn message(&self) -> Option<String> {
        self.get("message").map(String::from)
    }

    /// Fold into the structured metadata the engine reports.
    pub fn to_meta(&self) -> SandboxMeta {
        SandboxMeta {
            status: self.status(),
            exitcode: self.exit_code(),
            signal: self.signal(),
            time: self.time(),
            wall_time: self.wall_time(),
            memory: self.memory(),
            message: self.message(),
        }
    }
}
