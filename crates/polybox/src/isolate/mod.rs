//! IOI Isolate adapter
//!
//! Wraps the external `isolate` sandbox: command building, box lifecycle,
//! meta-file parsing, and the path-scrubbing rule that keeps per-box host
//! paths out of sandboxed command lines.
//!
//! References for Isolate's CLI arguments and meta-files:
//! - https://www.ucw.cz/isolate/isolate.1.html
//! - https://github.com/ioi/isolate

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

pub use crate::isolate::command::{IsolateAction, IsolateCommand};
pub use crate::isolate::meta::{MetaFile, MetaParseError};
pub use crate::isolate::sandbox::{BoxPool, RunOutcome, Sandbox};

mod command;
mod meta;
mod sandbox;

/// Pattern of the isolator's per-box host root.
const BOX_PREFIX_PATTERN: &str = r"/var/(local/)?lib/isolate/[0-9]+";

/// Errors from isolator operations.
///
/// These are engine errors: a failing *sandboxed program* is reported through
/// [`RunOutcome`], never through this type.
#[derive(Debug, Error)]
pub enum IsolateError {
    #[error("failed to initialize box {id}: {message}")]
    InitFailed { id: u32, message: String },

    #[error("failed to cleanup box {id}: {message}")]
    CleanupFailed { id: u32, message: String },

    #[error("failed to spawn isolate process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("isolate produced no meta file (setup failure): {stderr}")]
    SetupFailed { stderr: String },

    #[error("isolate command failed: {0}")]
    CommandFailed(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("no available boxes in pool")]
    PoolExhausted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Strip every per-box host prefix from `s`.
///
/// The isolator mounts each box's working directory at `/box`; host-side the
/// same directory lives under `/var/(local/)?lib/isolate/<N>`. Any path
/// handed to a sandboxed child must be stripped of that prefix so the child
/// sees clean `/box`-relative paths.
pub fn scrub_box_prefix(s: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(BOX_PREFIX_PATTERN).expect("box prefix pattern is valid"));
    pattern.replace_all(s, "").into_owned()
}
