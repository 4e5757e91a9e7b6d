//! External program descriptors
//!
//! A [`Program`] is a named binary on the host with a fixed argument prefix,
//! an environment overlay, and optional version-probe metadata. The binary is
//! resolved through `PATH` once, at construction; whether it resolved decides
//! if the enclosing language can be registered.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Default pattern for extracting a version token from probe output.
const VERSION_PATTERN: &str = r"[0-9]+(\.[0-9]+)+";

/// How to ask a program for its version.
#[derive(Debug, Clone)]
pub struct VersionProbe {
    /// Flag passed as the sole argument (e.g. `--version`, `-v`, `version`)
    pub flag: String,

    /// Number of leading output lines searched for the version token
    pub max_lines: usize,

    /// Pattern the version token must match
    pub pattern: Regex,
}

impl VersionProbe {
    /// Probe with a non-default flag.
    pub fn with_flag(flag: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            ..Default::default()
        }
    }
}

impl Default for VersionProbe {
    fn default() -> Self {
        Self {
            flag: "--version".to_owned(),
            max_lines: 1,
            pattern: Regex::new(VERSION_PATTERN).expect("version pattern is valid"),
        }
    }
}

/// Introspection snapshot for a program, as exposed by the registry.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramInfo {
    /// Probed version token, `null` when the program has no probe
    pub version: Option<String>,

    /// Fixed argument prefix
    pub opts: Vec<String>,
}

/// A named external binary with invocation metadata.
#[derive(Debug)]
pub struct Program {
    /// Absolute path resolved from `PATH`, `None` when the binary is absent
    cmd_path: Option<PathBuf>,

    /// Original token, kept for reporting
    cmd_name: String,

    /// Argument prefix applied to every invocation
    opts: Vec<String>,

    /// Environment overlay applied to every invocation
    env: HashMap<String, String>,

    /// Version probe; `None` disables probing
    probe: Option<VersionProbe>,

    /// Memoized probe result
    version: OnceLock<Option<String>>,
}

impl Program {
    /// Resolve `cmd` through the host's `PATH` and build a program with the
    /// default `--version` probe.
    pub fn new(cmd: impl Into<String>) -> Self {
        let cmd_name = cmd.into();
        let cmd_path = which::which(&cmd_name).ok();
        Self {
            cmd_path,
            cmd_name,
            opts: Vec::new(),
            env: HashMap::new(),
            probe: Some(VersionProbe::default()),
            version: OnceLock::new(),
        }
    }

    /// Set the fixed argument prefix.
    pub fn opts(mut self, opts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.opts = opts.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable to the overlay.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Replace the version-probe flag (e.g. `go version`, `lua -v`).
    pub fn probe_flag(mut self, flag: impl Into<String>) -> Self {
        self.probe = Some(VersionProbe::with_flag(flag));
        self
    }

    /// Disable version probing; [`version`](Self::version) will report `None`.
    pub fn no_probe(mut self) -> Self {
        self.probe = None;
        self
    }

    /// Resolved path on the host, if the binary was found.
    pub fn cmd_path(&self) -> Option<&Path> {
        self.cmd_path.as_deref()
    }

    /// The original command token.
    pub fn cmd_name(&self) -> &str {
        &self.cmd_name
    }

    /// The fixed argument prefix.
    pub fn arg_prefix(&self) -> &[String] {
        &self.opts
    }

    /// The environment overlay.
    pub fn env_overlay(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Token used to invoke the program: the resolved absolute path when the
    /// lookup succeeded, the bare name otherwise.
    ///
    /// The isolator launches children with `execve`, which does not search
    /// `PATH`, so resolved paths are required for registered languages.
    pub fn invocation(&self) -> String {
        match self.cmd_path.as_deref() {
            Some(path) => path.to_string_lossy().into_owned(),
            None => self.cmd_name.clone(),
        }
    }

    /// Whether the binary resolved and carries an executable bit.
    pub fn is_available(&self) -> bool {
        use std::os::unix::fs::PermissionsExt;

        let Some(path) = self.cmd_path.as_deref() else {
            return false;
        };
        std::fs::metadata(path)
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    /// Probed version token, memoized on first access.
    ///
    /// Returns `None` when probing is disabled, the binary is absent, or the
    /// output contains no version-looking token.
    pub fn version(&self) -> Option<String> {
        self.version.get_or_init(|| self.probe_version()).clone()
    }

    /// Introspection snapshot.
    pub fn info(&self) -> ProgramInfo {
        ProgramInfo {
            version: self.version(),
            opts: self.opts.clone(),
        }
    }

    fn probe_version(&self) -> Option<String> {
        let probe = self.probe.as_ref()?;
        let path = self.cmd_path.as_deref()?;

        let output = std::process::Command::new(path)
            .arg(&probe.flag)
            .stdin(Stdio::null())
            .output()
            .ok()?;

        // Compilers disagree on which stream carries the banner.
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        let head = text
            .lines()
            .take(probe.max_lines)
            .collect::<Vec<_>>()
            .join("\n");

        probe.pattern.find(&head).map(|m| m.as_str().to_owned())
    }
}
