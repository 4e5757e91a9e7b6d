use serde::{Deserialize, Serialize};

/// Resource limits forwarded to the isolator for a single sandbox invocation.
///
/// Field names follow the isolator's flag vocabulary so that job requests can
/// spell limits the same way the underlying tool does. Every field is
/// optional; unset fields fall back to whatever the merge base provides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU time limit in seconds
    #[serde(default)]
    pub time: Option<f64>,

    /// Wall clock time limit in seconds
    #[serde(default, rename = "wall-time")]
    pub wall_time: Option<f64>,

    /// Grace period before the process is killed, in seconds
    #[serde(default, rename = "extra-time")]
    pub extra_time: Option<f64>,

    /// Address space limit in kilobytes
    #[serde(default)]
    pub mem: Option<u64>,

    /// Stack size limit in kilobytes
    #[serde(default)]
    pub stack: Option<u64>,

    /// Maximum number of processes/threads
    #[serde(default)]
    pub processes: Option<u32>,

    /// Maximum size of any file created, in kilobytes
    #[serde(default)]
    pub fsize: Option<u64>,

    /// Maximum number of open file descriptors
    #[serde(default, rename = "open-files")]
    pub open_files: Option<u32>,

    /// Disk quota as "blocks,inodes" (forwarded verbatim)
    #[serde(default)]
    pub quota: Option<String>,

    /// Truncation threshold for captured stdout, in bytes
    #[serde(default, rename = "stdout-cap")]
    pub stdout_cap: Option<u64>,

    /// Truncation threshold for captured stderr, in bytes
    #[serde(default, rename = "stderr-cap")]
    pub stderr_cap: Option<u64>,
}

impl ResourceLimits {
    /// 1 megabyte in kilobytes
    pub const MB: u64 = 1024;
    /// 1 gigabyte in kilobytes
    pub const GB: u64 = 1024 * 1024;

    /// Create limits with every field unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CPU time limit in seconds
    pub fn with_time(mut self, seconds: f64) -> Self {
        self.time = Some(seconds);
        self
    }

    /// Set the wall clock time limit in seconds
    pub fn with_wall_time(mut self, seconds: f64) -> Self {
        self.wall_time = Some(seconds);
        self
    }

    /// Set the address space limit in kilobytes
    pub fn with_mem(mut self, kb: u64) -> Self {
        self.mem = Some(kb);
        self
    }

    /// Set the maximum number of processes
    pub fn with_processes(mut self, count: u32) -> Self {
        self.processes = Some(count);
        self
    }

    /// Set the maximum created-file size in kilobytes
    pub fn with_fsize(mut self, kb: u64) -> Self {
        self.fsize = Some(kb);
        self
    }

    /// Merge with another set of limits, preferring set fields of `overrides`.
    ///
    /// The merge is field-wise: an unset field in `overrides` keeps the value
    /// from `self`.
    pub fn overridden_by(&self, overrides: &ResourceLimits) -> ResourceLimits {
        ResourceLimits {
            time: overrides.time.or(self.time),
            wall_time: overrides.wall_time.or(self.wall_time),
            extra_time: overrides.extra_time.or(self.extra_time),
            mem: overrides.mem.or(self.mem),
            stack: overrides.stack.or(self.stack),
            processes: overrides.processes.or(self.processes),
            fsize: overrides.fsize.or(self.fsize),
            open_files: overrides.open_files.or(self.open_files),
            quota: overrides.quota.clone().or_else(|| self.quota.clone()),
            stdout_cap: overrides.stdout_cap.or(self.stdout_cap),
            stderr_cap: overrides.stderr_cap.or(self.stderr_cap),
        }
    }
}

/// A host directory bound into the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Source path on the host
    pub source: String,

    /// Target path inside the sandbox
    pub target: String,

    /// Whether the mount is read-write (default: read-only)
    #[serde(default)]
    pub writable: bool,

    /// Don't fail if the source doesn't exist (isolate's `:maybe` flag)
    #[serde(default)]
    pub optional: bool,
}

impl MountConfig {
    /// Read-only bind of a host path at the same location in the sandbox.
    pub fn read_only(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            source: path.clone(),
            target: path,
            writable: false,
            optional: false,
        }
    }

    /// Read-write bind of `source` at `target`.
    pub fn read_write(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            writable: true,
            optional: false,
        }
    }
}

/// Deduplicate mounts by sandbox target, keeping the first occurrence.
pub fn dedup_mounts(mounts: Vec<MountConfig>) -> Vec<MountConfig> {
    let mut seen = std::collections::HashSet::new();
    mounts
        .into_iter()
        .filter(|m| seen.insert(m.target.clone()))
        .collect()
}

/// How a sandboxed process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SandboxStatus {
    /// Process exited with code 0
    #[serde(rename = "OK")]
    Ok,

    /// Process exited with a non-zero code
    #[serde(rename = "RUNTIME_ERROR")]
    RuntimeError,

    /// CPU or wall time limit exceeded
    #[serde(rename = "TIMED_OUT")]
    TimedOut,

    /// Killed for exceeding the memory limit
    #[serde(rename = "MEMORY_EXCEEDED")]
    MemoryExceeded,

    /// Killed by a signal unrelated to resource limits
    #[serde(rename = "SIGNALED")]
    Signaled,

    /// The isolator itself misbehaved
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl SandboxStatus {
    /// Map the isolator's two-letter status code. An absent code means the
    /// process exited normally with code 0.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            None => SandboxStatus::Ok,
            Some("RE") => SandboxStatus::RuntimeError,
            Some("TO") => SandboxStatus::TimedOut,
            Some("SG") => SandboxStatus::Signaled,
            Some(_) => SandboxStatus::InternalError,
        }
    }
}

impl std::fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SandboxStatus::Ok => "OK",
            SandboxStatus::RuntimeError => "RUNTIME_ERROR",
            SandboxStatus::TimedOut => "TIMED_OUT",
            SandboxStatus::MemoryExceeded => "MEMORY_EXCEEDED",
            SandboxStatus::Signaled => "SIGNALED",
            SandboxStatus::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(s)
    }
}

/// Structured post-run metadata from the isolator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxMeta {
    /// Termination status
    pub status: SandboxStatus,

    /// Exit code if the process exited normally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exitcode: Option<i32>,

    /// Signal number if the process was killed by a signal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,

    /// CPU time used in seconds
    pub time: f64,

    /// Wall clock time used in seconds
    #[serde(rename = "time-wall")]
    pub wall_time: f64,

    /// Peak resident set size in kilobytes
    pub memory: u64,

    /// Diagnostic message from the isolator, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SandboxMeta {
    /// Whether the process ran to completion with exit code 0.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, SandboxStatus::Ok) && self.exitcode.unwrap_or(0) == 0
    }
}

impl Default for SandboxMeta {
    fn default() -> Self {
        Self {
            status: SandboxStatus::Ok,
            exitcode: None,
            signal: None,
            time: 0.0,
            wall_time: 0.0,
            memory: 0,
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_new_is_empty() {
        let limits = ResourceLimits::new();
        assert_eq!(limits, ResourceLimits::default());
        assert!(limits.time.is_none());
        assert!(limits.mem.is_none());
    }

    #[test]
    fn limits_builder_methods() {
        let limits = ResourceLimits::new()
            .with_time(5.0)
            .with_wall_time(10.0)
            .with_mem(1024)
            .with_processes(4)
            .with_fsize(2048);

        assert_eq!(limits.time, Some(5.0));
        assert_eq!(limits.wall_time, Some(10.0));
        assert_eq!(limits.mem, Some(1024));
        assert_eq!(limits.processes, Some(4));
        assert_eq!(limits.fsize, Some(2048));
    }

    #[test]
    fn overridden_by_empty_preserves_base() {
        let base = ResourceLimits::new().with_time(2.0).with_mem(262144);
        let merged = base.overridden_by(&ResourceLimits::new());
        assert_eq!(merged, base);
    }

    #[test]
    fn overridden_by_set_fields_win() {
        let base = ResourceLimits::new().with_time(2.0).with_mem(262144);
        let overrides = ResourceLimits::new().with_time(10.0);

        let merged = base.overridden_by(&overrides);
        assert_eq!(merged.time, Some(10.0));
        assert_eq!(merged.mem, Some(262144));
    }

    #[test]
    fn overridden_by_fills_unset_base_fields() {
        let base = ResourceLimits::new().with_time(2.0);
        let overrides = ResourceLimits::new().with_processes(4);

        let merged = base.overridden_by(&overrides);
        assert_eq!(merged.time, Some(2.0));
        assert_eq!(merged.processes, Some(4));
    }

    #[test]
    fn limits_deserialize_isolator_vocabulary() {
        let limits: ResourceLimits =
            serde_json::from_str(r#"{"time": 1.5, "wall-time": 4.0, "mem": 65536}"#).unwrap();
        assert_eq!(limits.time, Some(1.5));
        assert_eq!(limits.wall_time, Some(4.0));
        assert_eq!(limits.mem, Some(65536));
        assert!(limits.processes.is_none());
    }

    #[test]
    fn mount_read_only_mirrors_path() {
        let mount = MountConfig::read_only("/etc/mono");
        assert_eq!(mount.source, "/etc/mono");
        assert_eq!(mount.target, "/etc/mono");
        assert!(!mount.writable);
        assert!(!mount.optional);
    }

    #[test]
    fn mount_read_write_sets_flag() {
        let mount = MountConfig::read_write("/tmp/play", "/tmp");
        assert_eq!(mount.source, "/tmp/play");
        assert_eq!(mount.target, "/tmp");
        assert!(mount.writable);
    }

    #[test]
    fn dedup_mounts_keeps_first_occurrence() {
        let mounts = vec![
            MountConfig::read_only("/etc"),
            MountConfig::read_write("/tmp/a", "/etc"),
            MountConfig::read_only("/usr"),
        ];
        let deduped = dedup_mounts(mounts);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].source, "/etc");
        assert!(!deduped[0].writable);
        assert_eq!(deduped[1].source, "/usr");
    }

    #[test]
    fn dedup_mounts_preserves_order() {
        let mounts = vec![
            MountConfig::read_only("/b"),
            MountConfig::read_only("/a"),
            MountConfig::read_only("/b"),
        ];
        let deduped = dedup_mounts(mounts);
        let targets: Vec<_> = deduped.iter().map(|m| m.target.as_str()).collect();
        assert_eq!(targets, vec!["/b", "/a"]);
    }

    #[test]
    fn status_from_code_known_codes() {
        assert_eq!(SandboxStatus::from_code(None), SandboxStatus::Ok);
        assert_eq!(
            SandboxStatus::from_code(Some("RE")),
            SandboxStatus::RuntimeError
        );
        assert_eq!(SandboxStatus::from_code(Some("TO")), SandboxStatus::TimedOut);
        assert_eq!(SandboxStatus::from_code(Some("SG")), SandboxStatus::Signaled);
        assert_eq!(
            SandboxStatus::from_code(Some("XX")),
            SandboxStatus::InternalError
        );
    }

    #[test]
    fn status_from_code_unknown_is_internal_error() {
        assert_eq!(
            SandboxStatus::from_code(Some("??")),
            SandboxStatus::InternalError
        );
        assert_eq!(
            SandboxStatus::from_code(Some("")),
            SandboxStatus::InternalError
        );
    }

    #[test]
    fn status_serializes_to_wire_names() {
        assert_eq!(
            serde_json::to_string(&SandboxStatus::TimedOut).unwrap(),
            "\"TIMED_OUT\""
        );
        assert_eq!(
            serde_json::to_string(&SandboxStatus::MemoryExceeded).unwrap(),
            "\"MEMORY_EXCEEDED\""
        );
        assert_eq!(
            serde_json::to_string(&SandboxStatus::RuntimeError).unwrap(),
            "\"RUNTIME_ERROR\""
        );
    }

    #[test]
    fn meta_is_success() {
        let ok = SandboxMeta {
            exitcode: Some(0),
            ..Default::default()
        };
        assert!(ok.is_success());

        let nonzero = SandboxMeta {
            status: SandboxStatus::RuntimeError,
            exitcode: Some(1),
            ..Default::default()
        };
        assert!(!nonzero.is_success());

        let signaled = SandboxMeta {
            status: SandboxStatus::Signaled,
            signal: Some(11),
            ..Default::default()
        };
        assert!(!signaled.is_success());
    }

    #[test]
    fn meta_serializes_wall_time_key() {
        let meta = SandboxMeta {
            exitcode: Some(0),
            time: 0.25,
            wall_time: 0.5,
            memory: 1024,
            ..Default::default()
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["status"], "OK");
        assert_eq!(json["time-wall"], 0.5);
        assert!(json.get("signal").is_none());
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    fn arb_limits() -> impl Strategy<Value = ResourceLimits> {
        (
            proptest::option::of(0.0f64..1000.0),
            proptest::option::of(0.0f64..1000.0),
            proptest::option::of(0u64..1_000_000),
            proptest::option::of(0u32..100),
            proptest::option::of(0u64..1_000_000),
        )
            .prop_map(|(time, wall_time, mem, processes, fsize)| ResourceLimits {
                time,
                wall_time,
                mem,
                processes,
                fsize,
                ..Default::default()
            })
    }

    proptest! {
        #[test]
        fn overridden_by_empty_is_identity(base in arb_limits()) {
            let merged = base.overridden_by(&ResourceLimits::default());
            prop_assert_eq!(merged, base);
        }

        #[test]
        fn overridden_by_full_takes_override(base in arb_limits(), time in 0.0f64..1000.0) {
            let overrides = ResourceLimits { time: Some(time), ..Default::default() };
            let merged = base.overridden_by(&overrides);
            prop_assert_eq!(merged.time, Some(time));
        }

        #[test]
        fn status_from_code_never_panics(code in ".*") {
            let _ = SandboxStatus::from_code(Some(&code));
        }

        #[test]
        fn dedup_mounts_is_idempotent(paths in proptest::collection::vec("[a-z/]{1,12}", 0..10)) {
            let mounts: Vec<_> = paths.into_iter().map(MountConfig::read_only).collect();
            let once = dedup_mounts(mounts);
            let twice = dedup_mounts(once.clone());
            prop_assert_eq!(once, twice);
        }
    }
}
