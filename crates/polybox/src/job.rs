//! Job requests and result trees
//!
//! A [`JobRequest`] describes one program, its resource limits, and a
//! sequence of tests. The engine answers with a [`JobReport`]: one
//! [`PhaseReport`] for the compile phase (when one ran) and one
//! [`TestReport`] per executed test. Reports are JSON-serializable; captured
//! streams are rendered as lossy UTF-8, and compiled binaries never appear
//! in them.

use serde::{Deserialize, Serialize, Serializer};

use crate::isolate::RunOutcome;
use crate::types::{ResourceLimits, SandboxMeta};

/// Diagnostic appended to compile stderr when no output artifact was found.
pub const MISSING_BINARY_NOTE: &[u8] = b"Cannot find result binary.\n";

/// Input accepted as either UTF-8 text or raw bytes.
///
/// Job files carry program text as strings; pipeline stages feed compiled
/// artifacts through the same field as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ByteInput {
    Text(String),
    Raw(Vec<u8>),
}

impl ByteInput {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ByteInput::Text(s) => s.as_bytes(),
            ByteInput::Raw(b) => b,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ByteInput::Text(s) => s.into_bytes(),
            ByteInput::Raw(b) => b,
        }
    }
}

impl Default for ByteInput {
    fn default() -> Self {
        ByteInput::Text(String::new())
    }
}

impl From<&str> for ByteInput {
    fn from(s: &str) -> Self {
        ByteInput::Text(s.to_owned())
    }
}

impl From<String> for ByteInput {
    fn from(s: String) -> Self {
        ByteInput::Text(s)
    }
}

impl From<Vec<u8>> for ByteInput {
    fn from(b: Vec<u8>) -> Self {
        ByteInput::Raw(b)
    }
}

/// One test: optional name, optional stdin, fatality, and limit overrides.
///
/// Limit fields appear inline in the test object (`{"name": "t", "time": 1.0}`),
/// overriding the job-level execute limits field-wise.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestSpec {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub stdin: Option<ByteInput>,

    /// Stop the run if this test exits non-zero
    #[serde(default)]
    pub fatal: bool,

    #[serde(flatten)]
    pub limits: ResourceLimits,
}

/// A full job: language, source, limits, tests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobRequest {
    /// Registry key of the language to run
    pub lang: String,

    /// Program text, or raw bytes for pipeline intermediate stages
    #[serde(default)]
    pub source: ByteInput,

    /// Limits for the compile phase
    #[serde(default)]
    pub compile: ResourceLimits,

    /// Default limits for each test
    #[serde(default)]
    pub execute: ResourceLimits,

    /// Ordered test list; empty means one test with no stdin
    #[serde(default)]
    pub tests: Vec<TestSpec>,

    /// Stop at the first non-zero test regardless of per-test `fatal`
    #[serde(default)]
    pub all_fatal: bool,
}

impl JobRequest {
    pub fn new(lang: impl Into<String>, source: impl Into<ByteInput>) -> Self {
        Self {
            lang: lang.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// Resolve the declared tests into the list the engine iterates.
    ///
    /// An absent test list becomes a single empty test; missing names become
    /// `testNNN` with a zero-padded index; per-test limits are merged over
    /// the job-level execute limits here, so the execution loop sees final
    /// values only.
    pub fn normalized_tests(&self) -> Vec<NormalizedTest> {
        let fallback = [TestSpec::default()];
        let declared: &[TestSpec] = if self.tests.is_empty() {
            &fallback
        } else {
            &self.tests
        };

        declared
            .iter()
            .enumerate()
            .map(|(i, test)| NormalizedTest {
                name: test.name.clone().unwrap_or_else(|| format!("test{i:03}")),
                stdin: test.stdin.as_ref().map(|b| b.as_bytes().to_vec()),
                fatal: test.fatal,
                limits: self.execute.overridden_by(&test.limits),
            })
            .collect()
    }
}

/// A test after request normalization: named, with final limits.
#[derive(Debug, Clone)]
pub struct NormalizedTest {
    pub name: String,
    pub stdin: Option<Vec<u8>>,
    pub fatal: bool,
    pub limits: ResourceLimits,
}

fn lossy_utf8<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

/// Captured streams and metadata for one sandbox invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseReport {
    #[serde(serialize_with = "lossy_utf8")]
    pub stdout: Vec<u8>,

    #[serde(serialize_with = "lossy_utf8")]
    pub stderr: Vec<u8>,

    pub meta: SandboxMeta,
}

impl PhaseReport {
    /// Append the missing-binary diagnostic, preceded by a blank line when
    /// stderr already holds output.
    pub fn note_missing_binary(&mut self) {
        if !self.stderr.iter().all(u8::is_ascii_whitespace) {
            self.stderr.extend_from_slice(b"\n\n");
        }
        self.stderr.extend_from_slice(MISSING_BINARY_NOTE);
    }
}

impl From<RunOutcome> for PhaseReport {
    fn from(outcome: RunOutcome) -> Self {
        Self {
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            meta: outcome.meta,
        }
    }
}

/// One executed test in the result tree.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub name: String,

    #[serde(serialize_with = "lossy_utf8")]
    pub stdout: Vec<u8>,

    #[serde(serialize_with = "lossy_utf8")]
    pub stderr: Vec<u8>,

    pub meta: SandboxMeta,
}

impl TestReport {
    pub fn new(name: impl Into<String>, outcome: RunOutcome) -> Self {
        Self {
            name: name.into(),
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            meta: outcome.meta,
        }
    }
}

/// The aggregated result of one job.
///
/// `compile` is present iff a compile phase ran; `tests` is absent when
/// compilation failed, and otherwise holds a non-empty prefix of the
/// declared tests.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile: Option<PhaseReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<TestReport>>,
}
