//! A library for sandboxed multi-language code execution.
//!
//! Polybox compiles and runs programs in a closed set of languages inside
//! IOI Isolate sandboxes. A job names a language, carries source text,
//! resource limits, and a list of tests; the engine answers with a
//! structured report of the compile phase and every test run.
//!
//! # Features
//!
//! - **Language registry** — built-in descriptors validated against the
//!   host's toolchains at startup; languages with missing binaries are
//!   skipped, not fatal.
//! - **Compile/execute pipeline** — one sandbox per phase, with pipelined
//!   compilation where each stage's output feeds the next stage.
//! - **Sandboxed execution** — pooled isolate boxes with enforced CPU,
//!   wall-time, memory, process, and output limits.
//! - **Structured results** — per-phase exit status, resource usage, and
//!   captured streams, JSON-serializable.

pub use config::{ConfigError, EXAMPLE_CONFIG, EngineConfig};
pub use engine::{CheckOutcome, Engine, EngineError};
pub use isolate::{BoxPool, IsolateError, RunOutcome, Sandbox, scrub_box_prefix};
pub use job::{ByteInput, JobReport, JobRequest, PhaseReport, TestReport, TestSpec};
pub use lang::{
    Language, LanguageDescriptor, OutputDiscovery, PipelineDescriptor, Variant, builtin,
};
pub use program::{Program, ProgramInfo, VersionProbe};
pub use registry::{Registry, RegistryError};
pub use types::{MountConfig, ResourceLimits, SandboxMeta, SandboxStatus};

pub mod config;
pub mod engine;
pub mod isolate;
pub mod job;
pub mod lang;
pub mod program;
pub mod registry;
pub mod types;
