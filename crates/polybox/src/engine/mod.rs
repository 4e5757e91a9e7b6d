//! The language execution engine
//!
//! [`Engine`] turns a [`JobRequest`](crate::job::JobRequest) into a
//! [`JobReport`](crate::job::JobReport): resolve the language through the
//! registry, compile (possibly through a pipeline), then run each test in a
//! fresh sandbox. Expected failures (compile errors, missing binaries,
//! failing tests, exceeded limits) are encoded in the report; only
//! programmer errors and isolator breakdowns cross the `run` boundary.

use thiserror::Error;

pub use crate::engine::executor::Executor;
pub use crate::engine::pipeline::PipelineExecutor;

mod executor;
mod pipeline;

use crate::config::EngineConfig;
use crate::isolate::{BoxPool, IsolateError};
use crate::job::{JobReport, JobRequest};
use crate::lang::Language;
use crate::registry::{Registry, RegistryError};

/// Errors that escape [`Engine::run`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    UnknownLanguage(#[from] RegistryError),

    #[error("language '{0}' has no compiler")]
    NotCompiled(String),

    #[error("language '{0}' has no reference source")]
    NoReference(String),

    #[error("isolator failure: {0}")]
    Isolate(#[from] IsolateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a registry self-check for one language.
#[derive(Debug)]
pub struct CheckOutcome {
    /// Whether the reference program compiled and printed `42`
    pub passed: bool,

    /// The full report, for diagnosing failures
    pub report: JobReport,
}

/// The execution engine: registry, configuration, and box pool.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    registry: Registry,
    pool: BoxPool,
}

impl Engine {
    pub fn new(config: EngineConfig, registry: Registry) -> Self {
        let pool = BoxPool::new(
            config.boxes.start,
            config.boxes.count,
            config.isolate_binary(),
        );
        Self {
            config,
            registry,
            pool,
        }
    }

    /// Engine over the built-in catalog with the embedded default config.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default(), Registry::discover())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn pool(&self) -> &BoxPool {
        &self.pool
    }

    /// Run one job end-to-end.
    pub async fn run(&self, request: JobRequest) -> Result<JobReport, EngineError> {
        let language = self.registry.resolve(&request.lang)?;
        match language {
            Language::Simple(descriptor) => {
                Executor::new(self, descriptor.clone(), &request).run().await
            }
            Language::Pipeline(pipeline) => {
                PipelineExecutor::new(self, pipeline.clone(), &request)
                    .run()
                    .await
            }
        }
    }

    /// Run a language's reference source with a single empty test.
    ///
    /// Passing means the compile phase (when present) exited zero and the
    /// test's stdout begins with `42`.
    pub async fn check(&self, key: &str) -> Result<CheckOutcome, EngineError> {
        let language = self.registry.resolve(key)?;
        let reference = language
            .reference_source()
            .ok_or_else(|| EngineError::NoReference(language.name().to_owned()))?
            .to_owned();

        let report = self.run(JobRequest::new(key, reference)).await?;

        let compile_ok = report
            .compile
            .as_ref()
            .map(|phase| phase.meta.is_success())
            .unwrap_or(true);
        let output_ok = report
            .tests
            .as_ref()
            .and_then(|tests| tests.first())
            .map(|test| test.stdout.starts_with(b"42"))
            .unwrap_or(false);

        Ok(CheckOutcome {
            passed: compile_ok && output_ok,
            report,
        })
    }
}
