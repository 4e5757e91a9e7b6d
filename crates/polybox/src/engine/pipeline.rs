//! Pipeline execution
//!
//! A pipeline compiles through an ordered list of sub-languages: each
//! stage's output binary becomes the next stage's source, and the terminal
//! binary runs under the last stage's descriptor. The pipeline itself has no
//! compile operation; it only orchestrates its stages.

use tracing::{debug, instrument};

use crate::engine::executor::Executor;
use crate::engine::{Engine, EngineError};
use crate::job::{JobReport, JobRequest};
use crate::lang::PipelineDescriptor;

/// Drives one job through a compile pipeline.
pub struct PipelineExecutor<'a> {
    engine: &'a Engine,
    pipeline: PipelineDescriptor,
    request: &'a JobRequest,
}

impl<'a> PipelineExecutor<'a> {
    pub fn new(engine: &'a Engine, pipeline: PipelineDescriptor, request: &'a JobRequest) -> Self {
        Self {
            engine,
            pipeline,
            request,
        }
    }

    /// Run the whole job: staged compiles, then tests on the terminal binary.
    pub async fn run(&self) -> Result<JobReport, EngineError> {
        let mut report = JobReport::default();

        let Some(binary) = self.run_compilation(&mut report).await? else {
            return Ok(report);
        };

        let terminal = Executor::new(self.engine, self.pipeline.terminal().clone(), self.request);
        terminal.run_tests(&binary, &mut report).await?;

        Ok(report)
    }

    /// Chain the stage compiles, feeding each output forward.
    ///
    /// `report.compile` always holds the info of the last stage that ran;
    /// earlier stage diagnostics are overwritten on success paths. A stage
    /// that fails (non-zero compiler exit or missing output) stops the chain
    /// with no binary, so test execution is skipped.
    #[instrument(skip(self, report), fields(pipeline = self.pipeline.name()))]
    async fn run_compilation(
        &self,
        report: &mut JobReport,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        let mut source = self.request.source.as_bytes().to_vec();

        for stage in self.pipeline.stages() {
            debug!(stage = stage.name(), "compiling pipeline stage");
            let executor =
                Executor::new(self.engine, stage.clone(), self.request).with_source(source);

            let (phase, binary) = executor.compile().await?;
            report.compile = Some(phase);

            match binary {
                Some(bytes) => source = bytes,
                None => return Ok(None),
            }
        }

        Ok(Some(source))
    }
}
