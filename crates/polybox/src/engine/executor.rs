//! Per-job executor
//!
//! One [`Executor`] drives one job for one language descriptor: stage the
//! source, compile (when the language has a compiler), then run each test in
//! its own sandbox. All temporary state (boxes, the compile-phase `/tmp`
//! playground) is owned by the executor and released before it returns.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::engine::{Engine, EngineError};
use crate::isolate::{RunOutcome, Sandbox, scrub_box_prefix};
use crate::job::{JobReport, JobRequest, PhaseReport, TestReport};
use crate::lang::{LanguageDescriptor, OutputDiscovery, expand_args};
use crate::program::Program;
use crate::types::{MountConfig, dedup_mounts};

/// Name of the compile output inside `/box`.
const OUTPUT_NAME: &str = "compiled";

/// Environment for every sandboxed process: `HOME` points at the box.
fn home_env(box_dir: &str) -> HashMap<String, String> {
    HashMap::from([("HOME".to_owned(), scrub_box_prefix(box_dir))])
}

/// Assemble a compile command: compiler, fixed prefix, then the language's
/// compile-args template over scrubbed source/output paths.
fn compile_argv(
    descriptor: &LanguageDescriptor,
    compiler: &Program,
    source_host: &str,
    output_host: &str,
) -> Vec<String> {
    let mut argv = vec![compiler.invocation()];
    argv.extend(compiler.arg_prefix().iter().cloned());
    argv.extend(expand_args(
        &descriptor.variant().compile_args,
        &scrub_box_prefix(source_host),
        &scrub_box_prefix(output_host),
    ));
    argv
}

/// Assemble an execute command: `interpreter… compiled`, or the language's
/// run template when one is set.
fn execute_argv(descriptor: &LanguageDescriptor, compiled_host: &str) -> Vec<String> {
    let compiled = scrub_box_prefix(compiled_host);
    if let Some(template) = &descriptor.variant().run_args {
        return expand_args(template, &compiled, &compiled);
    }

    let mut argv = Vec::new();
    if let Some(interpreter) = descriptor.interpreter_program() {
        argv.push(interpreter.invocation());
        argv.extend(interpreter.arg_prefix().iter().cloned());
    }
    argv.push(compiled);
    argv
}

/// Drives one job for one language descriptor.
pub struct Executor<'a> {
    engine: &'a Engine,
    descriptor: Arc<LanguageDescriptor>,
    request: &'a JobRequest,

    /// Bytes staged as the source file; the request's source, except for
    /// pipeline stages where it is the previous stage's output
    source: Vec<u8>,
}

impl<'a> Executor<'a> {
    pub fn new(
        engine: &'a Engine,
        descriptor: Arc<LanguageDescriptor>,
        request: &'a JobRequest,
    ) -> Self {
        let source = request.source.as_bytes().to_vec();
        Self {
            engine,
            descriptor,
            request,
            source,
        }
    }

    /// Replace the staged source (pipeline stages feed binaries through here).
    pub fn with_source(mut self, source: Vec<u8>) -> Self {
        self.source = source;
        self
    }

    /// Run the whole job: compile, then tests.
    pub async fn run(&self) -> Result<JobReport, EngineError> {
        let mut report = JobReport::default();

        let Some(binary) = self.run_compilation(&mut report).await? else {
            return Ok(report);
        };
        self.run_tests(&binary, &mut report).await?;

        Ok(report)
    }

    /// Compile phase. Returns the executable bytes, or `None` when the job
    /// must stop with the report as-is. Interpreted languages pass their
    /// source through unchanged.
    pub(crate) async fn run_compilation(
        &self,
        report: &mut JobReport,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        if self.descriptor.compiler_program().is_none() {
            return Ok(Some(self.source.clone()));
        }

        let (phase, binary) = self.compile().await?;
        report.compile = Some(phase);
        Ok(binary)
    }

    /// Compile the staged source in a fresh sandbox.
    ///
    /// The phase report is always produced; the binary is `None` when the
    /// compiler exited non-zero or the output artifact is missing (in which
    /// case the missing-binary note is appended to stderr).
    #[instrument(skip(self), fields(lang = self.descriptor.name()))]
    pub(crate) async fn compile(&self) -> Result<(PhaseReport, Option<Vec<u8>>), EngineError> {
        let compiler = self
            .descriptor
            .compiler_program()
            .ok_or_else(|| EngineError::NotCompiled(self.descriptor.name().to_owned()))?;

        // Many compilers insist on a writable /tmp.
        let playground = tempfile::Builder::new().prefix("polybox-tmp-").tempdir()?;
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                playground.path(),
                std::fs::Permissions::from_mode(0o777),
            )?;
        }

        let mut mounts = self.job_mounts();
        mounts.push(MountConfig::read_write(
            playground.path().to_string_lossy(),
            "/tmp",
        ));

        let limits = self
            .engine
            .config()
            .compile_limits
            .overridden_by(&self.request.compile);
        let mut sandbox = self
            .engine
            .pool()
            .acquire(limits, dedup_mounts(mounts))
            .await?;

        let compiled = self.compile_in(&sandbox, compiler).await;
        let released = sandbox.release().await;
        playground.close()?;

        let result = compiled?;
        released?;
        Ok(result)
    }

    async fn compile_in(
        &self,
        sandbox: &Sandbox,
        compiler: &Program,
    ) -> Result<(PhaseReport, Option<Vec<u8>>), EngineError> {
        let source_name = self.descriptor.source_filename();
        sandbox.write_file(&source_name, &self.source).await?;

        let source_path = sandbox.file_path(&source_name)?;
        let output_path = sandbox.file_path(OUTPUT_NAME)?;
        let argv = compile_argv(
            &self.descriptor,
            compiler,
            &source_path.to_string_lossy(),
            &output_path.to_string_lossy(),
        );

        let mut env = home_env(&sandbox.path().to_string_lossy());
        env.extend(
            compiler
                .env_overlay()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let outcome = sandbox.run(argv, &env, None).await?;
        let succeeded = outcome.child_succeeded();
        let mut phase = PhaseReport::from(outcome);

        if !succeeded {
            debug!(lang = self.descriptor.name(), "compilation failed");
            return Ok((phase, None));
        }

        let binary = self.read_compiled(sandbox).await;
        if binary.is_none() {
            debug!(lang = self.descriptor.name(), "compiler produced no output");
            phase.note_missing_binary();
        }
        Ok((phase, binary))
    }

    /// Collect compile artifacts per the language's discovery rule and keep
    /// the first one (named `""`); the rest are auxiliary files.
    async fn read_compiled(&self, sandbox: &Sandbox) -> Option<Vec<u8>> {
        let mut artifacts: Vec<(String, Vec<u8>)> = Vec::new();

        if let Some(bytes) = sandbox.try_read_file(OUTPUT_NAME).await {
            artifacts.push((String::new(), bytes));
        }
        if let OutputDiscovery::Named(names) = &self.descriptor.variant().discovery {
            for name in names {
                if let Some(bytes) = sandbox.try_read_file(name).await {
                    artifacts.push((name.clone(), bytes));
                }
            }
        }

        artifacts.into_iter().next().map(|(_, bytes)| bytes)
    }

    /// Test phase: one fresh sandbox per test, strictly in order.
    #[instrument(skip(self, binary, report), fields(lang = self.descriptor.name()))]
    pub(crate) async fn run_tests(
        &self,
        binary: &[u8],
        report: &mut JobReport,
    ) -> Result<(), EngineError> {
        let tests = self.request.normalized_tests();
        let mut results = Vec::with_capacity(tests.len());

        for test in tests {
            let limits = self
                .engine
                .config()
                .execute_limits
                .overridden_by(&test.limits);
            let mut sandbox = self
                .engine
                .pool()
                .acquire(limits, dedup_mounts(self.job_mounts()))
                .await?;

            let ran = self
                .execute_in(&sandbox, binary, test.stdin.as_deref())
                .await;
            let released = sandbox.release().await;
            let outcome = ran?;
            released?;

            let failed = !outcome.child_succeeded();
            debug!(test = %test.name, failed, "test finished");
            results.push(TestReport::new(test.name, outcome));

            if failed && (test.fatal || self.request.all_fatal) {
                break;
            }
        }

        report.tests = Some(results);
        Ok(())
    }

    async fn execute_in(
        &self,
        sandbox: &Sandbox,
        binary: &[u8],
        stdin: Option<&[u8]>,
    ) -> Result<RunOutcome, EngineError> {
        let compiled_name = self.descriptor.compiled_filename();
        sandbox.write_executable(&compiled_name, binary).await?;

        let compiled_path = sandbox.file_path(&compiled_name)?;
        let argv = execute_argv(&self.descriptor, &compiled_path.to_string_lossy());

        let mut env = home_env(&sandbox.path().to_string_lossy());
        if let Some(interpreter) = self.descriptor.interpreter_program() {
            env.extend(
                interpreter
                    .env_overlay()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }

        Ok(sandbox.run(argv, &env, stdin).await?)
    }

    /// Descriptor mounts first, then the global list; first target wins.
    fn job_mounts(&self) -> Vec<MountConfig> {
        let mut mounts = self.descriptor.allowed_dirs().to_vec();
        mounts.extend(self.engine.config().allowed_dirs.iter().cloned());
        mounts
    }
}
