//! Language descriptors
//!
//! A [`LanguageDescriptor`] is the static record the registry hands out: the
//! source extension, the compiler and/or interpreter programs, extra sandbox
//! mounts, and the per-language [`Variant`] plug-points. Descriptors are
//! built once at startup and shared immutably.

use std::sync::Arc;

use thiserror::Error;

use crate::program::Program;
use crate::types::MountConfig;

pub mod builtin;

/// Default compile argument template: `-o <output> <source>`.
const DEFAULT_COMPILE_ARGS: &[&str] = &["-o", "{output}", "{source}"];

#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("pipeline '{0}' has no stages")]
    EmptyPipeline(String),
}

/// Expand `{source}` and `{output}` placeholders in an argument template.
pub fn expand_args(template: &[String], source: &str, output: &str) -> Vec<String> {
    template
        .iter()
        .map(|arg| arg.replace("{source}", source).replace("{output}", output))
        .collect()
}

/// Output-artifact discovery rule for the compile phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputDiscovery {
    /// One artifact at the fixed output path, named `""`
    #[default]
    Single,

    /// Extra named artifacts emitted next to the main output. The engine
    /// still keeps only the first artifact; the rest exist so compilers that
    /// scatter auxiliary files can be staged and inspected.
    Named(Vec<String>),
}

/// The three per-language variation points, held as data.
///
/// Languages differ in how the compile output flag is spelled, how the
/// produced artifacts are discovered, and (rarely) how the whole command
/// line is assembled. All three collapse into argument templates over
/// `{source}` and `{output}` plus a discovery rule.
#[derive(Debug, Clone)]
pub struct Variant {
    /// Arguments appended after the compiler's fixed prefix
    pub compile_args: Vec<String>,

    /// How compile artifacts are located
    pub discovery: OutputDiscovery,

    /// Run-command template; `None` assembles `interpreter… compiled`
    pub run_args: Option<Vec<String>>,
}

impl Default for Variant {
    fn default() -> Self {
        Self {
            compile_args: DEFAULT_COMPILE_ARGS.iter().map(|s| (*s).to_owned()).collect(),
            discovery: OutputDiscovery::Single,
            run_args: None,
        }
    }
}

/// Static per-language record.
#[derive(Debug)]
pub struct LanguageDescriptor {
    /// Display name (e.g. "C++", "C#")
    name: String,

    /// Source file extension including the dot (e.g. ".c")
    source_ext: Option<String>,

    compiler: Option<Program>,
    interpreter: Option<Program>,

    /// Host dirs bound read-only into every sandbox for this language,
    /// merged with the global list
    allowed_dirs: Vec<MountConfig>,

    /// Programs that must exist on the host but never appear in commands
    extra_programs: Vec<Program>,

    variant: Variant,

    /// Canonical hello-world printing `42`, used by registry self-checks
    reference_source: Option<String>,
}

impl LanguageDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_ext: None,
            compiler: None,
            interpreter: None,
            allowed_dirs: Vec::new(),
            extra_programs: Vec::new(),
            variant: Variant::default(),
            reference_source: None,
        }
    }

    pub fn source_ext(mut self, ext: impl Into<String>) -> Self {
        self.source_ext = Some(ext.into());
        self
    }

    pub fn compiler(mut self, program: Program) -> Self {
        self.compiler = Some(program);
        self
    }

    pub fn interpreter(mut self, program: Program) -> Self {
        self.interpreter = Some(program);
        self
    }

    pub fn allowed_dir(mut self, path: impl Into<String>) -> Self {
        self.allowed_dirs.push(MountConfig::read_only(path));
        self
    }

    pub fn extra_program(mut self, program: Program) -> Self {
        self.extra_programs.push(program);
        self
    }

    pub fn compile_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.variant.compile_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn run_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.variant.run_args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn discovery(mut self, discovery: OutputDiscovery) -> Self {
        self.variant.discovery = discovery;
        self
    }

    pub fn reference(mut self, source: impl Into<String>) -> Self {
        self.reference_source = Some(source.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized registry key.
    pub fn registry_key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn ext(&self) -> Option<&str> {
        self.source_ext.as_deref()
    }

    pub fn compiler_program(&self) -> Option<&Program> {
        self.compiler.as_ref()
    }

    pub fn interpreter_program(&self) -> Option<&Program> {
        self.interpreter.as_ref()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiler.is_some()
    }

    pub fn allowed_dirs(&self) -> &[MountConfig] {
        &self.allowed_dirs
    }

    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    pub fn reference_source(&self) -> Option<&str> {
        self.reference_source.as_deref()
    }

    /// Name of the staged source file inside `/box`.
    pub fn source_filename(&self) -> String {
        match self.source_ext.as_deref() {
            Some(ext) => format!("source{ext}"),
            None => "source".to_owned(),
        }
    }

    /// Name of the staged executable inside `/box`.
    ///
    /// Interpreted languages keep their extension so interpreters that sniff
    /// filenames still work.
    pub fn compiled_filename(&self) -> String {
        match (&self.compiler, self.source_ext.as_deref()) {
            (None, Some(ext)) => format!("compiled{ext}"),
            _ => "compiled".to_owned(),
        }
    }

    /// Every program that must be present for this language to register.
    pub fn required_programs(&self) -> impl Iterator<Item = &Program> {
        self.compiler
            .iter()
            .chain(self.interpreter.iter())
            .chain(self.extra_programs.iter())
    }
}

/// An ordered chain of simple languages whose compile outputs feed forward.
///
/// Stages hold plain descriptors, so a pipeline can never nest inside
/// another pipeline and has no compile operation of its own.
#[derive(Debug, Clone)]
pub struct PipelineDescriptor {
    name: String,
    stages: Vec<Arc<LanguageDescriptor>>,
}

impl PipelineDescriptor {
    pub fn new(
        name: impl Into<String>,
        stages: Vec<Arc<LanguageDescriptor>>,
    ) -> Result<Self, LanguageError> {
        let name = name.into();
        if stages.is_empty() {
            return Err(LanguageError::EmptyPipeline(name));
        }
        Ok(Self { name, stages })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry_key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn stages(&self) -> &[Arc<LanguageDescriptor>] {
        &self.stages
    }

    /// The stage whose executor runs the final binary.
    pub fn terminal(&self) -> &Arc<LanguageDescriptor> {
        self.stages.last().expect("pipeline stages are non-empty")
    }
}

/// A registrable language: a single descriptor or a compile pipeline.
#[derive(Debug, Clone)]
pub enum Language {
    Simple(Arc<LanguageDescriptor>),
    Pipeline(PipelineDescriptor),
}

impl Language {
    pub fn name(&self) -> &str {
        match self {
            Language::Simple(d) => d.name(),
            Language::Pipeline(p) => p.name(),
        }
    }

    pub fn registry_key(&self) -> String {
        self.name().to_lowercase()
    }

    /// Union of required programs over all descriptors involved.
    pub fn required_programs(&self) -> Vec<&Program> {
        match self {
            Language::Simple(d) => d.required_programs().collect(),
            Language::Pipeline(p) => p
                .stages()
                .iter()
                .flat_map(|d| d.required_programs())
                .collect(),
        }
    }

    /// Reference source for self-checks; a pipeline's comes from its first
    /// stage, where the original source enters the chain.
    pub fn reference_source(&self) -> Option<&str> {
        match self {
            Language::Simple(d) => d.reference_source(),
            Language::Pipeline(p) => p.stages().first().and_then(|d| d.reference_source()),
        }
    }
}

impl From<LanguageDescriptor> for Language {
    fn from(descriptor: LanguageDescriptor) -> Self {
        Language::Simple(Arc::new(descriptor))
    }
}

impl From<PipelineDescriptor> for Language {
    fn from(pipeline: PipelineDescriptor) -> Self {
        Language::Pipeline(pipeline)
    }
}
