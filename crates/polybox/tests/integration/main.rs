//! Integration tests for polybox
//!
//! These tests require the isolate binary to be installed and accessible.
//! Run with: cargo test -p polybox --features integration-tests
//!
//! Tests that require root are marked `#[ignore]`. To include them:
//!    cargo test -p polybox --features integration-tests -- --include-ignored

#![cfg(feature = "integration-tests")]

use std::sync::Arc;

use polybox::config::EngineConfig;
use polybox::engine::Engine;
use polybox::lang::{LanguageDescriptor, PipelineDescriptor, builtin};
use polybox::program::Program;
use polybox::registry::Registry;

mod execution;
mod pipeline;
mod reference;

/// Engine over the discovered built-in catalog.
pub(crate) fn test_engine() -> Engine {
    Engine::new(EngineConfig::default(), Registry::discover())
}

/// Engine whose registry holds exactly the given languages.
pub(crate) fn engine_with(languages: Vec<polybox::lang::Language>) -> Engine {
    let mut registry = Registry::new();
    for language in languages {
        let (registered, _) = registry.register(language);
        assert!(registered, "test language failed to register");
    }
    Engine::new(EngineConfig::default(), registry)
}

/// The canonical C reference source, used by the pipeline scenarios.
pub(crate) fn c_reference() -> String {
    builtin::c()
        .reference_source()
        .expect("C has a reference source")
        .to_owned()
}

/// A compiler that just copies its input to the output path.
pub(crate) fn copy_stage() -> Arc<LanguageDescriptor> {
    Arc::new(
        LanguageDescriptor::new("Copy")
            .source_ext(".a")
            .compiler(Program::new("cp").no_probe())
            .compile_args(["{source}", "{output}"]),
    )
}

/// Copies to the wrong output path: exits zero but produces no binary.
pub(crate) fn bad_copy_stage() -> Arc<LanguageDescriptor> {
    Arc::new(
        LanguageDescriptor::new("BadCopy")
            .source_ext(".a")
            .compiler(Program::new("cp").no_probe())
            .compile_args(["{source}", "{output}bad"]),
    )
}

/// Complains on stderr, exits zero, produces nothing.
pub(crate) fn bad_compiler_stage() -> Arc<LanguageDescriptor> {
    Arc::new(
        LanguageDescriptor::new("BadCompiler")
            .source_ext(".a")
            .compiler(
                Program::new("sh")
                    .opts(["-c", "echo BadCompiler is bad >&2"])
                    .no_probe(),
            )
            .compile_args(Vec::<String>::new()),
    )
}

/// Register a pipeline under `name` and return an engine that can run it.
pub(crate) fn pipeline_engine(name: &str, stages: Vec<Arc<LanguageDescriptor>>) -> Engine {
    let pipeline = PipelineDescriptor::new(name, stages).expect("stages are non-empty");
    engine_with(vec![pipeline.into()])
}
