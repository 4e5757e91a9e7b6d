//! Pipeline scenarios: binary transport between stages and the failure
//! modes of intermediate compilers.

use std::sync::Arc;

use polybox::job::JobRequest;
use polybox::lang::builtin;
use polybox::types::SandboxStatus;

use super::{bad_compiler_stage, bad_copy_stage, c_reference, copy_stage, pipeline_engine};

#[tokio::test]
#[ignore = "requires root"]
async fn copy_copy_c_transports_the_binary() {
    let engine = pipeline_engine(
        "cp-cp-c",
        vec![copy_stage(), copy_stage(), Arc::new(builtin::c())],
    );

    let report = engine
        .run(JobRequest::new("cp-cp-c", c_reference()))
        .await
        .unwrap();

    let tests = report.tests.as_ref().expect("pipeline binary executed");
    assert_eq!(tests[0].stdout, b"42\n");
}

#[tokio::test]
#[ignore = "requires root"]
async fn second_c_stage_fails_on_elf_input() {
    // The first stage emits an ELF binary, which the second C stage then
    // refuses to compile.
    let engine = pipeline_engine(
        "c-c",
        vec![Arc::new(builtin::c()), Arc::new(builtin::c())],
    );

    let report = engine
        .run(JobRequest::new("c-c", c_reference()))
        .await
        .unwrap();

    let compile = report.compile.as_ref().unwrap();
    assert_eq!(compile.meta.status, SandboxStatus::RuntimeError);
    assert_eq!(compile.meta.exitcode, Some(1));
    assert!(report.tests.is_none());
}

#[tokio::test]
#[ignore = "requires root"]
async fn misplaced_output_reports_missing_binary() {
    let engine = pipeline_engine(
        "badcopy-c",
        vec![bad_copy_stage(), Arc::new(builtin::c())],
    );

    let report = engine
        .run(JobRequest::new("badcopy-c", c_reference()))
        .await
        .unwrap();

    let compile = report.compile.as_ref().unwrap();
    let stderr = String::from_utf8_lossy(&compile.stderr).to_lowercase();
    assert!(stderr.contains("cannot find result binary"));
    assert!(report.tests.is_none());
}

#[tokio::test]
#[ignore = "requires root"]
async fn silent_compiler_keeps_its_stderr_and_the_note() {
    let engine = pipeline_engine(
        "badcompiler-c",
        vec![bad_compiler_stage(), Arc::new(builtin::c())],
    );

    let report = engine
        .run(JobRequest::new("badcompiler-c", c_reference()))
        .await
        .unwrap();

    let compile = report.compile.as_ref().unwrap();
    let stderr = String::from_utf8_lossy(&compile.stderr).to_lowercase();
    assert!(stderr.contains("badcompiler is bad"));
    assert!(stderr.contains("cannot find result binary"));
    assert!(report.tests.is_none());
}

#[tokio::test]
#[ignore = "requires root"]
async fn single_stage_pipeline_matches_the_plain_language() {
    let engine = pipeline_engine("c-only", vec![Arc::new(builtin::c())]);
    let report = engine
        .run(JobRequest::new("c-only", c_reference()))
        .await
        .unwrap();
    assert_eq!(report.tests.as_ref().unwrap()[0].stdout, b"42\n");
}
