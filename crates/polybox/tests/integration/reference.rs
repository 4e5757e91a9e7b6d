//! Reference-source runs for real languages.

use polybox::job::{JobRequest, TestSpec};

use super::test_engine;

#[tokio::test]
#[ignore = "requires root"]
async fn c_reference_prints_42() {
    let engine = test_engine();
    let source = engine
        .registry()
        .resolve("c")
        .expect("gcc installed")
        .reference_source()
        .unwrap()
        .to_owned();

    let report = engine.run(JobRequest::new("c", source)).await.unwrap();

    let compile = report.compile.as_ref().expect("compile phase ran");
    assert_eq!(compile.meta.exitcode, Some(0));

    let tests = report.tests.as_ref().expect("tests ran");
    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0].name, "test000");
    assert_eq!(tests[0].stdout, b"42\n");
}

#[tokio::test]
#[ignore = "requires root"]
async fn python_ignores_unconsumed_stdin() {
    let engine = test_engine();
    let request = JobRequest {
        tests: vec![TestSpec {
            stdin: Some("ignored".into()),
            ..Default::default()
        }],
        ..JobRequest::new("python", "print(\"42\")")
    };

    let report = engine.run(request).await.unwrap();

    assert!(report.compile.is_none());
    let tests = report.tests.as_ref().unwrap();
    assert_eq!(tests[0].stdout, b"42\n");
}

#[tokio::test]
#[ignore = "requires root"]
async fn every_registered_language_passes_its_check() {
    let engine = test_engine();
    let keys: Vec<String> = engine
        .registry()
        .languages()
        .iter()
        .map(|(k, _)| (*k).to_owned())
        .collect();

    for key in keys {
        let outcome = engine.check(&key).await.unwrap();
        assert!(outcome.passed, "{key} failed its reference check");
    }
}

#[tokio::test]
#[ignore = "requires root"]
async fn identical_jobs_produce_identical_streams() {
    let engine = test_engine();
    let request = || JobRequest::new("python", "print(\"42\")");

    let first = engine.run(request()).await.unwrap();
    let second = engine.run(request()).await.unwrap();

    let first_test = &first.tests.as_ref().unwrap()[0];
    let second_test = &second.tests.as_ref().unwrap()[0];
    assert_eq!(first_test.stdout, second_test.stdout);
    assert_eq!(first_test.stderr, second_test.stderr);
}

#[tokio::test]
#[ignore = "requires root"]
async fn compile_failure_omits_tests() {
    let engine = test_engine();
    let report = engine
        .run(JobRequest::new("c", "int main( { broken"))
        .await
        .unwrap();

    let compile = report.compile.as_ref().unwrap();
    assert_ne!(compile.meta.exitcode, Some(0));
    assert!(!compile.stderr.is_empty());
    assert!(report.tests.is_none());
}
