//! Test-loop behavior: fatality policies, limit enforcement, multi-test runs.

use polybox::job::{JobRequest, TestSpec};
use polybox::types::{ResourceLimits, SandboxStatus};

use super::test_engine;

/// Exits with the code read from stdin.
const EXIT_WITH_INPUT: &str = "import sys\nsys.exit(int(sys.stdin.read() or 0))\n";

fn exit_code_test(code: u32, fatal: bool) -> TestSpec {
    TestSpec {
        stdin: Some(code.to_string().into()),
        fatal,
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires root"]
async fn all_declared_tests_run_in_order() {
    let engine = test_engine();
    let request = JobRequest {
        tests: vec![
            TestSpec {
                name: Some("first".to_owned()),
                stdin: Some("1\n".into()),
                ..Default::default()
            },
            TestSpec {
                stdin: Some("2\n".into()),
                ..Default::default()
            },
        ],
        ..JobRequest::new("python", "print(input())")
    };

    let report = engine.run(request).await.unwrap();
    let tests = report.tests.as_ref().unwrap();

    assert_eq!(tests.len(), 2);
    assert_eq!(tests[0].name, "first");
    assert_eq!(tests[0].stdout, b"1\n");
    assert_eq!(tests[1].name, "test001");
    assert_eq!(tests[1].stdout, b"2\n");
}

#[tokio::test]
#[ignore = "requires root"]
async fn non_fatal_failure_continues_iteration() {
    let engine = test_engine();
    let request = JobRequest {
        tests: vec![exit_code_test(1, false), exit_code_test(0, false)],
        ..JobRequest::new("python", EXIT_WITH_INPUT)
    };

    let report = engine.run(request).await.unwrap();
    let tests = report.tests.as_ref().unwrap();

    assert_eq!(tests.len(), 2);
    assert_eq!(tests[0].meta.exitcode, Some(1));
    assert_eq!(tests[1].meta.exitcode, Some(0));
}

#[tokio::test]
#[ignore = "requires root"]
async fn fatal_test_truncates_the_run() {
    let engine = test_engine();
    let request = JobRequest {
        tests: vec![
            exit_code_test(0, false),
            exit_code_test(1, true),
            exit_code_test(0, false),
        ],
        ..JobRequest::new("python", EXIT_WITH_INPUT)
    };

    let report = engine.run(request).await.unwrap();
    let tests = report.tests.as_ref().unwrap();

    // A non-empty prefix of the declared tests.
    assert_eq!(tests.len(), 2);
    assert_eq!(tests[1].meta.exitcode, Some(1));
}

#[tokio::test]
#[ignore = "requires root"]
async fn all_fatal_stops_at_first_failure() {
    let engine = test_engine();
    let request = JobRequest {
        all_fatal: true,
        tests: vec![exit_code_test(3, false), exit_code_test(0, false)],
        ..JobRequest::new("python", EXIT_WITH_INPUT)
    };

    let report = engine.run(request).await.unwrap();
    let tests = report.tests.as_ref().unwrap();

    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0].meta.exitcode, Some(3));
    assert_eq!(tests[0].meta.status, SandboxStatus::RuntimeError);
}

#[tokio::test]
#[ignore = "requires root"]
async fn busy_loop_times_out() {
    let engine = test_engine();
    let request = JobRequest {
        execute: ResourceLimits::new().with_time(0.5).with_wall_time(2.0),
        ..JobRequest::new("python", "while True:\n    pass\n")
    };

    let report = engine.run(request).await.unwrap();
    let tests = report.tests.as_ref().unwrap();

    assert_eq!(tests[0].meta.status, SandboxStatus::TimedOut);
}

#[tokio::test]
#[ignore = "requires root"]
async fn per_test_limit_overrides_job_limit() {
    let engine = test_engine();
    let request = JobRequest {
        execute: ResourceLimits::new().with_time(0.2).with_wall_time(2.0),
        tests: vec![TestSpec {
            // Generous override lets the slow test pass
            limits: ResourceLimits::new().with_time(5.0).with_wall_time(10.0),
            ..Default::default()
        }],
        ..JobRequest::new(
            "python",
            "for _ in range(10**7):\n    pass\nprint(\"done\")\n",
        )
    };

    let report = engine.run(request).await.unwrap();
    let tests = report.tests.as_ref().unwrap();

    assert_eq!(tests[0].meta.status, SandboxStatus::Ok);
    assert_eq!(tests[0].stdout, b"done\n");
}

#[tokio::test]
#[ignore = "requires root"]
async fn stdout_cap_truncates_capture() {
    let engine = test_engine();
    let request = JobRequest {
        execute: ResourceLimits {
            stdout_cap: Some(16),
            ..Default::default()
        },
        ..JobRequest::new("python", "print(\"x\" * 10000)")
    };

    let report = engine.run(request).await.unwrap();
    let tests = report.tests.as_ref().unwrap();

    assert_eq!(tests[0].stdout.len(), 16);
}
