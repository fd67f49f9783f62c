//! Integration tests: exercise the reference demo handlers end to end and
//! drive the HTTP surface with a real bound server, the way
//! `bpmn-lite-server`'s integration suite drives `BpmnLiteEngine` through
//! proto-compatible inputs.

use std::sync::Arc;
use std::time::Duration;

use coordinator_core::substrate::local::{HandlerFn, HandlerFuture, LocalSubstrate};
use coordinator_core::wire::{Call, CallOp, Request};
use coordinator_core::{Workload, WorkloadConfig, WorkloadOutcome, MAIN_PID};
use coordinator_server::demo::{echo_handler, factorial_handler};
use coordinator_server::router::build_router;
use tokio::net::TcpListener;

/// Scenario 1 (spec.md §8): repeated checkpointing converges on `n!` with no
/// crashes in the loop.
#[tokio::test]
async fn factorial_demo_computes_the_right_value_via_repeated_checkpoints() {
    let substrate = Arc::new(LocalSubstrate::new(factorial_handler()));
    let workload = Workload::new(substrate, WorkloadConfig::default());

    let outcome = workload.run(serde_json::json!({"n": 6})).await;
    match outcome {
        WorkloadOutcome::Completed(result) => assert_eq!(result, "720"),
        WorkloadOutcome::Fatal(message) => panic!("workload failed: {message}"),
    }
}

#[tokio::test]
async fn factorial_demo_handles_the_zero_case() {
    let substrate = Arc::new(LocalSubstrate::new(factorial_handler()));
    let workload = Workload::new(substrate, WorkloadConfig::default());

    let outcome = workload.run(serde_json::json!({"n": 0})).await;
    match outcome {
        WorkloadOutcome::Completed(result) => assert_eq!(result, "1"),
        WorkloadOutcome::Fatal(message) => panic!("workload failed: {message}"),
    }
}

/// Binds a real `axum` server on an ephemeral port and returns its base URL
/// plus the workload backing it, so a test can both hit the wire and poke at
/// workload-internal state (e.g. a process's pid) to build requests.
async fn spawn_test_server(workload: Arc<Workload>) -> String {
    let app = build_router(workload);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server crashed");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn ping_endpoint_reports_liveness() {
    let substrate = Arc::new(LocalSubstrate::new(echo_handler()));
    let workload = Workload::new(substrate, WorkloadConfig::default());
    let base = spawn_test_server(workload.clone()).await;

    // The main process only starts once `run` is polled; the RPC endpoint
    // itself comes up independently, matching spec.md §4.5's "coordinator
    // polls GET /ping... before starting the workload" ordering.
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{base}/ping"))
        .send()
        .await
        .expect("ping request");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "pong");
}

#[tokio::test]
async fn rpc_endpoint_rejects_a_malformed_body_with_400() {
    let substrate = Arc::new(LocalSubstrate::new(echo_handler()));
    let workload = Workload::new(substrate, WorkloadConfig::default());
    let base = spawn_test_server(workload).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(&base)
        .body("not json")
        .send()
        .await
        .expect("rpc request");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rpc_endpoint_rejects_an_unknown_pid_with_400() {
    let substrate = Arc::new(LocalSubstrate::new(echo_handler()));
    let workload = Workload::new(substrate, WorkloadConfig::default());
    let base = spawn_test_server(workload).await;

    let request = Request {
        pid: coordinator_core::Pid(41),
        seqno: 0,
        chk_id: String::new(),
        calls: vec![Call { seqno: 0, op: CallOp::Checkpoint }],
        blocked: false,
        err: None,
    };

    let client = reqwest::Client::new();
    let resp = client
        .post(&base)
        .json(&request)
        .send()
        .await
        .expect("rpc request");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

/// A dispatched call that resolves well within the RPC deadline returns 200
/// with the JSON result of the last executed call (spec.md §4.4 step 3a),
/// and the accepted result becomes the process's run-state once the
/// outstanding (slow) synchronous invocation is abandoned in favor of it.
#[tokio::test]
async fn rpc_endpoint_returns_200_for_a_call_that_resolves_immediately() {
    // A handler whose invocation never returns within the test's lifetime:
    // the process's only path to completion is the RPC delivered below.
    let stalled: HandlerFn = Arc::new(|_input| -> HandlerFuture {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("invocation outlives the test")
        })
    });
    let substrate = Arc::new(LocalSubstrate::new(stalled));
    let config = WorkloadConfig { rpc_timeout: Duration::from_millis(500), ..WorkloadConfig::default() };
    let workload = Workload::new(substrate, config);
    let base = spawn_test_server(workload.clone()).await;

    let run_handle = tokio::spawn({
        let workload = workload.clone();
        async move { workload.run(serde_json::Value::Null).await }
    });

    // Give the main process's driver task a moment to start and take its RPC
    // receiver before this test's own request arrives.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let request = Request {
        pid: MAIN_PID,
        seqno: 1,
        chk_id: String::new(),
        calls: vec![Call {
            seqno: 0,
            op: CallOp::Exit { result: "done-over-rpc".into() },
        }],
        blocked: false,
        err: None,
    };

    let client = reqwest::Client::new();
    let resp = client
        .post(&base)
        .json(&request)
        .send()
        .await
        .expect("rpc request");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let outcome = tokio::time::timeout(Duration::from_millis(200), run_handle)
        .await
        .expect("workload run task")
        .expect("workload run task did not panic");
    match outcome {
        WorkloadOutcome::Completed(result) => assert_eq!(result, "done-over-rpc"),
        WorkloadOutcome::Fatal(message) => panic!("workload failed: {message}"),
    }
}
