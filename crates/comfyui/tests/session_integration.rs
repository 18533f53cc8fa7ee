//! End-to-end tests for [`GenerationSession`] against the mock engine.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use axum::http::StatusCode;
use kinema_comfyui::api::ComfyUIApiError;
use kinema_comfyui::config::EngineConfig;
use kinema_comfyui::session::{GenerationError, GenerationSession};
use kinema_core::job_graph::{JobGraph, NodeDefinition};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{Frame, MockEngine, MockJob};

fn graph() -> JobGraph {
    JobGraph::new([
        (
            "5",
            NodeDefinition::new("VAEDecode", "Decode").with_input("samples", json!(["3", 0])),
        ),
        (
            "9",
            NodeDefinition::new("SaveImageWebsocket", "Output").with_input("images", json!(["5", 0])),
        ),
    ])
    .unwrap()
}

fn config_for(engine: &MockEngine) -> EngineConfig {
    EngineConfig {
        output_node_title: "Output".into(),
        job_timeout: Some(Duration::from_secs(10)),
        ..engine.config()
    }
}

#[tokio::test]
async fn collects_output_frames_for_awaited_job() {
    let engine = MockEngine::start(vec![MockJob::ok(
        "job-1",
        vec![
            Frame::executing("job-1", Some("5")),
            Frame::image(b"preview"),
            Frame::executing("job-1", Some("9")),
            Frame::image(b"frame1"),
            Frame::executing("other-job", Some("5")),
            Frame::image(b"frame2"),
            Frame::executing("other-job", None),
            Frame::executing("job-1", None),
        ],
    )])
    .await;

    let mut session = GenerationSession::new(config_for(&engine));
    let outputs = session
        .generate(&graph(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outputs.len(), 1);
    assert_eq!(
        outputs["Output"],
        vec![b"frame1".to_vec(), b"frame2".to_vec()]
    );

    // The socket and the submission share the session id.
    assert_eq!(engine.ws_client_ids(), vec![session.session_id().to_string()]);
    let prompts = engine.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0]["client_id"], session.session_id());
    assert_eq!(prompts[0]["prompt"]["9"]["_meta"]["title"], "Output");
    assert_eq!(prompts[0]["prompt"]["9"]["class_type"], "SaveImageWebsocket");

    assert!(session.is_connected());
    session.close().await;
    assert!(!session.is_connected());
}

#[tokio::test]
async fn socket_is_reused_across_jobs() {
    let engine = MockEngine::start(vec![
        MockJob::ok(
            "job-1",
            vec![
                Frame::executing("job-1", Some("9")),
                Frame::image(b"first"),
                Frame::executing("job-1", None),
            ],
        ),
        MockJob::ok(
            "job-2",
            vec![
                Frame::executing("job-2", Some("9")),
                Frame::image(b"second"),
                Frame::executing("job-2", None),
            ],
        ),
    ])
    .await;

    let mut session = GenerationSession::new(config_for(&engine));
    let cancel = CancellationToken::new();

    let first = session.generate(&graph(), &cancel).await.unwrap();
    let second = session.generate(&graph(), &cancel).await.unwrap();

    assert_eq!(first["Output"], vec![b"first".to_vec()]);
    assert_eq!(second["Output"], vec![b"second".to_vec()]);
    assert_eq!(engine.ws_client_ids().len(), 1);
    session.close().await;
}

#[tokio::test]
async fn response_without_prompt_id_is_submission_error() {
    let engine =
        MockEngine::start(vec![MockJob::respond(StatusCode::OK, json!({"number": 3}))]).await;

    let mut session = GenerationSession::new(config_for(&engine));
    let result = session.generate(&graph(), &CancellationToken::new()).await;

    assert_matches!(
        result,
        Err(GenerationError::Submission(ComfyUIApiError::InvalidResponse(_)))
    );
    assert!(!session.is_connected());
}

#[tokio::test]
async fn rejected_job_is_submission_error_with_status() {
    let engine = MockEngine::start(vec![MockJob::respond(
        StatusCode::BAD_REQUEST,
        json!({"error": {"type": "prompt_outputs_failed_validation"}}),
    )])
    .await;

    let mut session = GenerationSession::new(config_for(&engine));
    let result = session.generate(&graph(), &CancellationToken::new()).await;

    assert_matches!(
        result,
        Err(GenerationError::Submission(ComfyUIApiError::ApiError { status: 400, .. }))
    );
}

#[tokio::test]
async fn server_close_before_completion_is_transport_error() {
    let engine = MockEngine::start(vec![
        MockJob::ok(
            "job-1",
            vec![
                Frame::executing("job-1", Some("9")),
                Frame::image(b"partial"),
                Frame::Close,
            ],
        ),
        MockJob::ok(
            "job-2",
            vec![
                Frame::executing("job-2", Some("9")),
                Frame::image(b"retry"),
                Frame::executing("job-2", None),
            ],
        ),
    ])
    .await;

    let mut session = GenerationSession::new(config_for(&engine));
    let cancel = CancellationToken::new();

    let result = session.generate(&graph(), &cancel).await;
    assert_matches!(result, Err(GenerationError::Transport(_)));
    assert!(!session.is_connected());

    // A caller-level retry reconnects under the same session id and starts
    // from an empty result set.
    let outputs = session.generate(&graph(), &cancel).await.unwrap();
    assert_eq!(outputs["Output"], vec![b"retry".to_vec()]);
    assert_eq!(
        engine.ws_client_ids(),
        vec![session.session_id().to_string(); 2]
    );
    session.close().await;
}

#[tokio::test]
async fn job_that_never_finishes_times_out() {
    let engine = MockEngine::start(vec![MockJob::ok(
        "job-1",
        vec![Frame::executing("job-1", Some("9")), Frame::image(b"stuck")],
    )])
    .await;

    let mut session = GenerationSession::new(EngineConfig {
        job_timeout: Some(Duration::from_millis(200)),
        ..config_for(&engine)
    });
    let result = session.generate(&graph(), &CancellationToken::new()).await;

    assert_matches!(result, Err(GenerationError::Timeout(d)) if d == Duration::from_millis(200));
    assert!(!session.is_connected());
}

#[tokio::test]
async fn cancellation_closes_the_socket() {
    let engine = MockEngine::start(vec![MockJob::ok(
        "job-1",
        vec![Frame::executing("job-1", Some("9"))],
    )])
    .await;

    let mut session = GenerationSession::new(config_for(&engine));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = session.generate(&graph(), &cancel).await;
    assert_matches!(result, Err(GenerationError::Cancelled));
    assert!(!session.is_connected());
}

#[tokio::test]
async fn cancellation_during_submission_closes_the_socket() {
    let engine = MockEngine::start(vec![MockJob::stalled()]).await;

    let mut session = GenerationSession::new(config_for(&engine));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(3),
        session.generate(&graph(), &cancel),
    )
    .await
    .expect("generate returns promptly once cancelled");

    assert_matches!(result, Err(GenerationError::Cancelled));
    assert!(!session.is_connected());
}

#[tokio::test]
async fn already_cancelled_token_submits_nothing() {
    let engine = MockEngine::start(vec![MockJob::ok("job-1", vec![])]).await;

    let mut session = GenerationSession::new(config_for(&engine));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = session.generate(&graph(), &cancel).await;
    assert_matches!(result, Err(GenerationError::Cancelled));
    assert!(!session.is_connected());
}
