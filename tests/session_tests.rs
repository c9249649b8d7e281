//! Session client and tracker tests against scripted transports.
mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{FakeChannelFactory, FakeTransport, progress_frame};
use coverdeck::error::ClientError;
use coverdeck::session::tracker::track;
use coverdeck::session::{
    ApplyRequest, FileImproveRequest, Outcome, RepoImproveRequest, SessionClient, SessionState,
    TrackerEvent,
};
use coverdeck::transport::Frame;

const POLL: Duration = Duration::from_millis(5);

fn status_route(id: &str) -> String {
    format!("/api/coverage/file/session/{id}/status")
}

fn file_request() -> FileImproveRequest {
    FileImproveRequest::new("https://github.com/acme/shop", "main", "src/main/java/Cart.java")
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn start_posts_the_request_body() {
    let transport = FakeTransport::new();
    transport.on("/api/coverage/file/improve-async", json!({"sessionId": "s1"}));
    let mut client = SessionClient::new(transport.clone(), FakeChannelFactory::refusing());

    let session = client.start_file_session(&file_request()).unwrap();
    assert_eq!(session.id(), "s1");
    assert_eq!(session.state(), SessionState::Created);

    let call = &transport.calls()[0];
    assert_eq!(call.method, "POST");
    let body = call.body.as_ref().unwrap();
    assert_eq!(body["filePath"], "src/main/java/Cart.java");
    assert_eq!(body["repositoryUrl"], "https://github.com/acme/shop");
}

#[test]
fn missing_session_id_leaves_no_active_session() {
    let transport = FakeTransport::new();
    transport.on("/api/coverage/repo/improve-async", json!({"message": "queued"}));
    let mut client = SessionClient::new(transport.clone(), FakeChannelFactory::refusing());

    let err = client
        .start_repository_session(&RepoImproveRequest::new("u", "main"))
        .unwrap_err();
    assert!(matches!(err, ClientError::Protocol(_)));
    assert!(client.session().is_none());
}

#[test]
fn apply_routes_by_session_kind() {
    let transport = FakeTransport::new();
    transport
        .on("/api/coverage/file/improve-async", json!({"sessionId": "f1"}))
        .on("/api/coverage/repo/improve-async", json!({"sessionId": "r1"}))
        .on("/api/coverage/file/session/f1/apply", json!({"success": true}))
        .on(
            "/api/coverage/repo/session/r1/apply",
            json!({"success": true, "pullRequest": {"success": true, "prUrl": "https://github.com/acme/shop/pull/9"}}),
        );
    let mut client = SessionClient::new(transport.clone(), FakeChannelFactory::refusing());

    client.start_file_session(&file_request()).unwrap();
    assert!(client.apply_changes("f1", &ApplyRequest::for_session("f1")).unwrap().is_success());

    client
        .start_repository_session(&RepoImproveRequest::new("u", "main"))
        .unwrap();
    let result = client.apply_changes("r1", &ApplyRequest::for_session("r1")).unwrap();
    assert_eq!(
        result.pull_request.and_then(|pr| pr.pr_url).as_deref(),
        Some("https://github.com/acme/shop/pull/9")
    );

    let apply = transport.calls_to("/api/coverage/repo/session/r1/apply");
    assert_eq!(apply.len(), 1);
    let body = apply[0].body.as_ref().unwrap();
    assert_eq!(body["createPullRequest"], true);
    assert_eq!(body["prTitle"], "Improve coverage for r1");
}

#[test]
fn apply_failure_is_reported_not_raised() {
    let transport = FakeTransport::new();
    transport
        .on("/api/coverage/file/improve-async", json!({"sessionId": "f1"}))
        .on("/api/coverage/file/session/f1/apply", json!({"error": "merge conflict"}));
    let mut client = SessionClient::new(transport.clone(), FakeChannelFactory::refusing());

    client.start_file_session(&file_request()).unwrap();
    let result = client.apply_changes("f1", &ApplyRequest::for_session("f1")).unwrap();
    assert!(!result.is_success());
    assert_eq!(result.error.as_deref(), Some("merge conflict"));
}

#[test]
fn cancel_closes_the_channel_and_is_idempotent() {
    let transport = FakeTransport::new();
    transport
        .on("/api/coverage/file/improve-async", json!({"sessionId": "s1"}))
        .on("/api/coverage/session/s1/cancel", json!({"cancelled": true}));
    let channels = FakeChannelFactory::with_frames(Vec::new());
    let mut client = SessionClient::new(transport.clone(), channels.clone());

    client.start_file_session(&file_request()).unwrap();
    client.open_progress_channel(|_| {}).unwrap();
    assert!(client.channel_open());

    let ack = client.cancel("s1").unwrap();
    assert_eq!(ack.cancelled, Some(true));
    assert!(!ack.already_terminal);
    assert!(!client.channel_open());
    assert!(channels.source_closed());
    assert_eq!(client.session().unwrap().state(), SessionState::Cancelled);

    let again = client.cancel("s1").unwrap();
    assert!(again.already_terminal);
    assert_eq!(transport.calls_to("/api/coverage/session/s1/cancel").len(), 1);
}

#[test]
fn operations_on_a_replaced_session_are_rejected() {
    let transport = FakeTransport::new();
    transport
        .on("/api/coverage/file/improve-async", json!({"sessionId": "s1"}))
        .on("/api/coverage/file/improve-async", json!({"sessionId": "s2"}));
    let mut client = SessionClient::new(transport.clone(), FakeChannelFactory::refusing());

    client.start_file_session(&file_request()).unwrap();
    client.start_file_session(&file_request()).unwrap();

    let err = client.cancel("s1").unwrap_err();
    assert_eq!(
        err,
        ClientError::StaleSession {
            given: "s1".into(),
            active: "s2".into()
        }
    );
    assert!(matches!(client.status("s1"), Err(ClientError::StaleSession { .. })));
    assert!(matches!(
        client.apply_changes("s1", &ApplyRequest::for_session("s1")),
        Err(ClientError::StaleSession { .. })
    ));
    assert_eq!(transport.calls().len(), 2);
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

#[test]
fn tracking_over_the_channel_ends_at_100_percent() {
    let transport = FakeTransport::new();
    transport
        .on("/api/coverage/file/improve-async", json!({"sessionId": "s1"}))
        .on(
            &status_route("s1"),
            json!({"status": "COMPLETED", "results": {"fileName": "Cart.java", "totalTestsGenerated": 4}}),
        );
    let channels = FakeChannelFactory::with_frames(vec![
        progress_frame("s1", 10.0, "Analyzing file"),
        Ok(Frame::Text("not json".into())),
        progress_frame("s1", 60.0, "Generating tests"),
        progress_frame("s1", 100.0, "Done"),
    ]);
    let mut client = SessionClient::new(transport.clone(), channels.clone());
    client.start_file_session(&file_request()).unwrap();

    let mut events = Vec::new();
    let report = track(&mut client, POLL, |e| events.push(e.clone())).unwrap();

    assert_eq!(report.outcome, Outcome::Succeeded);
    assert!(!report.used_fallback);
    let results = report.status.and_then(|s| s.results).unwrap();
    assert_eq!(results.total_tests_generated, Some(4));

    let percents: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            TrackerEvent::Progress(u) => Some(u.percent()),
            _ => None,
        })
        .collect();
    assert_eq!(percents, [10.0, 60.0, 100.0]);
    assert_eq!(events.last(), Some(&TrackerEvent::Finished(Outcome::Succeeded)));
    assert!(channels.source_closed());
    assert_eq!(client.session().unwrap().state(), SessionState::Completed);
}

#[test]
fn tracking_falls_back_to_polling_when_the_channel_is_refused() {
    let transport = FakeTransport::new();
    transport
        .on("/api/coverage/file/improve-async", json!({"sessionId": "s1"}))
        .on(&status_route("s1"), json!({"status": "ANALYZING_FILE", "step": ["Cloning repository"]}))
        .on(
            &status_route("s1"),
            json!({"status": "GENERATING_TESTS", "step": ["Cloning repository", "Generating tests"]}),
        )
        .on(
            &status_route("s1"),
            json!({"status": "COMPLETED", "step": ["Cloning repository", "Generating tests", "✅ Completed"]}),
        );
    let mut client = SessionClient::new(transport.clone(), FakeChannelFactory::refusing());
    client.start_file_session(&file_request()).unwrap();

    let mut events = Vec::new();
    let report = track(&mut client, POLL, |e| events.push(e.clone())).unwrap();

    assert_eq!(report.outcome, Outcome::Succeeded);
    assert!(report.used_fallback);
    assert!(matches!(events[0], TrackerEvent::FellBack { .. }));

    let steps: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            TrackerEvent::Step(s) => Some(s.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(steps, ["Cloning repository", "Generating tests", "✅ Completed"]);
}

#[test]
fn tracking_falls_back_when_the_channel_closes_early() {
    let transport = FakeTransport::new();
    transport
        .on("/api/coverage/file/improve-async", json!({"sessionId": "s1"}))
        .on(&status_route("s1"), json!({"step": ["Analyzing", "❌ Failed"]}));
    let channels = FakeChannelFactory::with_frames(vec![
        progress_frame("s1", 30.0, "Analyzing"),
        Ok(Frame::Closed),
    ]);
    let mut client = SessionClient::new(transport.clone(), channels);
    client.start_file_session(&file_request()).unwrap();

    let mut events = Vec::new();
    let report = track(&mut client, POLL, |e| events.push(e.clone())).unwrap();

    assert_eq!(report.outcome, Outcome::Failed);
    assert!(report.used_fallback);
    assert!(events.iter().any(|e| matches!(e, TrackerEvent::FellBack { .. })));
    // "Analyzing" already arrived over the channel.
    let steps: Vec<&TrackerEvent> = events
        .iter()
        .filter(|e| matches!(e, TrackerEvent::Step(_)))
        .collect();
    assert_eq!(steps, [&TrackerEvent::Step("❌ Failed".into())]);
    assert_eq!(client.session().unwrap().state(), SessionState::Failed);
}

#[test]
fn polling_error_ends_tracking() {
    let transport = FakeTransport::new();
    transport
        .on("/api/coverage/file/improve-async", json!({"sessionId": "s1"}))
        .fail(&status_route("s1"), ClientError::network("/status", "HTTP 503 Service Unavailable"));
    let mut client = SessionClient::new(transport.clone(), FakeChannelFactory::refusing());
    client.start_file_session(&file_request()).unwrap();

    let err = track(&mut client, POLL, |_| {}).unwrap_err();
    assert!(matches!(err, ClientError::Network { .. }));
}

#[test]
fn tracking_without_a_session_is_a_usage_error() {
    let transport = FakeTransport::new();
    let mut client = SessionClient::new(transport, Arc::new(coverdeck::transport::ws::WsChannelFactory::new("ws://127.0.0.1:1")));
    assert_eq!(
        track(&mut client, POLL, |_| {}).unwrap_err(),
        ClientError::NoActiveSession
    );
}
