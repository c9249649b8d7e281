//! Issue remediation flow against a scripted transport.
mod common;

use std::time::Duration;

use serde_json::json;

use common::FakeTransport;
use coverdeck::error::ClientError;
use coverdeck::remediation::{FAILURE_MESSAGE, FixEvent, IssueFixClient, IssueRef, SUCCESS_MESSAGE};
use coverdeck::session::Outcome;

const APPLY: &str = "/sonar/issue/apply-fix";

fn issue(key: &str) -> IssueRef {
    IssueRef {
        key: key.into(),
        class_name: "com.acme.Cart".into(),
        description: "Remove unused local variable".into(),
    }
}

#[test]
fn apply_fix_posts_issues_and_returns_operation_id() {
    let transport = FakeTransport::new();
    transport.on(APPLY, json!({"operationId": "op-1"}));
    let client = IssueFixClient::new(transport.clone());

    assert_eq!(client.apply_fix(&[issue("AX-1"), issue("AX-2")]).unwrap(), "op-1");
    let body = transport.calls()[0].body.clone().unwrap();
    assert_eq!(body[0]["key"], "AX-1");
    assert_eq!(body[1]["className"], "com.acme.Cart");
}

#[test]
fn apply_fix_without_operation_id_reports_backend_message() {
    let transport = FakeTransport::new();
    transport.on(APPLY, json!({"message": "Sonar is unavailable"}));
    let client = IssueFixClient::new(transport);

    match client.apply_fix(&[issue("AX-1")]) {
        Err(ClientError::Protocol(message)) => assert!(message.contains("Sonar is unavailable")),
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

#[test]
fn empty_selection_sends_nothing() {
    let transport = FakeTransport::new();
    let client = IssueFixClient::new(transport.clone());
    assert!(matches!(client.apply_fix(&[]), Err(ClientError::InvalidRequest(_))));
    assert!(transport.calls().is_empty());
}

#[test]
fn tracking_advances_per_new_step_and_snaps_to_100() {
    let transport = FakeTransport::new();
    let route = "/sonar/issue/fix-status/op-1";
    transport
        .on(route, json!({"step": ["Analyzing issue"]}))
        .on(route, json!({"step": ["Analyzing issue"]}))
        .on(route, json!({"step": ["Analyzing issue", "Applying patch"]}))
        .on(route, json!({"step": ["Analyzing issue", "Applying patch", "✅ Completed"]}));
    let client = IssueFixClient::new(transport);

    let mut progress = Vec::new();
    let mut steps = Vec::new();
    let report = client
        .track("op-1", Duration::from_millis(5), |event| match event {
            FixEvent::Progress(p) => progress.push(*p),
            FixEvent::Step(s) => steps.push(s.clone()),
            FixEvent::Finished(_) => {}
        })
        .unwrap();

    assert_eq!(report.outcome, Outcome::Succeeded);
    assert_eq!(report.message(), SUCCESS_MESSAGE);
    assert_eq!(steps, ["Analyzing issue", "Applying patch", "✅ Completed"]);
    assert_eq!(progress, [15.0, 30.0, 45.0, 100.0]);
}

#[test]
fn failure_sentinel_ends_with_failure_message() {
    let transport = FakeTransport::new();
    transport.on("/sonar/issue/fix-status/op-2", json!({"step": ["❌ Failed: patch did not compile"]}));
    let client = IssueFixClient::new(transport);

    let mut finished = None;
    let report = client
        .track("op-2", Duration::from_millis(5), |event| {
            if let FixEvent::Finished(outcome) = event {
                finished = Some(*outcome);
            }
        })
        .unwrap();

    assert_eq!(finished, Some(Outcome::Failed));
    assert_eq!(report.message(), FAILURE_MESSAGE);
}
