//! Dashboard loader and coverage browser tests.
mod common;

use serde_json::json;

use common::FakeTransport;
use coverdeck::coverage::{BackTarget, CoverageBrowser};
use coverdeck::dashboard::{
    DashboardFilter, DashboardLoader, DashboardView, FilterChange, Refreshed, RepositoryContext,
    SortOrder, StatusFilter, TimeRange,
};
use coverdeck::error::ClientError;

const SUMMARY: &str = "/api/repository/42/dashboard/summary";
const RECORDS: &str = "/api/repository/42/dashboard/records";
const CHILDREN: &str = "/coverage-dashboard/children";

fn context() -> RepositoryContext {
    RepositoryContext {
        repository_id: "42".into(),
        repository_url: "https://github.com/acme/shop".into(),
        branch: "main".into(),
    }
}

fn populated() -> std::sync::Arc<FakeTransport> {
    let transport = FakeTransport::new();
    transport
        .on(SUMMARY, json!({
            "totalSessions": {"title": "Total Sessions", "value": "1,204"},
            "recentActivity": null,
            "activeSessions": []
        }))
        .on(RECORDS, json!({
            "content": [{"sessionId": "a", "fileName": "Cart.java", "status": "COMPLETED"}, null],
            "number": 0,
            "totalPages": 3,
            "totalElements": 41,
            "size": 20
        }));
    transport
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[test]
fn full_load_sends_filter_and_repository() {
    let transport = populated();
    let loader = DashboardLoader::new(transport.clone(), context(), DashboardFilter::default());

    let DashboardView::Ready(snapshot) = loader.load().unwrap() else {
        panic!("expected a populated dashboard");
    };
    assert_eq!(snapshot.records.content.len(), 1);
    assert_eq!(snapshot.records.total_pages, 3);
    assert!(snapshot.summary.recent_activity.is_empty());

    let summary = &transport.calls_to(SUMMARY)[0];
    assert_eq!(summary.query("repositoryUrl"), Some("https://github.com/acme/shop"));
    assert_eq!(summary.query("timeRange"), Some("LAST_30_DAYS"));
    assert_eq!(summary.query("status"), None);

    let records = &transport.calls_to(RECORDS)[0];
    assert_eq!(records.query("status"), Some("ALL"));
    assert_eq!(records.query("sortBy"), Some("DATE_DESC"));
    assert_eq!(records.query("page"), Some("0"));
    assert_eq!(records.query("size"), Some("20"));
}

#[test]
fn empty_summary_skips_the_records_request() {
    let transport = FakeTransport::new();
    transport.on(SUMMARY, json!({"totalSessions": {"value": 0}}));
    let loader = DashboardLoader::new(transport.clone(), context(), DashboardFilter::default());

    assert_eq!(loader.load().unwrap(), DashboardView::Empty);
    assert_eq!(transport.paths(), [SUMMARY]);
}

#[test]
fn status_and_sort_changes_reload_only_records() {
    let transport = populated();
    let mut loader = DashboardLoader::new(transport.clone(), context(), DashboardFilter::default());

    let refreshed = loader.apply(FilterChange::Status(StatusFilter::Failed)).unwrap();
    assert!(matches!(refreshed, Refreshed::Records(_)));
    let refreshed = loader.apply(FilterChange::Sort(SortOrder::CoverageDesc)).unwrap();
    assert!(matches!(refreshed, Refreshed::Records(_)));

    assert!(transport.calls_to(SUMMARY).is_empty());
    let last = transport.calls().pop().unwrap();
    assert_eq!(last.query("status"), Some("FAILED"));
    assert_eq!(last.query("sortBy"), Some("COVERAGE_DESC"));
}

#[test]
fn time_range_change_reloads_both_and_resets_the_page() {
    let transport = populated();
    let mut loader = DashboardLoader::new(transport.clone(), context(), DashboardFilter::default());

    loader.apply(FilterChange::Page(2)).unwrap();
    assert_eq!(loader.filter().page, 2);

    let refreshed = loader.apply(FilterChange::TimeRange(TimeRange::Last7Days)).unwrap();
    assert!(matches!(refreshed, Refreshed::View(DashboardView::Ready(_))));
    assert_eq!(loader.filter().page, 0);

    assert_eq!(transport.calls_to(SUMMARY).len(), 1);
    let last = transport.calls().pop().unwrap();
    assert_eq!(last.path, RECORDS);
    assert_eq!(last.query("timeRange"), Some("LAST_7_DAYS"));
    assert_eq!(last.query("page"), Some("0"));
}

#[test]
fn missing_repository_id_is_rejected_locally() {
    let transport = FakeTransport::new();
    let mut ctx = context();
    ctx.repository_id = "  ".into();
    let loader = DashboardLoader::new(transport.clone(), ctx, DashboardFilter::default());

    assert!(matches!(loader.load(), Err(ClientError::InvalidRequest(_))));
    assert!(transport.calls().is_empty());
}

#[test]
fn backend_failure_propagates() {
    let transport = FakeTransport::new();
    transport.fail(SUMMARY, ClientError::network(SUMMARY, "HTTP 500 Internal Server Error"));
    let loader = DashboardLoader::new(transport, context(), DashboardFilter::default());
    assert!(matches!(loader.load(), Err(ClientError::Network { .. })));
}

// ---------------------------------------------------------------------------
// Coverage drill-down
// ---------------------------------------------------------------------------

#[test]
fn drill_down_and_back_to_root() {
    let transport = FakeTransport::new();
    transport
        .on(CHILDREN, json!([{"path": "src", "type": "DIR", "metricsMap": {"coverage": 71.5}}]))
        .on(CHILDREN, json!([{"path": "src/Cart.java", "type": "FILE", "metricsMap": {"coverage": "64.2"}}]));
    let mut browser = CoverageBrowser::new(transport.clone());

    let listing = browser.open("src").unwrap();
    assert_eq!(listing.path, "src");
    assert_eq!(listing.entries.len(), 1);
    assert_eq!(browser.depth(), 1);

    assert_eq!(browser.back().unwrap(), BackTarget::Root);
    assert_eq!(browser.depth(), 0);
    assert_eq!(browser.current_path(), "");
    assert_eq!(transport.calls()[0].query("parentPath"), Some("src"));
}

#[test]
fn failed_open_does_not_grow_the_stack() {
    let transport = FakeTransport::new();
    transport.fail(CHILDREN, ClientError::network(CHILDREN, "timeout"));
    let mut browser = CoverageBrowser::new(transport);

    assert!(browser.open("src").is_err());
    assert_eq!(browser.depth(), 0);
    assert_eq!(browser.current_path(), "");
}
