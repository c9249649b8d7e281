//! Dashboard views: metric cards, activity timeline, active sessions,
//! trend chart data and the paginated records table.

use serde_json::json;

use super::format::{
    change_indicator, clamp_percent, file_name, format_duration, format_timestamp, humanize,
    percent, safe_fixed, status_icon, status_style,
};
use super::node::{Element, el};
use crate::dashboard::{
    ActiveSession, ActivityItem, AnalyticsData, DashboardSummary, DashboardView, ImprovementRecord,
    MetricCard, Page,
};

/// Timeline length.
const MAX_ACTIVITY: usize = 10;
/// Page links shown at once.
const PAGE_WINDOW: u32 = 5;

/// The whole dashboard. `page_link` builds the href for a page index.
pub fn dashboard(view: &DashboardView, page_link: &dyn Fn(u32) -> String) -> Element {
    match view {
        DashboardView::Empty => empty_state(),
        DashboardView::Ready(snapshot) => el("div")
            .attr("id", "dashboardContent")
            .child(metric_cards(&snapshot.summary))
            .child(
                el("div")
                    .class("dashboard-columns")
                    .child(section("Recent activity", recent_activity(&snapshot.summary.recent_activity)))
                    .child(section("Active sessions", active_sessions(&snapshot.summary.active_sessions))),
            )
            .maybe(snapshot.summary.analytics.as_ref().map(trend_chart))
            .child(section("Improvement records", records(&snapshot.records, page_link))),
    }
}

fn section(title: &str, body: Element) -> Element {
    el("section").class("panel").child(el("h2").text(title)).child(body)
}

pub fn empty_state() -> Element {
    el("div")
        .attr("id", "dashboardEmptyState")
        .class("empty-state")
        .child(el("h2").text("No improvement sessions yet"))
        .child(el("p").text("Start a file or repository improvement to see productivity data here."))
}

pub fn error_panel(message: &str) -> Element {
    el("div")
        .class("alert alert-danger")
        .attr("role", "alert")
        .child(el("i").class("bi bi-exclamation-triangle"))
        .text(format!(" {message}"))
}

fn muted_placeholder(icon: &'static str, message: &str) -> Element {
    el("div")
        .class("placeholder text-muted")
        .child(el("i").class(format!("bi {icon}")))
        .child(el("p").text(message))
}

fn badge(status: &str) -> Element {
    el("span")
        .class(format!("badge {}", status_style(status).class()))
        .text(status)
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

pub fn metric_cards(summary: &DashboardSummary) -> Element {
    el("div")
        .class("metric-cards")
        .children(summary.cards().into_iter().map(|(slot, card)| metric_card(slot, card)))
}

fn metric_card(slot: &'static str, card: Option<&MetricCard>) -> Element {
    let fallback = MetricCard::default();
    let card = card.unwrap_or(&fallback);
    let color = card.color.as_deref().unwrap_or("blue");

    el("div")
        .class(format!("metric-card metric-{color}"))
        .attr("id", slot)
        .child(el("div").class("metric-title").text(card.title.as_deref().unwrap_or(slot)))
        .child(el("div").class("metric-value").text(card.value.as_deref().unwrap_or("0")))
        .child(el("div").class("metric-subtitle").text(card.subtitle.as_deref().unwrap_or("")))
        .maybe(change_indicator(card).map(|c| {
            el("div")
                .class("metric-change")
                .child(el("span").attr("style", format!("color: {}", c.color)).text(format!("{} {}", c.arrow, c.label)))
        }))
}

// ---------------------------------------------------------------------------
// Activity and active sessions
// ---------------------------------------------------------------------------

pub fn recent_activity(items: &[ActivityItem]) -> Element {
    if items.is_empty() {
        return muted_placeholder("bi-clock-history", "No recent activity");
    }
    el("div")
        .class("timeline")
        .children(items.iter().take(MAX_ACTIVITY).map(activity_item))
}

fn activity_item(item: &ActivityItem) -> Element {
    let status = item.status.as_deref().unwrap_or("");
    let mut meta = el("small").class("text-muted");
    if let Some(path) = item.file_path.as_deref() {
        meta = meta.child(el("code").text(file_name(path))).text(" • ");
    }
    meta = meta.text(item.timestamp.as_deref().map(format_timestamp).unwrap_or_default());

    let increase = item
        .coverage_increase
        .filter(|v| v.is_finite() && *v != 0.0)
        .map(|v| el("span").class("badge bg-success").text(format!("+{v:.1}%")));
    let tests = item
        .tests_generated
        .filter(|n| *n > 0)
        .map(|n| el("small").class("text-muted").text(format!("{n} tests")));

    el("div")
        .class("timeline-item")
        .child(
            el("div")
                .class(format!("timeline-marker {}", status_style(status).class()))
                .child(el("i").class(format!("bi {}", status_icon(status).class()))),
        )
        .child(
            el("div")
                .class("timeline-content")
                .child(el("h6").text(item.description.as_deref().unwrap_or("")))
                .child(meta)
                .maybe(increase)
                .maybe(tests),
        )
}

pub fn active_sessions(sessions: &[ActiveSession]) -> Element {
    if sessions.is_empty() {
        return muted_placeholder("bi-check-circle", "No active sessions");
    }
    el("div").class("active-sessions").children(sessions.iter().map(active_session))
}

fn active_session(session: &ActiveSession) -> Element {
    let status = session.status.as_deref().unwrap_or("UNKNOWN");
    let target = session
        .file_path
        .as_deref()
        .map(file_name)
        .unwrap_or("Repository-wide");

    let progress = session.progress.map(|p| {
        el("div")
            .class("progress-block")
            .child(progress_bar(Some(p)))
            .child(el("small").class("text-muted").text(session.current_step.as_deref().unwrap_or("")))
    });
    let modify = session
        .can_modify
        .unwrap_or(false)
        .then(|| action_button("modify", session.session_id.as_deref(), "Modify"));

    el("div")
        .class("active-session")
        .child(el("h6").text(humanize(session.kind.as_deref().unwrap_or("SESSION"))))
        .child(el("small").class("text-muted").text(target))
        .child(badge(status))
        .maybe(progress)
        .maybe(modify)
}

pub fn progress_bar(value: Option<f64>) -> Element {
    let width = clamp_percent(value);
    el("div").class("progress").child(
        el("div")
            .class("progress-bar")
            .attr("role", "progressbar")
            .attr("style", format!("width: {width:.0}%"))
            .attr("aria-valuenow", format!("{width:.0}")),
    )
}

fn action_button(action: &'static str, session_id: Option<&str>, label: &str) -> Element {
    el("button")
        .class("btn btn-sm")
        .attr("data-action", action)
        .attr("data-session", session_id.unwrap_or(""))
        .text(label)
}

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

/// Chart data only; the page script draws it.
pub fn trend_chart(analytics: &AnalyticsData) -> Element {
    let labels: Vec<&str> = analytics
        .coverage_trends
        .iter()
        .map(|t| t.date.as_deref().unwrap_or(""))
        .collect();
    let finite = |v: Option<f64>| v.filter(|v| v.is_finite()).unwrap_or(0.0);
    let data = json!({
        "labels": labels,
        "datasets": [
            {
                "label": "Coverage Increase %",
                "data": analytics.coverage_trends.iter().map(|t| finite(t.value)).collect::<Vec<_>>(),
            },
            {
                "label": "Success Rate %",
                "data": analytics.success_rate_trends.iter().map(|t| finite(t.value)).collect::<Vec<_>>(),
            },
        ],
    });
    el("section")
        .class("panel")
        .child(el("h2").text("Trends"))
        .child(el("div").class("trend-chart").attr("id", "trendsChart").attr("data-chart", data.to_string()))
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Table plus pagination; a placeholder when the page is empty.
pub fn records(page: &Page<ImprovementRecord>, page_link: &dyn Fn(u32) -> String) -> Element {
    if page.content.is_empty() {
        return muted_placeholder("bi-table", "No improvement records found");
    }
    let header = el("tr").children(
        ["File/Type", "Coverage", "Tests", "Time", "Status", "Actions"]
            .into_iter()
            .map(|h| el("th").text(h)),
    );
    let table = el("table")
        .class("table")
        .child(el("thead").child(header))
        .child(el("tbody").children(page.content.iter().map(record_row)));

    el("div")
        .attr("id", "improvementRecords")
        .child(table)
        .maybe((page.total_pages > 1).then(|| pagination(page.number, page.total_pages, page_link)))
}

fn record_row(record: &ImprovementRecord) -> Element {
    let coverage = match record.coverage_increase {
        Some(increase) => el("td")
            .child(el("span").class("badge bg-success").text(format!("+{}%", safe_fixed(Some(increase), 1))))
            .child(el("br"))
            .child(el("small").class("text-muted").text(format!(
                "{} → {}",
                percent(record.original_coverage, 1),
                percent(record.improved_coverage, 1)
            ))),
        None => el("td").child(el("span").class("text-muted").text("N/A")),
    };

    let validation = record
        .validation
        .as_ref()
        .and_then(|v| v.tests_executed.filter(|n| *n > 0).map(|n| (v.tests_passed.unwrap_or(0), n)))
        .map(|(passed, executed)| {
            el("small")
                .class("text-muted")
                .text(format!("{passed}/{executed} passed"))
        });

    let status = record.status.as_deref().unwrap_or("UNKNOWN");
    el("tr")
        .child(
            el("td")
                .child(el("strong").text(record.title()))
                .child(el("br"))
                .child(el("small").class("text-muted").text(
                    record
                        .started_at
                        .as_deref()
                        .map(format_timestamp)
                        .unwrap_or_else(|| "Unknown time".to_string()),
                )),
        )
        .child(coverage)
        .child(
            el("td")
                .text(record.total_tests_generated.unwrap_or(0).to_string())
                .maybe(validation.map(|v| el("span").child(el("br")).child(v))),
        )
        .child(el("td").text(format_duration(record.processing_time_ms)))
        .child(el("td").child(badge(status)))
        .child(
            el("td")
                .child(action_button("view", record.session_id.as_deref(), "View"))
                .maybe(
                    record
                        .can_modify()
                        .then(|| action_button("modify", record.session_id.as_deref(), "Modify")),
                ),
        )
}

/// Previous, a window of up to five page numbers, Next. Page indices are
/// zero-based; labels are one-based.
pub fn pagination(current: u32, total_pages: u32, page_link: &dyn Fn(u32) -> String) -> Element {
    let item = |label: String, target: Option<u32>, active: bool| {
        let mut class = "page-item".to_string();
        if target.is_none() {
            class.push_str(" disabled");
        }
        if active {
            class.push_str(" active");
        }
        let link = match target {
            Some(page) => el("a").class("page-link").attr("href", page_link(page)).text(label),
            None => el("span").class("page-link").text(label),
        };
        el("li").class(class).child(link)
    };

    let last = total_pages.saturating_sub(1);
    let start = current.saturating_sub(2);
    let end = total_pages.min(start + PAGE_WINDOW);

    let mut list = el("ul")
        .class("pagination")
        .child(item("Previous".to_string(), (current > 0).then(|| current - 1), false));
    for page in start..end {
        list = list.child(item((page + 1).to_string(), Some(page), page == current));
    }
    list = list.child(item("Next".to_string(), (current < last).then(|| current + 1), false));

    el("nav").child(list)
}
