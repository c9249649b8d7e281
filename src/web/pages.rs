//! Page handlers for the web console.
//!
//! Filter edits arrive as query parameters. Only parameters that differ
//! from the current filter count as changes, so a plain reload of the same
//! URL refetches everything, while a status, sort or page edit refetches
//! the records table and keeps the cached summary.

use std::str::FromStr;

use serde_json::json;

use super::{Console, Reply, param, percent_encode};
use crate::coverage::BackTarget;
use crate::dashboard::{
    Category, DashboardFilter, DashboardView, FilterChange, Reload, SortOrder, StatusFilter,
    SubCategory, TimeRange,
};
use crate::error::ClientError;
use crate::render::dashboard::{dashboard as dashboard_view, error_panel, records as records_view};
use crate::render::coverage::listing;
use crate::render::page::document;
use crate::render::{Element, el};

type Query = [(String, String)];

const BACK_HREF: &str = "/coverage/back";

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// `GET /`.
pub(super) fn dashboard(console: &mut Console, query: &Query) -> Reply {
    let changes = match filter_changes(console.loader.filter(), query) {
        Ok(changes) => changes,
        Err(message) => return error_page(400, "Dashboard", &message),
    };

    let full = changes.is_empty() || console.last_view.is_none() || changes.iter().any(|c| c.reload() == Reload::Full);
    for change in changes {
        console.loader.change_filter(change);
    }

    let refreshed = if full {
        console.loader.load()
    } else {
        refresh_records(console)
    };
    match refreshed {
        Ok(view) => {
            let body = el("div")
                .child(filter_bar(console.loader.filter()))
                .child(dashboard_view(&view, &page_link));
            console.last_view = Some(view);
            Reply::html(200, document("Dashboard", Some(console.refresh_secs), body))
        }
        Err(e) => backend_error("Dashboard", &e),
    }
}

/// `GET /records`: the records table alone.
pub(super) fn records(console: &mut Console, query: &Query) -> Reply {
    let changes = match filter_changes(console.loader.filter(), query) {
        Ok(changes) => changes,
        Err(message) => return Reply::html(400, error_panel(&message).render()),
    };
    for change in changes {
        console.loader.change_filter(change);
    }

    match console.loader.load_records() {
        Ok(page) => {
            let html = records_view(&page, &page_link).render();
            if let Some(DashboardView::Ready(snapshot)) = console.last_view.as_mut() {
                snapshot.records = page;
            }
            Reply::html(200, html)
        }
        Err(e) => {
            tracing::warn!("records request failed: {e}");
            Reply::html(status_for(&e), error_panel(&format!("Failed to load records: {e}")).render())
        }
    }
}

/// Swap fresh records into the cached view. An empty dashboard has no
/// table, so nothing is fetched.
fn refresh_records(console: &mut Console) -> crate::error::Result<DashboardView> {
    match console.last_view.clone() {
        Some(DashboardView::Ready(mut snapshot)) => {
            snapshot.records = console.loader.load_records()?;
            Ok(DashboardView::Ready(snapshot))
        }
        Some(DashboardView::Empty) => Ok(DashboardView::Empty),
        None => console.loader.load(),
    }
}

/// Changes implied by the query, in the order the filter applies them.
/// `page` comes last so an explicit page survives the reset other edits
/// cause.
fn filter_changes(current: &DashboardFilter, query: &Query) -> Result<Vec<FilterChange>, String> {
    let mut changes = Vec::new();

    if let Some(v) = parsed::<Category>(query, "category")?
        && v != current.category
    {
        changes.push(FilterChange::Category(v));
    }
    if let Some(v) = parsed::<SubCategory>(query, "subCategory")?
        && v != current.sub_category
    {
        changes.push(FilterChange::SubCategory(v));
    }
    if let Some(v) = parsed::<TimeRange>(query, "timeRange")?
        && v != current.time_range
    {
        changes.push(FilterChange::TimeRange(v));
    }
    if let Some(v) = parsed::<StatusFilter>(query, "status")?
        && v != current.status
    {
        changes.push(FilterChange::Status(v));
    }
    if let Some(v) = parsed::<SortOrder>(query, "sortBy")?
        && v != current.sort
    {
        changes.push(FilterChange::Sort(v));
    }
    if let Some(raw) = param(query, "page") {
        let page: u32 = raw.parse().map_err(|_| format!("invalid page '{raw}'"))?;
        if page != current.page || !changes.is_empty() {
            changes.push(FilterChange::Page(page));
        }
    }

    Ok(changes)
}

fn parsed<T: FromStr<Err = String>>(query: &Query, key: &str) -> Result<Option<T>, String> {
    match param(query, key) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some),
    }
}

fn page_link(page: u32) -> String {
    format!("/?page={page}")
}

fn filter_bar(filter: &DashboardFilter) -> Element {
    el("form")
        .class("filters")
        .attr("method", "get")
        .attr("action", "/")
        .child(select("category", Category::ALL.iter().map(|v| v.as_str()), filter.category.as_str()))
        .child(select("subCategory", SubCategory::ALL.iter().map(|v| v.as_str()), filter.sub_category.as_str()))
        .child(select("timeRange", TimeRange::ALL.iter().map(|v| v.as_str()), filter.time_range.as_str()))
        .child(select("status", StatusFilter::ALL.iter().map(|v| v.as_str()), filter.status.as_str()))
        .child(select("sortBy", SortOrder::ALL.iter().map(|v| v.as_str()), filter.sort.as_str()))
        .child(el("button").attr("type", "submit").text("Apply"))
}

fn select<'a>(name: &'static str, values: impl Iterator<Item = &'a str>, current: &str) -> Element {
    el("select").attr("name", name).children(values.map(|value| {
        let option = el("option").attr("value", value);
        let option = if value == current { option.attr("selected", "selected") } else { option };
        option.text(value)
    }))
}

// ---------------------------------------------------------------------------
// Coverage drill-down
// ---------------------------------------------------------------------------

/// `GET /coverage?path=`: the root when `path` is absent or empty.
pub(super) fn coverage(console: &mut Console, query: &Query) -> Reply {
    let result = match param(query, "path").filter(|p| !p.is_empty()) {
        Some(path) => console.browser.open(path),
        None => console.browser.root(),
    };
    match result {
        Ok(view) => coverage_page(&view),
        Err(e) => backend_error("Coverage", &e),
    }
}

/// `GET /coverage/back`.
pub(super) fn coverage_back(console: &mut Console) -> Reply {
    let result = match console.browser.back() {
        Ok(BackTarget::Root) => console.browser.root(),
        Ok(BackTarget::Listing(view)) => Ok(view),
        Err(e) => Err(e),
    };
    match result {
        Ok(view) => coverage_page(&view),
        Err(e) => backend_error("Coverage", &e),
    }
}

fn coverage_page(view: &crate::coverage::Listing) -> Reply {
    let link = |path: &str| format!("/coverage?path={}", percent_encode(path));
    let body = el("div")
        .child(el("h1").text("Coverage"))
        .child(listing(view, &link, BACK_HREF));
    Reply::html(200, document("Coverage", None, body))
}

// ---------------------------------------------------------------------------
// Health and errors
// ---------------------------------------------------------------------------

/// `GET /health`.
pub(super) fn health(console: &Console) -> Reply {
    Reply::json(&json!({
        "status": "ok",
        "backend": console.base_url,
        "repository": console.loader.context().repository_id,
        "filter": {
            "category": console.loader.filter().category.as_str(),
            "status": console.loader.filter().status.as_str(),
            "page": console.loader.filter().page,
        },
    }))
}

fn status_for(e: &ClientError) -> u16 {
    match e {
        ClientError::InvalidRequest(_) => 400,
        _ => 502,
    }
}

fn backend_error(title: &str, e: &ClientError) -> Reply {
    tracing::warn!(page = title, "backend request failed: {e}");
    error_page(status_for(e), title, &format!("Failed to load {}: {e}", title.to_lowercase()))
}

fn error_page(status: u16, title: &str, message: &str) -> Reply {
    Reply::html(status, document(title, None, error_panel(message)))
}
