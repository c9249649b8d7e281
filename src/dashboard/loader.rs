//! Fetches dashboard summary and records for the current filter.
use std::sync::Arc;
use std::time::Duration;

use super::{
    DashboardFilter, DashboardSummary, FilterChange, ImprovementRecord, Page, Reload,
    RepositoryContext,
};
use crate::error::{ClientError, Result};
use crate::timer::IntervalHandle;
use crate::transport::{Transport, decode};

/// Everything shown on a populated dashboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSnapshot {
    pub summary: DashboardSummary,
    pub records: Page<ImprovementRecord>,
}

/// What the dashboard should show after a full load.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardView {
    /// Nothing has run against this repository yet.
    Empty,
    Ready(DashboardSnapshot),
}

/// Result of applying a filter change.
#[derive(Debug, Clone, PartialEq)]
pub enum Refreshed {
    View(DashboardView),
    Records(Page<ImprovementRecord>),
}

pub struct DashboardLoader {
    transport: Arc<dyn Transport>,
    context: RepositoryContext,
    filter: DashboardFilter,
}

impl DashboardLoader {
    pub fn new(transport: Arc<dyn Transport>, context: RepositoryContext, filter: DashboardFilter) -> Self {
        Self {
            transport,
            context,
            filter,
        }
    }

    pub fn filter(&self) -> &DashboardFilter {
        &self.filter
    }

    pub fn context(&self) -> &RepositoryContext {
        &self.context
    }

    /// Summary first; records only when the summary shows any activity.
    pub fn load(&self) -> Result<DashboardView> {
        let summary = self.load_summary()?;
        if !summary.has_data() {
            tracing::debug!(repository = %self.context.repository_id, "dashboard has no data");
            return Ok(DashboardView::Empty);
        }
        let records = self.load_records()?;
        Ok(DashboardView::Ready(DashboardSnapshot { summary, records }))
    }

    /// `GET /api/repository/{id}/dashboard/summary`.
    pub fn load_summary(&self) -> Result<DashboardSummary> {
        let path = self.route("summary")?;
        let f = &self.filter;
        let query = [
            ("repositoryUrl", self.context.repository_url.clone()),
            ("branch", self.context.branch.clone()),
            ("category", f.category.to_string()),
            ("subCategory", f.sub_category.to_string()),
            ("timeRange", f.time_range.to_string()),
        ];
        decode(&path, self.transport.get_json(&path, &query)?)
    }

    /// `GET /api/repository/{id}/dashboard/records` for the current page.
    pub fn load_records(&self) -> Result<Page<ImprovementRecord>> {
        let path = self.route("records")?;
        let f = &self.filter;
        let query = [
            ("repositoryUrl", self.context.repository_url.clone()),
            ("branch", self.context.branch.clone()),
            ("category", f.category.to_string()),
            ("subCategory", f.sub_category.to_string()),
            ("status", f.status.to_string()),
            ("timeRange", f.time_range.to_string()),
            ("sortBy", f.sort.to_string()),
            ("page", f.page.to_string()),
            ("size", f.size.to_string()),
        ];
        decode(&path, self.transport.get_json(&path, &query)?)
    }

    /// Update the filter without fetching.
    pub fn change_filter(&mut self, change: FilterChange) -> Reload {
        self.filter.apply(change)
    }

    /// Update the filter and fetch whatever it invalidated.
    pub fn apply(&mut self, change: FilterChange) -> Result<Refreshed> {
        match self.change_filter(change) {
            Reload::Full => self.load().map(Refreshed::View),
            Reload::RecordsOnly => self.load_records().map(Refreshed::Records),
        }
    }

    fn route(&self, leaf: &str) -> Result<String> {
        let id = self.context.repository_id.trim();
        if id.is_empty() {
            return Err(ClientError::InvalidRequest(
                "dashboard.repository_id is not configured".to_string(),
            ));
        }
        Ok(format!("/api/repository/{id}/dashboard/{leaf}"))
    }
}

/// Periodic reload trigger while a dashboard is mounted.
///
/// The timer thread only signals; the owner of the loader does the fetch.
#[derive(Debug, Default)]
pub struct AutoRefresh {
    timer: Option<IntervalHandle>,
}

impl AutoRefresh {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)start the timer. Mounting twice replaces the old timer.
    pub fn mount<F>(&mut self, period: Duration, mut on_tick: F) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        self.teardown();
        self.timer = Some(IntervalHandle::spawn("dashboard-refresh", period, move || {
            on_tick();
            std::ops::ControlFlow::Continue(())
        })?);
        Ok(())
    }

    pub fn is_mounted(&self) -> bool {
        self.timer.as_ref().is_some_and(IntervalHandle::is_running)
    }

    pub fn teardown(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn teardown_stops_refresh_ticks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&ticks);
        let mut refresh = AutoRefresh::new();
        refresh.mount(Duration::from_millis(5), move || {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert!(refresh.is_mounted());

        std::thread::sleep(Duration::from_millis(40));
        refresh.teardown();
        refresh.teardown();
        assert!(!refresh.is_mounted());

        let after = ticks.load(Ordering::SeqCst);
        assert!(after > 0);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), after);
    }
}
