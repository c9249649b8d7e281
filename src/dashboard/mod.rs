//! Productivity dashboard: filter state, backend DTOs and the loader.
//!
//! The filter is mutated only through [`FilterChange`], and each change
//! reports how much of the dashboard has to be re-fetched.

pub mod loader;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::DashboardConfig;
use crate::transport::nullable;

pub use loader::{AutoRefresh, DashboardLoader, DashboardSnapshot, DashboardView, Refreshed};

// ---------------------------------------------------------------------------
// Filter values
// ---------------------------------------------------------------------------

/// Closed set of wire values with a default, parsed case-insensitively.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? } default $default:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($wire) {
                        return Ok($name::$variant);
                    }
                )+
                Err(format!("unknown {} '{s}'", stringify!($name)))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    Category { All => "ALL", Coverage => "COVERAGE" } default All
);
wire_enum!(
    SubCategory { All => "ALL", FileLevel => "FILE_LEVEL", RepositoryLevel => "REPOSITORY_LEVEL" } default All
);
wire_enum!(
    /// Record status groups understood by the records route.
    StatusFilter { All => "ALL", Completed => "COMPLETED", InProgress => "IN_PROGRESS", Failed => "FAILED" } default All
);
wire_enum!(
    TimeRange {
        Last7Days => "LAST_7_DAYS",
        Last30Days => "LAST_30_DAYS",
        Last90Days => "LAST_90_DAYS",
        AllTime => "ALL_TIME",
    } default Last30Days
);
wire_enum!(
    SortOrder {
        DateDesc => "DATE_DESC",
        DateAsc => "DATE_ASC",
        CoverageDesc => "COVERAGE_DESC",
        CoverageAsc => "COVERAGE_ASC",
    } default DateDesc
);

/// Current dashboard filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardFilter {
    pub category: Category,
    pub sub_category: SubCategory,
    pub status: StatusFilter,
    pub time_range: TimeRange,
    pub sort: SortOrder,
    pub page: u32,
    pub size: u32,
}

impl Default for DashboardFilter {
    fn default() -> Self {
        Self::with_page_size(20)
    }
}

impl DashboardFilter {
    pub fn with_page_size(size: u32) -> Self {
        Self {
            category: Category::default(),
            sub_category: SubCategory::default(),
            status: StatusFilter::default(),
            time_range: TimeRange::default(),
            sort: SortOrder::default(),
            page: 0,
            size: size.max(1),
        }
    }

    /// Apply one change and report what needs reloading. Every change but
    /// `Page` sends the table back to the first page.
    pub fn apply(&mut self, change: FilterChange) -> Reload {
        if !matches!(change, FilterChange::Page(_)) {
            self.page = 0;
        }
        match change {
            FilterChange::Category(c) => self.category = c,
            FilterChange::SubCategory(s) => self.sub_category = s,
            FilterChange::TimeRange(t) => self.time_range = t,
            FilterChange::Status(s) => self.status = s,
            FilterChange::Sort(s) => self.sort = s,
            FilterChange::Page(p) => self.page = p,
        }
        change.reload()
    }
}

/// A single user edit of the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterChange {
    Category(Category),
    SubCategory(SubCategory),
    TimeRange(TimeRange),
    Status(StatusFilter),
    Sort(SortOrder),
    Page(u32),
}

impl FilterChange {
    /// Summary figures depend on category, sub-category and time range only.
    pub fn reload(self) -> Reload {
        match self {
            Self::Category(_) | Self::SubCategory(_) | Self::TimeRange(_) => Reload::Full,
            Self::Status(_) | Self::Sort(_) | Self::Page(_) => Reload::RecordsOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    /// Summary and records.
    Full,
    RecordsOnly,
}

/// Which repository the dashboard reports on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryContext {
    pub repository_id: String,
    pub repository_url: String,
    pub branch: String,
}

impl RepositoryContext {
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            repository_id: config.repository_id.clone(),
            repository_url: config.repository_url.clone(),
            branch: config.branch.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Summary DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardSummary {
    pub total_sessions: Option<MetricCard>,
    pub success_rate: Option<MetricCard>,
    pub average_coverage_increase: Option<MetricCard>,
    pub time_saved: Option<MetricCard>,
    #[serde(deserialize_with = "nullable")]
    pub recent_activity: Vec<ActivityItem>,
    pub analytics: Option<AnalyticsData>,
    #[serde(deserialize_with = "nullable")]
    pub active_sessions: Vec<ActiveSession>,
}

impl DashboardSummary {
    /// Whether anything has happened in this repository yet.
    pub fn has_data(&self) -> bool {
        let sessions = self
            .total_sessions
            .as_ref()
            .and_then(|card| card.value.as_deref())
            .and_then(|v| v.replace(',', "").trim().parse::<i64>().ok())
            .unwrap_or(0);
        sessions > 0 || !self.recent_activity.is_empty() || !self.active_sessions.is_empty()
    }

    /// Cards in display order, with their slot names.
    pub fn cards(&self) -> [(&'static str, Option<&MetricCard>); 4] {
        [
            ("totalSessions", self.total_sessions.as_ref()),
            ("successRate", self.success_rate.as_ref()),
            ("coverageIncrease", self.average_coverage_increase.as_ref()),
            ("timeSaved", self.time_saved.as_ref()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricCard {
    pub title: Option<String>,
    /// Pre-formatted by the backend (`"1,204"`, `"87.5%"`), sometimes a bare
    /// number.
    #[serde(deserialize_with = "string_or_number")]
    pub value: Option<String>,
    pub subtitle: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub change_percentage: Option<f64>,
    pub change_direction: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDirection {
    Up,
    Down,
    Stable,
}

impl MetricCard {
    pub fn direction(&self) -> ChangeDirection {
        match self.change_direction.as_deref() {
            Some(d) if d.eq_ignore_ascii_case("up") => ChangeDirection::Up,
            Some(d) if d.eq_ignore_ascii_case("down") => ChangeDirection::Down,
            _ => ChangeDirection::Stable,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityItem {
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub timestamp: Option<String>,
    pub file_path: Option<String>,
    pub coverage_increase: Option<f64>,
    pub tests_generated: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsData {
    #[serde(deserialize_with = "nullable")]
    pub coverage_trends: Vec<TrendPoint>,
    #[serde(deserialize_with = "nullable")]
    pub success_rate_trends: Vec<TrendPoint>,
    #[serde(deserialize_with = "nullable")]
    pub improvements_by_category: Vec<CategoryData>,
    #[serde(deserialize_with = "nullable")]
    pub complexity_analysis: Vec<ComplexityData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrendPoint {
    pub date: Option<String>,
    pub value: Option<f64>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryData {
    pub category: Option<String>,
    pub count: Option<u32>,
    pub average_improvement: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplexityData {
    pub complexity_level: Option<String>,
    pub file_count: Option<u32>,
    pub average_improvement: Option<f64>,
    pub average_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActiveSession {
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub file_path: Option<String>,
    pub progress: Option<f64>,
    pub current_step: Option<String>,
    pub started_at: Option<String>,
    pub estimated_time_remaining: Option<i64>,
    pub can_modify: Option<bool>,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImprovementRecord {
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub repository_url: Option<String>,
    pub branch: Option<String>,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub original_coverage: Option<f64>,
    pub improved_coverage: Option<f64>,
    pub coverage_increase: Option<f64>,
    pub total_tests_generated: Option<u32>,
    pub processing_time_ms: Option<u64>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub validation: Option<ValidationSummary>,
    #[serde(deserialize_with = "nullable")]
    pub recommendations: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub warnings: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub errors: Vec<String>,
}

impl ImprovementRecord {
    /// Only records that never produced usable output can be modified.
    pub fn can_modify(&self) -> bool {
        matches!(self.status.as_deref(), Some("FAILED" | "ERROR" | "CREATED"))
    }

    pub fn title(&self) -> &str {
        self.file_name
            .as_deref()
            .or(self.kind.as_deref())
            .unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationSummary {
    pub success: Option<bool>,
    pub tests_executed: Option<u32>,
    pub tests_passed: Option<u32>,
    pub tests_failed: Option<u32>,
    pub execution_time_ms: Option<u64>,
    pub validation_method: Option<String>,
}

/// A Spring Data page. Null entries in `content` are dropped.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(deserialize_with = "skip_nulls")]
    pub content: Vec<T>,
    pub number: u32,
    pub total_pages: u32,
    pub total_elements: u64,
    pub size: u32,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            content: Vec::new(),
            number: 0,
            total_pages: 0,
            total_elements: 0,
            size: 0,
        }
    }
}

fn skip_nulls<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let items = Option::<Vec<Option<T>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(items.into_iter().flatten().collect())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
