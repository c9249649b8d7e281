//! Number, duration and status formatting shared by every view.
//!
//! Missing or non-finite numbers always format as a zero-equivalent.

use chrono::{DateTime, NaiveDateTime};

use crate::dashboard::{ChangeDirection, MetricCard};

/// `value` with `decimals` places, or `"0"` when missing or not finite.
pub fn safe_fixed(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.decimals$}"),
        _ => "0".to_string(),
    }
}

/// `safe_fixed` with a percent sign.
pub fn percent(value: Option<f64>, decimals: usize) -> String {
    format!("{}%", safe_fixed(value, decimals))
}

/// Progress width in 0–100.
pub fn clamp_percent(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 100.0),
        _ => 0.0,
    }
}

/// `Xh Ym`, `Xm Ys` or `Xs`; `N/A` for zero or absent.
pub fn format_duration(millis: Option<u64>) -> String {
    let Some(ms) = millis.filter(|ms| *ms > 0) else {
        return "N/A".to_string();
    };
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{hours}h {}m", minutes % 60)
    } else if minutes > 0 {
        format!("{minutes}m {}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

/// Backend timestamps are ISO-8601 with or without an offset. Anything
/// else is shown as received.
pub fn format_timestamp(raw: &str) -> String {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.format("%Y-%m-%d %H:%M").to_string();
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return ts.format("%Y-%m-%d %H:%M").to_string();
    }
    raw.to_string()
}

/// Last segment of a `/`-separated path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `FILE_IMPROVEMENT` → `FILE IMPROVEMENT`.
pub fn humanize(kind: &str) -> String {
    kind.replace('_', " ")
}

// ---------------------------------------------------------------------------
// Status mappings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeStyle {
    Success,
    Primary,
    Info,
    Danger,
    Secondary,
}

impl BadgeStyle {
    pub fn class(self) -> &'static str {
        match self {
            Self::Success => "bg-success",
            Self::Primary => "bg-primary",
            Self::Info => "bg-info",
            Self::Danger => "bg-danger",
            Self::Secondary => "bg-secondary",
        }
    }
}

/// Unknown statuses fall back to `Secondary`.
pub fn status_style(status: &str) -> BadgeStyle {
    match status {
        "COMPLETED" | "READY_FOR_REVIEW" => BadgeStyle::Success,
        "PROCESSING" => BadgeStyle::Primary,
        "ANALYZING" | "GENERATING_TESTS" => BadgeStyle::Info,
        "FAILED" | "ERROR" => BadgeStyle::Danger,
        _ => BadgeStyle::Secondary,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIcon {
    Check,
    Gear,
    Search,
    Code,
    Cross,
    Warning,
    Clock,
    Circle,
}

impl StatusIcon {
    pub fn class(self) -> &'static str {
        match self {
            Self::Check => "bi-check-circle",
            Self::Gear => "bi-gear",
            Self::Search => "bi-search",
            Self::Code => "bi-code",
            Self::Cross => "bi-x-circle",
            Self::Warning => "bi-exclamation-triangle",
            Self::Clock => "bi-clock",
            Self::Circle => "bi-circle",
        }
    }

    /// Terminal stand-in for the icon font.
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Check => "✔",
            Self::Gear => "⚙",
            Self::Search => "🔍",
            Self::Code => "⌨",
            Self::Cross => "✘",
            Self::Warning => "⚠",
            Self::Clock => "◷",
            Self::Circle => "○",
        }
    }
}

/// Unknown statuses fall back to `Circle`.
pub fn status_icon(status: &str) -> StatusIcon {
    match status {
        "COMPLETED" | "READY_FOR_REVIEW" => StatusIcon::Check,
        "PROCESSING" => StatusIcon::Gear,
        "ANALYZING" => StatusIcon::Search,
        "GENERATING_TESTS" => StatusIcon::Code,
        "FAILED" => StatusIcon::Cross,
        "ERROR" => StatusIcon::Warning,
        "INITIALIZING" => StatusIcon::Clock,
        _ => StatusIcon::Circle,
    }
}

// ---------------------------------------------------------------------------
// Metric change
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeIndicator {
    pub direction: ChangeDirection,
    pub arrow: &'static str,
    pub color: &'static str,
    /// e.g. `12.5% vs last week`.
    pub label: String,
}

/// `None` when the card carries no change percentage.
pub fn change_indicator(card: &MetricCard) -> Option<ChangeIndicator> {
    let change = card.change_percentage?;
    let direction = card.direction();
    let (arrow, color) = match direction {
        ChangeDirection::Up => ("↗", "#28a745"),
        ChangeDirection::Down => ("↙", "#dc3545"),
        ChangeDirection::Stable => ("→", "#6c757d"),
    };
    let magnitude = if change.is_finite() { change.abs() } else { 0.0 };
    Some(ChangeIndicator {
        direction,
        arrow,
        color,
        label: format!("{magnitude:.1}% vs last week"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_nan_numbers_render_as_zero() {
        assert_eq!(safe_fixed(None, 1), "0");
        assert_eq!(safe_fixed(Some(f64::NAN), 1), "0");
        assert_eq!(safe_fixed(Some(f64::INFINITY), 2), "0");
        assert_eq!(safe_fixed(Some(12.345), 1), "12.3");
        assert_eq!(percent(None, 2), "0%");
        assert_eq!(clamp_percent(Some(f64::NAN)), 0.0);
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(None), "N/A");
        assert_eq!(format_duration(Some(0)), "N/A");
        assert_eq!(format_duration(Some(42_000)), "42s");
        assert_eq!(format_duration(Some(125_000)), "2m 5s");
        assert_eq!(format_duration(Some(3_780_000)), "1h 3m");
    }

    #[test]
    fn status_maps_have_defaults() {
        assert_eq!(status_style("READY_FOR_REVIEW"), BadgeStyle::Success);
        assert_eq!(status_style("SOMETHING_ELSE"), BadgeStyle::Secondary);
        assert_eq!(status_icon("ERROR"), StatusIcon::Warning);
        assert_eq!(status_icon(""), StatusIcon::Circle);
    }

    #[test]
    fn change_indicator_uses_magnitude() {
        let card = MetricCard {
            change_percentage: Some(-4.26),
            change_direction: Some("down".into()),
            ..Default::default()
        };
        let ind = change_indicator(&card).unwrap();
        assert_eq!(ind.arrow, "↙");
        assert_eq!(ind.label, "4.3% vs last week");
        assert!(change_indicator(&MetricCard::default()).is_none());
    }

    #[test]
    fn timestamps_and_names() {
        assert_eq!(format_timestamp("2024-05-02T09:15:30.123"), "2024-05-02 09:15");
        assert_eq!(format_timestamp("2024-05-02T09:15:30Z"), "2024-05-02 09:15");
        assert_eq!(format_timestamp("yesterday"), "yesterday");
        assert_eq!(file_name("src/main/A.java"), "A.java");
        assert_eq!(file_name("A.java"), "A.java");
    }
}
