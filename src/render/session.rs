//! Session and remediation views: progress panel, step log, results,
//! apply outcome.

use std::sync::LazyLock;

use regex::Regex;

use super::dashboard::progress_bar;
use super::format::{percent, safe_fixed};
use super::node::{Element, Node, el};
use crate::remediation::{FAILURE_MESSAGE, FixReport, SUCCESS_MESSAGE};
use crate::session::{ApplyResult, ImprovementResults, Outcome, ProgressUpdate};

/// Bare `http(s)://` URLs inside step messages.
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("URL regex must compile"));

/// Bar, `step (x.x%)` and status line for one progress frame.
pub fn progress_panel(session_id: &str, update: &ProgressUpdate) -> Element {
    let step = update.current_step.as_deref().unwrap_or("Initializing...");
    el("div")
        .class("progress-panel")
        .attr("data-session", session_id)
        .child(progress_bar(Some(update.percent())))
        .child(
            el("p")
                .attr("id", "coverage-progress-text")
                .text(format!("{step} ({:.1}%)", update.percent())),
        )
        .child(
            el("p")
                .attr("id", "coverage-status-message")
                .class("text-muted")
                .text(update.status_line()),
        )
        .child(el("small").class("text-muted").text(format!("Session: {session_id}")))
}

/// A step message with every URL turned into a link.
pub fn step_line(step: &str) -> Element {
    let mut line = el("p").class("step");
    let mut last = 0;
    for found in URL_RE.find_iter(step) {
        if found.start() > last {
            line = line.text(&step[last..found.start()]);
        }
        line = line.child(
            el("a")
                .attr("href", found.as_str())
                .attr("target", "_blank")
                .attr("rel", "noopener")
                .text(found.as_str()),
        );
        last = found.end();
    }
    if last < step.len() {
        line = line.text(&step[last..]);
    }
    line
}

pub fn step_log<'a>(steps: impl IntoIterator<Item = &'a str>) -> Element {
    el("div").class("step-log").children(steps.into_iter().map(step_line))
}

/// Terminal line of a sentinel-tracked operation.
pub fn fix_outcome(outcome: Outcome) -> Element {
    match outcome {
        Outcome::Succeeded => el("p").class("text-success").text(SUCCESS_MESSAGE),
        Outcome::Failed | Outcome::Cancelled => el("p").class("text-danger").text(FAILURE_MESSAGE),
    }
}

pub fn fix_report(report: &FixReport) -> Element {
    el("div")
        .class("fix-report")
        .child(progress_bar(Some(100.0)))
        .child(step_log(report.steps.iter().map(String::as_str)))
        .child(fix_outcome(report.outcome))
}

/// Results of a finished improvement session.
pub fn results_view(results: &ImprovementResults) -> Element {
    let seconds = results.processing_time_ms.map(|ms| ms as f64 / 1000.0);
    let fact = |label: &str, value: String| {
        el("p").child(el("strong").text(format!("{label}:"))).text(format!(" {value}"))
    };

    el("div")
        .class("results")
        .child(el("h2").text("Coverage Improvement Results"))
        .child(
            el("div")
                .class("results-grid")
                .child(
                    el("div")
                        .child(el("h6").text(format!("File: {}", results.file_name.as_deref().unwrap_or("N/A"))))
                        .child(fact("Original Coverage", percent(results.original_coverage, 1)))
                        .child(fact("Improved Coverage", percent(results.improved_coverage, 1)))
                        .child(fact("Increase", format!("+{}", percent(results.coverage_increase, 1)))),
                )
                .child(
                    el("div")
                        .child(el("h6").text("Generated Tests"))
                        .child(fact("Tests Generated", results.total_tests_generated.unwrap_or(0).to_string()))
                        .child(fact("Processing Time", format!("{}s", safe_fixed(seconds, 1))))
                        .child(fact("Status", results.status.clone().unwrap_or_else(|| "UNKNOWN".into()))),
                ),
        )
        .child(list_block("Test Files Created", &results.test_file_paths))
        .child(list_block("Recommendations", &results.recommendations))
        .maybe((!results.warnings.is_empty()).then(|| list_block("Warnings", &results.warnings)))
        .maybe((!results.errors.is_empty()).then(|| list_block("Errors", &results.errors)))
}

fn list_block(title: &str, items: &[String]) -> Element {
    el("div")
        .class("list-block")
        .child(el("h6").text(format!("{title}:")))
        .child(el("ul").children(items.iter().map(|i| el("li").text(i.as_str()))))
}

/// Outcome of an apply request, with the PR link when one was created.
pub fn apply_result(result: &ApplyResult) -> Element {
    if !result.is_success() {
        let reason = result
            .error
            .as_deref()
            .or(result.message.as_deref())
            .unwrap_or("unknown error");
        return el("p").class("text-danger").text(format!("Error applying changes: {reason}"));
    }

    let pr = result.pull_request.as_ref().and_then(|pr| pr.pr_url.as_deref()).map(|url| {
        Node::from(
            el("span")
                .text(" PR created: ")
                .child(el("a").attr("href", url).text(url)),
        )
    });
    el("p")
        .class("text-success")
        .text("Changes applied successfully!")
        .maybe(pr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_in_steps_become_links() {
        let html = step_line("PR ready: https://github.com/o/r/pull/7 (review)").render();
        assert_eq!(
            html,
            "<p class=\"step\">PR ready: <a href=\"https://github.com/o/r/pull/7\" target=\"_blank\" rel=\"noopener\">https://github.com/o/r/pull/7</a> (review)</p>"
        );
    }

    #[test]
    fn step_markup_is_not_passed_through() {
        let html = step_line("<b>done</b>").render();
        assert_eq!(html, "<p class=\"step\">&lt;b&gt;done&lt;/b&gt;</p>");
    }

    #[test]
    fn results_with_missing_numbers_show_zero() {
        let html = results_view(&ImprovementResults::default()).render();
        assert!(!html.contains("NaN"));
        assert!(html.contains("Original Coverage:</strong> 0%"));
        assert!(html.contains("Tests Generated:</strong> 0"));
        assert!(html.contains("Processing Time:</strong> 0s"));
    }

    #[test]
    fn progress_text_uses_one_decimal() {
        let update = ProgressUpdate {
            progress: Some(33.333),
            current_step: Some("Generating tests".into()),
            ..Default::default()
        };
        let node = Node::from(progress_panel("s1", &update));
        assert!(node.text_content().contains("Generating tests (33.3%)"));
    }

    #[test]
    fn apply_failure_shows_reason() {
        let failed = ApplyResult {
            error: Some("merge conflict".into()),
            ..Default::default()
        };
        assert!(apply_result(&failed).render().contains("merge conflict"));
    }
}
