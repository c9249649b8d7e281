//! Coverage drill-down table.

use super::format::percent;
use super::node::{Element, el};
use crate::coverage::{CoverageEntry, Listing};

/// `link` builds the href that opens a directory; `back` is the href of the
/// back link, shown below the root only.
pub fn listing(listing: &Listing, link: &dyn Fn(&str) -> String, back: &str) -> Element {
    let label = if listing.path.is_empty() {
        "Current Path: /".to_string()
    } else {
        format!("Current Path: {}", listing.path)
    };
    let header = el("tr").children(
        ["Source", "Coverage", "Line Coverage", "Branch Coverage", ""]
            .into_iter()
            .map(|h| el("th").text(h)),
    );
    let back = (!listing.path.is_empty())
        .then(|| el("a").attr("id", "backLink").attr("href", back).text("← Back"));

    el("div")
        .class("coverage-listing")
        .maybe(back)
        .child(el("p").attr("id", "currentPathLabel").text(label))
        .child(
            el("table")
                .class("table")
                .child(el("thead").child(header))
                .child(el("tbody").attr("id", "coverage-table-body").children(
                    listing.entries.iter().map(|entry| row(entry, link)),
                )),
        )
}

fn row(entry: &CoverageEntry, link: &dyn Fn(&str) -> String) -> Element {
    let source = if entry.is_dir() {
        el("td")
            .child(el("span").class("folder-icon").text("📁"))
            .child(
                el("a")
                    .class("source-link")
                    .attr("href", link(&entry.path))
                    .attr("data-path", entry.path.as_str())
                    .text(entry.name()),
            )
    } else {
        el("td").text(entry.name())
    };

    el("tr")
        .child(source)
        .child(el("td").text(percent(entry.coverage(), 2)))
        .child(el("td").text(percent(entry.line_coverage(), 2)))
        .child(el("td").text(percent(entry.branch_coverage(), 2)))
        .child(
            el("td").child(
                el("button")
                    .class("btn btn-primary btn-sm btn-improve")
                    .attr("data-path", entry.path.as_str())
                    .text("🚀 Improve Coverage"),
            ),
        )
}
