//! Full-page shell for the web console.

use super::node::{Element, Node, el};

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #f6f7f9; color: #222; }
header { background: #1f2933; color: #fff; padding: 12px 24px; }
header a { color: #cbd2d9; margin-right: 16px; text-decoration: none; }
main { padding: 24px; max-width: 1200px; margin: 0 auto; }
.panel { background: #fff; border-radius: 6px; padding: 16px; margin-bottom: 16px; }
.metric-cards { display: grid; grid-template-columns: repeat(4, 1fr); gap: 12px; margin-bottom: 16px; }
.metric-card { background: #fff; border-radius: 6px; padding: 12px; border-top: 4px solid #3e7bfa; }
.metric-red { border-top-color: #d71921; } .metric-green { border-top-color: #388e3c; }
.metric-yellow { border-top-color: #f5a623; }
.metric-value { font-size: 1.8em; font-weight: 600; }
.dashboard-columns { display: grid; grid-template-columns: 2fr 1fr; gap: 16px; }
.table { width: 100%; border-collapse: collapse; }
.table th, .table td { text-align: left; padding: 6px 8px; border-bottom: 1px solid #e4e7eb; }
.badge { padding: 2px 6px; border-radius: 4px; color: #fff; font-size: .8em; }
.bg-success { background: #28a745; } .bg-primary { background: #3e7bfa; } .bg-info { background: #17a2b8; }
.bg-danger { background: #dc3545; } .bg-secondary { background: #6c757d; }
.text-muted { color: #6c757d; } .text-success { color: #28a745; } .text-danger { color: #dc3545; }
.progress { background: #e4e7eb; height: 6px; border-radius: 3px; }
.progress-bar { background: #3e7bfa; height: 100%; border-radius: 3px; }
.pagination { list-style: none; display: flex; gap: 4px; padding: 0; }
.page-item.active .page-link { font-weight: 700; } .page-item.disabled { opacity: .5; }
.alert-danger { background: #f8d7da; color: #721c24; padding: 12px; border-radius: 6px; }
.placeholder, .empty-state { text-align: center; padding: 24px; }
.filters { display: flex; gap: 8px; margin-bottom: 16px; }
"#;

/// Wrap `body` in a complete HTML document. `refresh` reloads the page
/// every so many seconds.
pub fn document(title: &str, refresh: Option<u64>, body: Element) -> String {
    let nav = el("header")
        .child(el("a").attr("href", "/").text("Dashboard"))
        .child(el("a").attr("href", "/coverage").text("Coverage"));

    let html = el("html")
        .attr("lang", "en")
        .child(
            el("head")
                .child(el("meta").attr("charset", "utf-8"))
                .maybe(refresh.filter(|secs| *secs > 0).map(|secs| {
                    el("meta")
                        .attr("http-equiv", "refresh")
                        .attr("content", secs.to_string())
                }))
                .child(el("title").text(title))
                .child(el("style").child(Node::Static(STYLE))),
        )
        .child(el("body").child(nav).child(el("main").child(body)));

    format!("<!DOCTYPE html>{}", html.render())
}
