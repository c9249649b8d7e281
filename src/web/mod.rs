//! Embedded web console for coverdeck.
//!
//! A lightweight HTTP server (sync, via `tiny_http`) that serves:
//! - the productivity dashboard, filtered through the query string
//! - the coverage drill-down tables
//! - a JSON health endpoint
//!
//! Launched via `coverdeck web` (default: `http://127.0.0.1:9747`).

mod pages;

use std::io::Cursor;
use std::sync::Arc;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::config::CoverdeckConfig;
use crate::coverage::CoverageBrowser;
use crate::dashboard::{DashboardFilter, DashboardLoader, DashboardView, RepositoryContext};
use crate::transport::Transport;
use crate::transport::http::HttpTransport;

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Start the web console on `config.web.addr`.
///
/// Blocks the current thread. Requests are handled one at a time, which is
/// what makes the console state (filter, drill-down stack) safe to share
/// without locking. A failing backend call becomes an error panel in the
/// page; it never stops the server.
pub fn serve(config: &CoverdeckConfig, open: bool) -> Result<()> {
    let addr = config.web.addr.as_str();
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    println!("coverdeck console running at http://{addr}");
    println!("Press Ctrl+C to stop.\n");

    if open {
        let _ = open_browser(&format!("http://{addr}"));
    }

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_config(&config.backend));
    let mut console = Console::new(transport, config);

    for request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();

        let reply = console.handle(&method, &url);
        let status = reply.status;
        if let Err(e) = request.respond(reply.into_response()) {
            tracing::warn!(%url, "failed to send response: {e}");
        }

        tracing::info!(%method, %url, status, "request");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Console state and router
// ---------------------------------------------------------------------------

/// State shared across requests.
pub struct Console {
    loader: DashboardLoader,
    browser: CoverageBrowser,
    /// Last full dashboard load, reused when only the records change.
    last_view: Option<DashboardView>,
    base_url: String,
    refresh_secs: u64,
}

impl Console {
    pub fn new(transport: Arc<dyn Transport>, config: &CoverdeckConfig) -> Self {
        let loader = DashboardLoader::new(
            Arc::clone(&transport),
            RepositoryContext::from_config(&config.dashboard),
            DashboardFilter::with_page_size(config.dashboard.page_size),
        );
        Self {
            loader,
            browser: CoverageBrowser::new(transport),
            last_view: None,
            base_url: config.backend.base_url.clone(),
            refresh_secs: config.dashboard.refresh_secs,
        }
    }

    /// Route one request.
    pub fn handle(&mut self, method: &Method, url: &str) -> Reply {
        let path = url.split('?').next().unwrap_or(url);
        let query = query_params(url);

        match (method, path) {
            (&Method::Get, "/") | (&Method::Get, "/index.html") => pages::dashboard(self, &query),
            (&Method::Get, "/records") => pages::records(self, &query),
            (&Method::Get, "/coverage") => pages::coverage(self, &query),
            (&Method::Get, "/coverage/back") => pages::coverage_back(self),
            (&Method::Get, "/health") => pages::health(self),
            _ => Reply::not_found(),
        }
    }
}

/// A rendered response, kept separate from `tiny_http` so handlers can be
/// tested directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    pub fn html(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "text/html; charset=utf-8",
            body,
        }
    }

    pub fn json(body: &serde_json::Value) -> Self {
        Self {
            status: 200,
            content_type: "application/json; charset=utf-8",
            body: body.to_string(),
        }
    }

    fn not_found() -> Self {
        Self {
            status: 404,
            content_type: "application/json; charset=utf-8",
            body: r#"{"error": "not found"}"#.to_string(),
        }
    }

    fn into_response(self) -> Response<Cursor<Vec<u8>>> {
        let response = Response::from_data(self.body.into_bytes()).with_status_code(StatusCode(self.status));
        match Header::from_bytes("Content-Type", self.content_type) {
            Ok(header) => response.with_header(header),
            Err(()) => response,
        }
    }
}

// ---------------------------------------------------------------------------
// Query strings
// ---------------------------------------------------------------------------

/// Decoded `key=value` pairs of the URL's query string, in order.
pub(crate) fn query_params(url: &str) -> Vec<(String, String)> {
    let Some(query) = url.split_once('?').map(|(_, q)| q) else {
        return Vec::new();
    };
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(k), percent_decode(v))
        })
        .collect()
}

pub(crate) fn param<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(b) => {
                        out.push(b);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Percent-encode a query value.
pub(crate) fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Attempt to open a URL in the system default browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}
