//! CLI command implementations for coverdeck.
//!
//! Provides subcommand handlers for:
//! - `coverdeck tree [path]`: coverage drill-down listing
//! - `coverdeck improve-file` / `improve-repo`: start and follow a session
//! - `coverdeck status | cancel | apply <id>`: act on an existing session
//! - `coverdeck fix-issues`: submit issues for an automated fix
//! - `coverdeck dashboard [--watch] [--html FILE]`: productivity dashboard
//! - `coverdeck config show|init`: configuration management

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::{self, CoverdeckConfig};
use crate::coverage::{CoverageBrowser, Listing};
use crate::dashboard::{AutoRefresh, DashboardFilter, DashboardLoader, DashboardView, RepositoryContext};
use crate::remediation::{FixEvent, IssueFixClient, IssueRef};
use crate::render::format::{change_indicator, format_duration, percent, safe_fixed, status_icon};
use crate::session::tracker::track;
use crate::session::{
    ApplyRequest, FileImproveRequest, Outcome, RepoImproveRequest, SessionClient, SessionKind,
    SessionStatus, TrackerEvent,
};
use crate::transport::Transport;
use crate::transport::http::HttpTransport;
use crate::transport::ws::WsChannelFactory;

fn transport(config: &CoverdeckConfig) -> Arc<dyn Transport> {
    Arc::new(HttpTransport::from_config(&config.backend))
}

fn session_client(config: &CoverdeckConfig) -> SessionClient {
    SessionClient::new(
        transport(config),
        Arc::new(WsChannelFactory::new(config.backend.effective_ws_url())),
    )
}

fn poll_interval(config: &CoverdeckConfig) -> Duration {
    Duration::from_millis(config.polling.interval_ms.max(50))
}

// ---------------------------------------------------------------------------
// coverdeck tree
// ---------------------------------------------------------------------------

/// Print the coverage listing for `path`, or the root.
pub fn run_tree(config: &CoverdeckConfig, path: Option<&str>) -> Result<()> {
    let mut browser = CoverageBrowser::new(transport(config));
    let listing = match path.filter(|p| !p.is_empty()) {
        Some(path) => browser.open(path),
        None => browser.root(),
    }
    .context("failed to load coverage listing")?;

    print_listing(&listing);
    Ok(())
}

fn print_listing(listing: &Listing) {
    let label = if listing.path.is_empty() { "/" } else { listing.path.as_str() };
    println!("{} {}", "Current Path:".bold(), label);
    if listing.entries.is_empty() {
        println!("  {}", "(empty)".dimmed());
        return;
    }

    println!(
        "  {:<40} {:>10} {:>10} {:>10}",
        "Source", "Coverage", "Line", "Branch"
    );
    println!("  {}", "-".repeat(73));
    for entry in &listing.entries {
        let name = if entry.is_dir() {
            format!("{}/", entry.name()).blue().bold()
        } else {
            entry.name().normal()
        };
        println!(
            "  {:<40} {:>10} {:>10} {:>10}",
            name,
            percent(entry.coverage(), 2),
            percent(entry.line_coverage(), 2),
            percent(entry.branch_coverage(), 2),
        );
    }
}

// ---------------------------------------------------------------------------
// coverdeck improve-file | improve-repo
// ---------------------------------------------------------------------------

/// Options shared by both improvement commands.
#[derive(Debug, Clone, Default)]
pub struct ImproveOptions {
    pub target_increase: Option<f64>,
    pub create_pull_request: bool,
    /// Apply the generated changes once the session completes.
    pub apply: bool,
    /// Print the session id and return without tracking.
    pub detach: bool,
}

pub fn run_improve_file(config: &CoverdeckConfig, file_path: &str, options: &ImproveOptions) -> Result<()> {
    let mut request = FileImproveRequest::new(
        &config.dashboard.repository_url,
        &config.dashboard.branch,
        file_path,
    );
    if let Some(target) = options.target_increase {
        request.target_coverage_increase = target;
    }
    request.create_pull_request = options.create_pull_request;

    let mut client = session_client(config);
    let session = client
        .start_file_session(&request)
        .context("failed to start file improvement")?;
    follow(config, &mut client, session.id(), options)
}

pub fn run_improve_repo(config: &CoverdeckConfig, options: &ImproveOptions) -> Result<()> {
    let mut request = RepoImproveRequest::new(&config.dashboard.repository_url, &config.dashboard.branch);
    if let Some(target) = options.target_increase {
        request.target_coverage_increase = target;
    }

    let mut client = session_client(config);
    let session = client
        .start_repository_session(&request)
        .context("failed to start repository improvement")?;
    follow(config, &mut client, session.id(), options)
}

fn follow(config: &CoverdeckConfig, client: &mut SessionClient, session_id: &str, options: &ImproveOptions) -> Result<()> {
    println!("{} Session {}", "▶".cyan().bold(), session_id.bold());
    if options.detach {
        println!("  {}", format!("Follow it with `coverdeck status {session_id}`").dimmed());
        return Ok(());
    }

    let report = track(client, poll_interval(config), print_tracker_event)
        .with_context(|| format!("tracking session {session_id} failed"))?;

    if let Some(status) = &report.status {
        print_results(status);
    }
    if report.outcome == Outcome::Succeeded && options.apply {
        apply(client, session_id)?;
    }
    Ok(())
}

fn print_tracker_event(event: &TrackerEvent) {
    match event {
        TrackerEvent::Progress(update) => {
            let step = update.current_step.as_deref().unwrap_or("Initializing...");
            println!(
                "  {} {} ({:.1}%)  {}",
                progress_bar(update.percent()),
                step,
                update.percent(),
                update.status_line().dimmed()
            );
        }
        TrackerEvent::Step(step) => println!("  {} {}", "·".dimmed(), step),
        TrackerEvent::FellBack { reason } => {
            println!("  {} {}", "Polling status:".yellow(), reason.dimmed());
        }
        TrackerEvent::Finished(outcome) => match outcome {
            Outcome::Succeeded => println!("{} Session completed", "✓".green().bold()),
            Outcome::Failed => println!("{} Session failed", "✗".red().bold()),
            Outcome::Cancelled => println!("{} Session cancelled", "■".yellow().bold()),
        },
    }
}

fn progress_bar(percent: f64) -> String {
    const WIDTH: usize = 20;
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), " ".repeat(WIDTH - filled))
}

fn print_results(status: &SessionStatus) {
    let Some(results) = &status.results else {
        for error in &status.errors {
            println!("  {} {}", "error:".red(), error);
        }
        return;
    };

    println!();
    println!("{}", "Coverage Improvement Results".bold().cyan());
    println!("{}", "=".repeat(50));
    println!("  {} {}", "File:             ".bold(), results.file_name.as_deref().unwrap_or("N/A"));
    println!("  {} {}", "Original coverage:".bold(), percent(results.original_coverage, 1));
    println!("  {} {}", "Improved coverage:".bold(), percent(results.improved_coverage, 1));
    println!("  {} +{}", "Increase:         ".bold(), percent(results.coverage_increase, 1));
    println!("  {} {}", "Tests generated:  ".bold(), results.total_tests_generated.unwrap_or(0));
    println!(
        "  {} {}s",
        "Processing time:  ".bold(),
        safe_fixed(results.processing_time_ms.map(|ms| ms as f64 / 1000.0), 1)
    );
    print_list("Test files created", &results.test_file_paths);
    print_list("Recommendations", &results.recommendations);
    print_list("Warnings", &results.warnings);
    print_list("Errors", &results.errors);
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("  {}", format!("{title}:").bold());
    for item in items {
        println!("    - {item}");
    }
}

// ---------------------------------------------------------------------------
// coverdeck status | cancel | apply
// ---------------------------------------------------------------------------

pub fn run_status(config: &CoverdeckConfig, session_id: &str, kind: SessionKind) -> Result<()> {
    let mut client = session_client(config);
    client.attach(session_id, kind)?;
    let status = client
        .status(session_id)
        .with_context(|| format!("failed to fetch status of {session_id}"))?;

    let label = status.status.as_deref().unwrap_or("UNKNOWN");
    println!(
        "{} {} {}",
        status_icon(label).glyph(),
        session_id.bold(),
        label.cyan()
    );
    if let Some(p) = status.progress {
        println!("  {} {} ({:.1}%)", progress_bar(p), status.current_step.as_deref().unwrap_or(""), p);
    }
    for step in &status.step {
        println!("  {} {}", "·".dimmed(), step);
    }
    print_results(&status);
    Ok(())
}

pub fn run_cancel(config: &CoverdeckConfig, session_id: &str, kind: SessionKind) -> Result<()> {
    let mut client = session_client(config);
    client.attach(session_id, kind)?;
    // Let the client see a finished session so it doesn't send a cancel.
    if let Err(err) = client.status(session_id) {
        tracing::debug!(session_id, "status before cancel failed: {err}");
    }

    let ack = client
        .cancel(session_id)
        .with_context(|| format!("failed to cancel {session_id}"))?;
    if ack.already_terminal {
        println!(
            "{} {}",
            "·".dimmed(),
            ack.message.as_deref().unwrap_or("session already finished")
        );
    } else {
        println!("{} Cancelled {}", "✓".green().bold(), session_id.bold());
    }
    Ok(())
}

pub fn run_apply(config: &CoverdeckConfig, session_id: &str, kind: SessionKind) -> Result<()> {
    let mut client = session_client(config);
    client.attach(session_id, kind)?;
    apply(&mut client, session_id)
}

fn apply(client: &mut SessionClient, session_id: &str) -> Result<()> {
    let result = client
        .apply_changes(session_id, &ApplyRequest::for_session(session_id))
        .with_context(|| format!("failed to apply changes of {session_id}"))?;

    if !result.is_success() {
        let reason = result
            .error
            .as_deref()
            .or(result.message.as_deref())
            .unwrap_or("unknown error");
        anyhow::bail!("error applying changes: {reason}");
    }

    println!("{} Changes applied successfully!", "✓".green().bold());
    if let Some(url) = result.pull_request.as_ref().and_then(|pr| pr.pr_url.as_deref()) {
        println!("  {} {}", "PR created:".bold(), url.underline());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// coverdeck fix-issues
// ---------------------------------------------------------------------------

/// Parse `KEY` or `KEY:ClassName`. The class name follows the last colon.
pub fn parse_issue(raw: &str) -> Result<IssueRef> {
    let (key, class_name) = raw.rsplit_once(':').unwrap_or((raw, ""));
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("issue '{raw}' has no key");
    }
    Ok(IssueRef {
        key: key.to_string(),
        class_name: class_name.trim().to_string(),
        description: String::new(),
    })
}

pub fn run_fix_issues(config: &CoverdeckConfig, issues: &[String]) -> Result<()> {
    let issues = issues
        .iter()
        .map(|raw| parse_issue(raw))
        .collect::<Result<Vec<_>>>()?;

    let client = IssueFixClient::new(transport(config));
    let operation_id = client.apply_fix(&issues).context("failed to submit fix")?;
    println!("{} Fix operation {}", "▶".cyan().bold(), operation_id.bold());

    let report = client
        .track(&operation_id, poll_interval(config), |event| match event {
            FixEvent::Step(step) => println!("  {} {}", "·".dimmed(), step),
            FixEvent::Progress(p) => println!("  {} {:.0}%", progress_bar(*p), p),
            FixEvent::Finished(_) => {}
        })
        .with_context(|| format!("tracking fix {operation_id} failed"))?;

    match report.outcome {
        Outcome::Succeeded => println!("{}", report.message().green().bold()),
        Outcome::Failed | Outcome::Cancelled => println!("{}", report.message().red().bold()),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// coverdeck dashboard
// ---------------------------------------------------------------------------

pub fn run_dashboard(config: &CoverdeckConfig, watch: bool, html: Option<&Path>) -> Result<()> {
    let loader = DashboardLoader::new(
        transport(config),
        RepositoryContext::from_config(&config.dashboard),
        DashboardFilter::with_page_size(config.dashboard.page_size),
    );

    let view = loader.load().context("failed to load dashboard")?;
    show_dashboard(&view, html)?;
    if !watch {
        return Ok(());
    }

    let (tx, rx) = crossbeam_channel::bounded::<()>(1);
    let mut refresh = AutoRefresh::new();
    refresh.mount(Duration::from_secs(config.dashboard.refresh_secs.max(1)), move || {
        let _ = tx.try_send(());
    })
    .context("failed to start dashboard refresh")?;
    println!(
        "{}",
        format!("Refreshing every {}s. Press Ctrl+C to stop.", config.dashboard.refresh_secs.max(1)).dimmed()
    );

    while rx.recv().is_ok() {
        match loader.load() {
            Ok(view) => show_dashboard(&view, html)?,
            Err(err) => println!("{} {err}", "Failed to refresh dashboard:".red()),
        }
    }
    refresh.teardown();
    Ok(())
}

fn show_dashboard(view: &DashboardView, html: Option<&Path>) -> Result<()> {
    match html {
        Some(path) => {
            let body = crate::render::dashboard::dashboard(view, &|page| format!("?page={page}"));
            let page = crate::render::page::document("Dashboard", None, body);
            std::fs::write(path, page).with_context(|| format!("failed to write {}", path.display()))?;
            println!("{} Dashboard written to {}", "✓".green().bold(), path.display());
        }
        None => print_dashboard(view),
    }
    Ok(())
}

fn print_dashboard(view: &DashboardView) {
    let snapshot = match view {
        DashboardView::Empty => {
            println!("{}", "No improvement sessions yet.".yellow());
            return;
        }
        DashboardView::Ready(snapshot) => snapshot,
    };

    println!("{}", "Productivity Dashboard".bold().cyan());
    println!("{}", "=".repeat(60));
    for (slot, card) in snapshot.summary.cards() {
        let Some(card) = card else {
            println!("  {:<28} {}", slot.bold(), "0");
            continue;
        };
        let change = change_indicator(card)
            .map(|c| format!("{} {}", c.arrow, c.label))
            .unwrap_or_default();
        println!(
            "  {:<28} {:<10} {}",
            card.title.as_deref().unwrap_or(slot).bold(),
            card.value.as_deref().unwrap_or("0"),
            change.dimmed()
        );
    }

    if !snapshot.summary.active_sessions.is_empty() {
        println!();
        println!("{}", "Active Sessions".bold().cyan());
        for session in &snapshot.summary.active_sessions {
            let status = session.status.as_deref().unwrap_or("UNKNOWN");
            println!(
                "  {} {:<36} {:<18} {}",
                status_icon(status).glyph(),
                session.session_id.as_deref().unwrap_or(""),
                status,
                session.current_step.as_deref().unwrap_or("").dimmed()
            );
        }
    }

    let page = &snapshot.records;
    println!();
    println!("{}", "Improvement Records".bold().cyan());
    if page.content.is_empty() {
        println!("  {}", "No improvement records found".dimmed());
        return;
    }
    println!(
        "  {:<32} {:>10} {:>6} {:>9} Status",
        "File/Type", "Coverage", "Tests", "Time"
    );
    println!("  {}", "-".repeat(72));
    for record in &page.content {
        let coverage = match record.coverage_increase {
            Some(v) => format!("+{}%", safe_fixed(Some(v), 1)),
            None => "N/A".to_string(),
        };
        println!(
            "  {:<32} {:>10} {:>6} {:>9} {}",
            truncate(record.title(), 32),
            coverage,
            record.total_tests_generated.unwrap_or(0),
            format_duration(record.processing_time_ms),
            record.status.as_deref().unwrap_or("UNKNOWN"),
        );
    }
    if page.total_pages > 1 {
        println!(
            "  {}",
            format!("Page {} of {}", page.number + 1, page.total_pages).dimmed()
        );
    }
}

// ---------------------------------------------------------------------------
// coverdeck config show | init
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective coverdeck Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = Path::new(".coverdeck.toml").exists();
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.coverdeck/config.toml", global_exists);
    print_source(".coverdeck.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "COVERDECK_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source(label: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), label.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{label} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.coverdeck/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!(
        "  {}",
        "Set [dashboard] repository_id and repository_url before using the dashboard.".dimmed()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
