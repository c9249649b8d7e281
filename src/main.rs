use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use coverdeck::cli::{self, ImproveOptions};
use coverdeck::session::SessionKind;
use coverdeck::{config, logging, web};

#[derive(Debug, Parser)]
#[command(name = "coverdeck")]
#[command(about = "Drive coverage-improvement sessions and browse their results")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

/// Which backend routes a session lives under.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    File,
    Repo,
}

impl From<Kind> for SessionKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::File => SessionKind::File,
            Kind::Repo => SessionKind::Repository,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the coverage listing for a path (the root when omitted)
    Tree {
        path: Option<String>,
    },
    /// Generate tests for one file and follow the session
    ImproveFile {
        /// Repository-relative path of the file
        file: String,
        /// Target coverage increase in percent
        #[arg(long)]
        target: Option<f64>,
        /// Ask the backend to open a pull request
        #[arg(long)]
        create_pr: bool,
        /// Apply the generated changes once the session completes
        #[arg(long)]
        apply: bool,
        /// Print the session id and exit without tracking
        #[arg(long)]
        detach: bool,
    },
    /// Improve coverage across the configured repository
    ImproveRepo {
        #[arg(long)]
        target: Option<f64>,
        #[arg(long)]
        apply: bool,
        #[arg(long)]
        detach: bool,
    },
    /// Show the status of a session
    Status {
        session_id: String,
        #[arg(long, value_enum, default_value = "file")]
        kind: Kind,
    },
    /// Cancel a running session
    Cancel {
        session_id: String,
        #[arg(long, value_enum, default_value = "file")]
        kind: Kind,
    },
    /// Apply a finished session's changes and open a pull request
    Apply {
        session_id: String,
        #[arg(long, value_enum, default_value = "file")]
        kind: Kind,
    },
    /// Submit issues for an automated fix: KEY or KEY:ClassName
    FixIssues {
        #[arg(required = true)]
        issues: Vec<String>,
    },
    /// Show the productivity dashboard
    Dashboard {
        /// Reload every `[dashboard] refresh_secs`
        #[arg(long)]
        watch: bool,
        /// Write the dashboard as an HTML page instead of printing it
        #[arg(long, value_name = "FILE")]
        html: Option<PathBuf>,
    },
    /// Serve the web console
    Web {
        /// Open the console in the default browser
        #[arg(long)]
        open: bool,
    },
    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default config to ~/.coverdeck/config.toml
    Init {
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let app = App::parse();
    let config = config::load();
    logging::init(&config.logging)?;

    match app.command {
        Commands::Tree { path } => cli::run_tree(&config, path.as_deref()),
        Commands::ImproveFile {
            file,
            target,
            create_pr,
            apply,
            detach,
        } => {
            let options = ImproveOptions {
                target_increase: target,
                create_pull_request: create_pr,
                apply,
                detach,
            };
            cli::run_improve_file(&config, &file, &options)
        }
        Commands::ImproveRepo {
            target,
            apply,
            detach,
        } => {
            let options = ImproveOptions {
                target_increase: target,
                apply,
                detach,
                ..Default::default()
            };
            cli::run_improve_repo(&config, &options)
        }
        Commands::Status { session_id, kind } => cli::run_status(&config, &session_id, kind.into()),
        Commands::Cancel { session_id, kind } => cli::run_cancel(&config, &session_id, kind.into()),
        Commands::Apply { session_id, kind } => cli::run_apply(&config, &session_id, kind.into()),
        Commands::FixIssues { issues } => cli::run_fix_issues(&config, &issues),
        Commands::Dashboard { watch, html } => cli::run_dashboard(&config, watch, html.as_deref()),
        Commands::Web { open } => web::serve(&config, open),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
        },
    }
}
