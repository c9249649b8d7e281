//! coverdeck: client for a test-coverage improvement service.
//!
//! Starts file- and repository-level improvement sessions, follows their
//! progress over a WebSocket push channel with status polling as fallback,
//! drives issue remediation, and renders the productivity dashboard and
//! coverage drill-down for the terminal and the embedded web console.

pub mod cli;
pub mod config;
pub mod coverage;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod remediation;
pub mod render;
pub mod session;
pub mod timer;
pub mod transport;
pub mod web;

pub use error::{ClientError, Result};
