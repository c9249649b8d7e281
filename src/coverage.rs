//! Folder/file coverage drill-down.
//!
//! The browser keeps a stack of opened paths. `back()` re-fetches the
//! previous listing without pushing it again; backing out of the first
//! level returns to the root.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::transport::{Transport, decode, nullable};

const CHILDREN_ROUTE: &str = "/coverage-dashboard/children";

/// One row of a coverage listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverageEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "nullable")]
    pub metrics_map: BTreeMap<String, Value>,
}

impl CoverageEntry {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind.as_str(), "DIR" | "DIRECTORY")
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// A numeric metric; absent, null or non-numeric values are `None`.
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics_map
            .get(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }

    pub fn coverage(&self) -> Option<f64> {
        self.metric("coverage")
    }

    pub fn line_coverage(&self) -> Option<f64> {
        self.metric("line_coverage")
    }

    pub fn branch_coverage(&self) -> Option<f64> {
        self.metric("branch_coverage")
    }
}

/// The children of one path.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub path: String,
    pub entries: Vec<CoverageEntry>,
}

/// Where `back()` landed.
#[derive(Debug, Clone, PartialEq)]
pub enum BackTarget {
    Root,
    Listing(Listing),
}

pub struct CoverageBrowser {
    transport: Arc<dyn Transport>,
    stack: Vec<String>,
}

impl CoverageBrowser {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            stack: Vec::new(),
        }
    }

    /// `GET /coverage-dashboard/children?parentPath=`.
    pub fn children(&self, parent_path: &str) -> Result<Vec<CoverageEntry>> {
        let query = [("parentPath", parent_path.to_string())];
        decode(CHILDREN_ROUTE, self.transport.get_json(CHILDREN_ROUTE, &query)?)
    }

    /// Top-level listing. Clears the drill-down stack.
    pub fn root(&mut self) -> Result<Listing> {
        self.stack.clear();
        Ok(Listing {
            path: String::new(),
            entries: self.children("")?,
        })
    }

    /// Drill into `path`. The stack only grows when the fetch succeeded.
    pub fn open(&mut self, path: &str) -> Result<Listing> {
        let entries = self.children(path)?;
        self.stack.push(path.to_string());
        Ok(Listing {
            path: path.to_string(),
            entries,
        })
    }

    pub fn back(&mut self) -> Result<BackTarget> {
        self.stack.pop();
        match self.stack.last() {
            None => Ok(BackTarget::Root),
            Some(previous) => {
                let path = previous.clone();
                Ok(BackTarget::Listing(Listing {
                    entries: self.children(&path)?,
                    path,
                }))
            }
        }
    }

    /// Innermost opened path, empty at the root.
    pub fn current_path(&self) -> &str {
        self.stack.last().map(String::as_str).unwrap_or("")
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
