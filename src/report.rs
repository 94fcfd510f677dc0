//! Report generation from collected facts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;

/// Schema version stamped on every report. Bump when the report layout changes.
pub const REPORT_VERSION: &str = "1";

/// Key under which the schema version is serialized.
pub const VERSION_KEY: &str = "Version";

/// A snapshot of host facts.
///
/// Serializes as a single JSON object: `"Version"` first, then one entry per
/// category in name order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Report schema version.
    #[serde(rename = "Version")]
    version: String,
    /// Category name to fact data.
    #[serde(flatten)]
    categories: BTreeMap<String, Value>,
}

impl Report {
    /// Schema version of this report.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Fact data for a category, if that probe contributed anything.
    pub fn category(&self, name: &str) -> Option<&Value> {
        self.categories.get(name)
    }

    /// Names of all categories present in the report.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Compact JSON form, as stored and sent.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Indented JSON form, for showing to a person.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Merges probe output into a [`Report`].
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    version: String,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportBuilder {
    /// Builder stamping the current schema version.
    pub fn new() -> Self {
        Self {
            version: REPORT_VERSION.to_string(),
        }
    }

    /// Build a report from the facts gathered this run.
    ///
    /// Probes that produced nothing are simply absent from `facts`. A fact
    /// named `Version` is dropped so it can never shadow the schema stamp.
    pub fn build(&self, facts: BTreeMap<String, Value>) -> Report {
        let mut categories = BTreeMap::new();
        for (name, data) in facts {
            if name == VERSION_KEY {
                debug!("Ignoring fact named {} to keep the schema stamp", VERSION_KEY);
                continue;
            }
            categories.insert(name, data);
        }

        debug!(
            "Built report version {} with {} categories",
            self.version,
            categories.len()
        );

        Report {
            version: self.version.clone(),
            categories,
        }
    }
}
