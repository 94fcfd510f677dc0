//! The persisted outcome of a consent decision.

use serde_json::Value;

use crate::error::Result;
use crate::report::Report;

/// Canonical JSON of an opt-out, byte for byte.
pub const OPT_OUT_JSON: &str = r#"{"OptOut": true}"#;

/// Whichever payload a run decided on: the real report or the opt-out marker.
///
/// There is no explicit tag; the two are told apart by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeRecord {
    /// The user agreed to share this report.
    Report(Report),
    /// The user declined; only the fact of declining is recorded.
    OptOut,
}

/// Which kind of decision a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    Report,
    OptOut,
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionKind::Report => write!(f, "report"),
            DecisionKind::OptOut => write!(f, "opt-out"),
        }
    }
}

impl OutcomeRecord {
    /// The kind of decision this record holds.
    pub fn kind(&self) -> DecisionKind {
        match self {
            OutcomeRecord::Report(_) => DecisionKind::Report,
            OutcomeRecord::OptOut => DecisionKind::OptOut,
        }
    }

    /// Canonical JSON form, used both on disk and as the POST body.
    pub fn to_json(&self) -> Result<String> {
        match self {
            OutcomeRecord::Report(report) => report.to_json(),
            OutcomeRecord::OptOut => Ok(OPT_OUT_JSON.to_string()),
        }
    }

    /// Parse a stored record. Returns `None` for anything that is neither an
    /// opt-out marker nor a versioned report.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(data).ok()?;
        if is_opt_out(&value) {
            return Some(OutcomeRecord::OptOut);
        }
        serde_json::from_value::<Report>(value)
            .ok()
            .filter(|report| !report.version().is_empty())
            .map(OutcomeRecord::Report)
    }
}

fn is_opt_out(value: &Value) -> bool {
    match value.as_object() {
        Some(map) => map.len() == 1 && map.get("OptOut") == Some(&Value::Bool(true)),
        None => false,
    }
}
