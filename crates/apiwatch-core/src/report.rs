//! # Check Report
//!
//! Structured output of a regression check: every detected
//! incompatibility is a `BreakingPath` record carrying the full access
//! path plus the actual/required tags or a reason string. Breakages are
//! warnings, never failures; the report collects them for serialization
//! while `tracing` surfaces them live.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::lattice::TypeTag;
use crate::path::AccessPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BreakageKind {
    /// The new library produced a type incompatible with the model.
    TypeMismatch,
    /// A parent value was missing, so this subtree could not be checked.
    EmptyAccess,
    /// The new library read a property the model never recorded.
    UnexpectedRead,
    /// The new library invoked a synthesized callback with an
    /// unrecorded signature.
    UnexpectedSignature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakingPath {
    pub breaking_path: AccessPath,
    pub kind: BreakageKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub actual: Option<TypeTag>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub required: Option<TypeTag>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

/// Outcome of replaying one model against a library version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub library: String,
    /// Model nodes the driver actually visited.
    pub checked_paths: usize,
    pub breakages: Vec<BreakingPath>,
}

impl CheckReport {
    pub fn new(library: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            checked_paths: 0,
            breakages: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.breakages.is_empty()
    }

    /// Record a breakage and emit it as a live warning.
    pub fn record(&mut self, breakage: BreakingPath) {
        let actual = breakage
            .actual
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let required = breakage
            .required
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        warn!(
            breaking_path = %breakage.breaking_path,
            kind = ?breakage.kind,
            actual = %actual,
            required = %required,
            reason = breakage.reason.as_deref().unwrap_or("-"),
            "breaking path detected"
        );
        self.breakages.push(breakage);
    }

    /// One line per breakage plus a summary, for terminal output.
    pub fn render_human(&self) -> String {
        let mut out = String::new();
        for b in &self.breakages {
            out.push_str(&format!("BREAKING [{:?}] {}", b.kind, b.breaking_path));
            match (&b.actual, &b.required) {
                (Some(actual), Some(required)) => {
                    out.push_str(&format!(": actual {}, required {}", actual, required));
                }
                (Some(actual), None) => out.push_str(&format!(": actual {}", actual)),
                _ => {}
            }
            if let Some(reason) = &b.reason {
                out.push_str(&format!(" ({})", reason));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "{} checked path(s), {} breaking\n",
            self.checked_paths,
            self.breakages.len()
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_round_trips_through_json() {
        let mut report = CheckReport::new("mylib");
        report.checked_paths = 3;
        report.record(BreakingPath {
            breaking_path: AccessPath::root("mylib"),
            kind: BreakageKind::TypeMismatch,
            actual: Some(TypeTag::String),
            required: Some(TypeTag::Number),
            reason: None,
        });
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("breakingPath"));
        let back: CheckReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.breakages.len(), 1);
        assert_eq!(back.breakages[0].kind, BreakageKind::TypeMismatch);
    }

    #[test]
    fn human_rendering_mentions_types() {
        let mut report = CheckReport::new("mylib");
        report.checked_paths = 1;
        report.record(BreakingPath {
            breaking_path: AccessPath::root("mylib"),
            kind: BreakageKind::TypeMismatch,
            actual: Some(TypeTag::String),
            required: Some(TypeTag::Number),
            reason: Some("return type changed".to_string()),
        });
        let text = report.render_human();
        assert!(text.contains("actual string"));
        assert!(text.contains("required number"));
        assert!(text.contains("1 breaking"));
    }
}
