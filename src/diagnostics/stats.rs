//! Per-severity counts over a diagnostic collection.

use std::collections::BTreeMap;

use serde::Serialize;

use super::engine::Diagnostic;
use crate::rules::Severity;

/// Sparse severity -> count map; severities that never occur are absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SeverityStats(BTreeMap<Severity, usize>);

impl SeverityStats {
    /// Count for `severity`, zero when absent
    pub fn get(&self, severity: Severity) -> usize {
        self.0.get(&severity).copied().unwrap_or(0)
    }

    pub fn contains(&self, severity: Severity) -> bool {
        self.0.contains_key(&severity)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Severity, usize)> + '_ {
        self.0.iter().map(|(severity, count)| (*severity, *count))
    }
}

/// Summarize diagnostics by severity
pub fn get_stats(diagnostics: &[Diagnostic]) -> SeverityStats {
    let mut counts = BTreeMap::new();
    for diagnostic in diagnostics {
        *counts.entry(diagnostic.severity).or_insert(0) += 1;
    }
    SeverityStats(counts)
}
