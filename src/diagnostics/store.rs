//! Diagnostic Store
//!
//! Holds the current diagnostic set per document. A new result for a
//! document replaces that document's set only; other documents are left
//! alone. Results carry a ticket from `begin`, and only the newest ticket
//! for a document may commit, so an older scan finishing late is dropped.
//! Tickets are only issued for documents tracked with `open`; once a
//! document is removed, scans still in flight for it can no longer commit.

use std::collections::HashMap;
use std::hash::Hash;

use anyhow::Result;

use super::engine::{Diagnostic, ScanOptions, get_diagnostics};
use super::stats::{SeverityStats, get_stats};
use crate::rules::RuleSet;

/// Identifies one requested scan of one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScanTicket(u64);

#[derive(Debug)]
struct Entry {
    diagnostics: Vec<Diagnostic>,
    latest: u64,
}

/// Current diagnostics keyed by document identity
#[derive(Debug)]
pub struct DiagnosticStore<K> {
    entries: HashMap<K, Entry>,
    next_ticket: u64,
}

impl<K> Default for DiagnosticStore<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_ticket: 0,
        }
    }
}

impl<K: Eq + Hash + Clone> DiagnosticStore<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `key`; a tracked document keeps its diagnostics
    pub fn open(&mut self, key: &K) {
        self.entries.entry(key.clone()).or_insert_with(|| Entry {
            diagnostics: Vec::new(),
            latest: 0,
        });
    }

    /// Reserve a ticket for a scan of `key` about to start
    ///
    /// Returns `None` when `key` is not tracked, e.g. after it was removed.
    pub fn begin(&mut self, key: &K) -> Option<ScanTicket> {
        let entry = self.entries.get_mut(key)?;
        self.next_ticket += 1;
        entry.latest = self.next_ticket;
        Some(ScanTicket(self.next_ticket))
    }

    /// Replace `key`'s diagnostics if `ticket` is still the newest one
    ///
    /// Returns false when a newer scan was started or the document was
    /// removed in the meantime.
    pub fn commit(&mut self, key: &K, ticket: ScanTicket, diagnostics: Vec<Diagnostic>) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.latest == ticket.0 => {
                entry.diagnostics = diagnostics;
                true
            }
            _ => {
                log::debug!("dropping stale scan result (ticket {})", ticket.0);
                false
            }
        }
    }

    /// Rescan `text` and replace the diagnostics published for `key`
    pub fn update(
        &mut self,
        key: &K,
        text: &str,
        rules: &RuleSet,
        options: &ScanOptions,
    ) -> Result<&[Diagnostic]> {
        let diagnostics = get_diagnostics(text, rules, options)?;
        self.open(key);
        if let Some(ticket) = self.begin(key) {
            self.commit(key, ticket, diagnostics);
        }
        Ok(self.get(key))
    }

    /// Current diagnostics for `key`, empty if none were published
    pub fn get(&self, key: &K) -> &[Diagnostic] {
        self.entries
            .get(key)
            .map(|entry| entry.diagnostics.as_slice())
            .unwrap_or(&[])
    }

    pub fn stats(&self, key: &K) -> SeverityStats {
        get_stats(self.get(key))
    }

    /// Forget a document, e.g. when it is closed
    pub fn remove(&mut self, key: &K) -> Option<Vec<Diagnostic>> {
        self.entries.remove(key).map(|entry| entry.diagnostics)
    }

    /// Drop every document's diagnostics
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Rule, Severity};

    fn rules() -> RuleSet {
        let rule = |code: &str, regex: &str| Rule {
            code: code.to_string(),
            severity: Severity::Error,
            title: String::new(),
            message: String::new(),
            regex: regex.to_string(),
        };
        RuleSet::new(vec![rule("A", "alpha"), rule("B", "beta"), rule("C", "gamma")])
    }

    #[test]
    fn test_refresh_replaces_not_appends() {
        let mut store = DiagnosticStore::new();
        let rules = rules();
        let options = ScanOptions::default();

        let first = store
            .update(&"doc", " alpha beta gamma", &rules, &options)
            .unwrap();
        assert_eq!(first.len(), 3);

        let second = store.update(&"doc", " beta", &rules, &options).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(store.get(&"doc").len(), 1);
    }

    #[test]
    fn test_update_scoped_to_document() {
        let mut store = DiagnosticStore::new();
        let rules = rules();
        let options = ScanOptions::default();

        store.update(&"a", " alpha", &rules, &options).unwrap();
        store.update(&"b", " beta gamma", &rules, &options).unwrap();
        store.update(&"a", " nothing", &rules, &options).unwrap();

        assert!(store.get(&"a").is_empty());
        assert_eq!(store.get(&"b").len(), 2);
    }

    #[test]
    fn test_stale_ticket_dropped() {
        let mut store: DiagnosticStore<&str> = DiagnosticStore::new();
        let rules = rules();
        let options = ScanOptions::default();

        store.open(&"doc");
        let old = store.begin(&"doc").unwrap();
        let new = store.begin(&"doc").unwrap();
        assert!(new > old);

        let newer = get_diagnostics(" beta", &rules, &options).unwrap();
        let older = get_diagnostics(" alpha beta gamma", &rules, &options).unwrap();

        assert!(store.commit(&"doc", new, newer));
        assert!(!store.commit(&"doc", old, older));
        assert_eq!(store.get(&"doc").len(), 1);
        assert_eq!(store.get(&"doc")[0].code, "B");
    }

    #[test]
    fn test_commit_after_remove_is_dropped() {
        let mut store: DiagnosticStore<&str> = DiagnosticStore::new();
        store.open(&"doc");
        let ticket = store.begin(&"doc").unwrap();
        store.remove(&"doc");
        assert!(!store.commit(&"doc", ticket, Vec::new()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_removed_document_is_not_resurrected() {
        let mut store = DiagnosticStore::new();
        let rules = rules();
        store
            .update(&"doc", " alpha", &rules, &ScanOptions::default())
            .unwrap();
        store.remove(&"doc");

        assert_eq!(store.begin(&"doc"), None);
        assert!(store.is_empty());

        let late = get_diagnostics(" alpha", &rules, &ScanOptions::default()).unwrap();
        assert!(!store.commit(&"doc", ScanTicket(u64::MAX), late));
        assert!(store.is_empty());
        assert!(store.get(&"doc").is_empty());
    }

    #[test]
    fn test_begin_requires_open() {
        let mut store: DiagnosticStore<&str> = DiagnosticStore::new();
        assert_eq!(store.begin(&"doc"), None);

        store.open(&"doc");
        assert!(store.begin(&"doc").is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_failed_update_keeps_previous_set() {
        let mut store = DiagnosticStore::new();
        let good = rules();
        let options = ScanOptions {
            strict_patterns: true,
            ..Default::default()
        };
        store.update(&"doc", " alpha", &good, &options).unwrap();

        let broken = RuleSet::new(vec![Rule {
            code: "BAD".to_string(),
            severity: Severity::Error,
            title: String::new(),
            message: String::new(),
            regex: "[".to_string(),
        }]);
        assert!(store.update(&"doc", " alpha", &broken, &options).is_err());
        assert_eq!(store.get(&"doc").len(), 1);
    }

    #[test]
    fn test_stats_and_clear() {
        let mut store = DiagnosticStore::new();
        let rules = rules();
        store
            .update(&1u32, " alpha beta", &rules, &ScanOptions::default())
            .unwrap();
        assert_eq!(store.stats(&1).get(Severity::Error), 2);

        store.clear();
        assert!(store.get(&1).is_empty());
        assert!(store.stats(&1).is_empty());
    }
}
