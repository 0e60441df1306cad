//! TMOS -> XC Language Server
//!
//! Flags F5 TMOS configuration constructs that do not carry over to XC.
//!
//! This library provides:
//! - Rule table loading, compiling and live reload
//! - Line-oriented rule matching and severity stats
//! - A per-document diagnostic store
//! - LSP protocol implementation
//! - Configuration management

pub mod config;
pub mod diagnostics;
pub mod lsp;
pub mod rules;

// Re-exports for clean public API
pub use config::Config;
pub use diagnostics::{
    Diagnostic, DiagnosticStore, Range, ScanOptions, SeverityStats, get_diagnostics, get_stats,
};
pub use rules::{Rule, RuleSet, RuleSource, Severity, load_rules};
