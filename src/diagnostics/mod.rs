//! Diagnostics Engine
//!
//! Rule matching, severity stats and the per-document diagnostic store,
//! kept separate from rule loading and LSP concerns.

pub mod engine;
pub mod stats;
pub mod store;

pub use engine::{Diagnostic, Range, ScanOptions, get_diagnostics};
pub use stats::{SeverityStats, get_stats};
pub use store::{DiagnosticStore, ScanTicket};
