//! Rule System
//!
//! Loading, compiling and watching the TMOS -> XC rule table.

pub mod loader;
pub mod registry;
pub mod schema;
pub mod watcher;

pub use loader::{RuleSource, load_rules, materialize_default_rules};
pub use registry::{CompiledRule, RulePattern, RuleSet};
pub use schema::{Rule, Severity};
pub use watcher::{RulesEvent, RulesWatcher, watch_rules_file};
