//! Rule loading from the packaged table or a rule file on disk.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::registry::RuleSet;
use super::schema::Rule;

/// File name of the rule table, both packaged and on disk
pub const RULES_FILE_NAME: &str = "tmosXcRules.json";

const EMBEDDED_RULES: &str = include_str!("../../resources/tmosXcRules.json");

/// Where the active rule table comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    /// Rule table compiled into the binary
    Embedded,
    File(PathBuf),
}

impl RuleSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            RuleSource::Embedded => None,
            RuleSource::File(path) => Some(path),
        }
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::Embedded => f.write_str("built-in rules"),
            RuleSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Load and compile the rule table from `source`
///
/// A missing or malformed table is an error; there is no fallback to an
/// empty set.
pub fn load_rules(source: &RuleSource) -> Result<RuleSet> {
    log::info!("loading tmos -> xc rules from {}", source);

    let rules = match source {
        RuleSource::Embedded => parse_rules(EMBEDDED_RULES, None)?,
        RuleSource::File(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
            parse_rules(&content, Some(path))?
        }
    };

    let set = RuleSet::new(rules);
    for code in set.invalid_codes() {
        log::warn!("rule {} has an invalid pattern", code);
    }
    log::debug!("loaded {} rules", set.len());

    Ok(set)
}

/// Parse rule table JSON
pub fn parse_rules(content: &str, source_path: Option<&Path>) -> Result<Vec<Rule>> {
    serde_json::from_str(content).with_context(|| match source_path {
        Some(path) => format!("Failed to parse rules JSON: {}", path.display()),
        None => "Failed to parse built-in rules JSON".to_string(),
    })
}

/// User config directory holding an editable copy of the rules
pub fn user_rules_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tmos-xc"))
}

/// Write the packaged rules into `dir` so they can be opened and edited
///
/// An existing file is left untouched. Returns the file path.
pub fn materialize_default_rules(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create rules directory: {}", dir.display()))?;

    let rules_path = dir.join(RULES_FILE_NAME);

    if !rules_path.exists() {
        fs::write(&rules_path, EMBEDDED_RULES)
            .with_context(|| format!("Failed to write rules file: {}", rules_path.display()))?;
        log::info!("Created rules file: {:?}", rules_path);
    }

    Ok(rules_path)
}
