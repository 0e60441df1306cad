//! Rule Schema Types
//!
//! Plain types matching the JSON rule table, plus the closed severity enum.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Diagnostic severity, ordered by decreasing urgency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Information,
    #[default]
    Hint,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Error,
        Severity::Warning,
        Severity::Information,
        Severity::Hint,
    ];

    /// Map a free-form severity name, anything unrecognized becomes `Hint`
    pub fn from_name(name: &str) -> Self {
        match name {
            "Error" => Severity::Error,
            "Warning" => Severity::Warning,
            "Information" => Severity::Information,
            _ => Severity::Hint,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Information => "Information",
            Severity::Hint => "Hint",
        }
    }
}

impl From<String> for Severity {
    fn from(name: String) -> Self {
        Severity::from_name(&name)
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Non-string values fall back the same way unknown names do
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map(Severity::from_name)
            .unwrap_or_default())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single rule as stored in the rule file
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Rule {
    pub code: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    /// Empty pattern disables the rule
    #[serde(default)]
    pub regex: String,
}

impl Rule {
    pub fn is_enabled(&self) -> bool {
        !self.regex.is_empty()
    }
}
