//! Rule Registry
//!
//! Immutable, ordered rule table with patterns compiled once per load.
//! Reloading builds a fresh `RuleSet`; scans hold an `Arc` to whichever
//! set was current when they started.

use regex::{Regex, RegexBuilder};

use super::schema::Rule;

/// Upper bound on compiled program size for a single rule pattern
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Compiled state of a rule's pattern
#[derive(Debug, Clone)]
pub enum RulePattern {
    /// Empty pattern, rule never fires
    Disabled,
    Valid(Regex),
    /// Pattern failed to compile; error is reported when a scan reaches it
    Invalid(String),
}

/// A rule together with its compiled pattern
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    pub pattern: RulePattern,
}

impl CompiledRule {
    pub fn new(rule: Rule) -> Self {
        let pattern = if !rule.is_enabled() {
            RulePattern::Disabled
        } else {
            match RegexBuilder::new(&rule.regex)
                .size_limit(PATTERN_SIZE_LIMIT)
                .build()
            {
                Ok(re) => RulePattern::Valid(re),
                Err(e) => RulePattern::Invalid(e.to_string()),
            }
        };

        Self { rule, pattern }
    }
}

/// Ordered set of rules used by a scan
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules: rules.into_iter().map(CompiledRule::new).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules in load order
    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look up a rule by its code
    pub fn get(&self, code: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .map(|compiled| &compiled.rule)
            .find(|rule| rule.code == code)
    }

    /// Codes of rules whose pattern failed to compile
    pub fn invalid_codes(&self) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|compiled| matches!(compiled.pattern, RulePattern::Invalid(_)))
            .map(|compiled| compiled.rule.code.as_str())
            .collect()
    }

    pub fn rules(&self) -> Vec<&Rule> {
        self.rules.iter().map(|compiled| &compiled.rule).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Severity;

    fn rule(code: &str, regex: &str) -> Rule {
        Rule {
            code: code.to_string(),
            severity: Severity::Warning,
            title: String::new(),
            message: String::new(),
            regex: regex.to_string(),
        }
    }

    #[test]
    fn test_compile_states() {
        let set = RuleSet::new(vec![rule("A", "foo"), rule("B", ""), rule("C", "(")]);

        let patterns: Vec<_> = set.iter().map(|c| &c.pattern).collect();
        assert!(matches!(patterns[0], RulePattern::Valid(_)));
        assert!(matches!(patterns[1], RulePattern::Disabled));
        assert!(matches!(patterns[2], RulePattern::Invalid(_)));
        assert_eq!(set.invalid_codes(), vec!["C"]);
    }

    #[test]
    fn test_load_order_preserved() {
        let set = RuleSet::new(vec![rule("Z", "z"), rule("A", "a"), rule("M", "m")]);
        let codes: Vec<_> = set.rules().iter().map(|r| r.code.clone()).collect();
        assert_eq!(codes, vec!["Z", "A", "M"]);
        assert_eq!(set.get("A").map(|r| r.regex.as_str()), Some("a"));
        assert!(set.get("Q").is_none());
    }
}
