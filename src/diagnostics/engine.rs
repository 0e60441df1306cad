//! Diagnostic Matcher
//!
//! Line-by-line scan of document text against every rule in a `RuleSet`.
//! Kept free of LSP types; the server converts at the boundary.

use anyhow::{Result, bail};
use serde::Serialize;

use crate::rules::{CompiledRule, RulePattern, RuleSet, Severity};

/// Single-line span, columns in UTF-16 code units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Range {
    pub fn on_line(line: usize, start_column: usize, end_column: usize) -> Self {
        Self {
            start_line: line,
            start_column,
            end_line: line,
            end_column,
        }
    }
}

/// A rule match reported against a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub range: Range,
}

/// Knobs controlling how a scan treats legacy quirks and broken rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Drop matches starting at column 0, as older rule tables expect
    pub legacy_zero_offset: bool,
    /// Fail the whole scan on a rule with an invalid pattern instead of skipping it
    pub strict_patterns: bool,
}

/// Scan `text` and return every rule match, in line then rule order
///
/// Lines are split on `'\n'` only, so a `'\r'` stays part of the line.
pub fn get_diagnostics(
    text: &str,
    rules: &RuleSet,
    options: &ScanOptions,
) -> Result<Vec<Diagnostic>> {
    let mut active = Vec::with_capacity(rules.len());

    for compiled in rules.iter() {
        match &compiled.pattern {
            RulePattern::Disabled => {}
            RulePattern::Valid(_) => active.push(compiled),
            RulePattern::Invalid(err) => {
                if options.strict_patterns {
                    bail!(
                        "Rule '{}' has an invalid pattern: {}",
                        compiled.rule.code,
                        err
                    );
                }
                log::warn!(
                    "skipping rule {} with invalid pattern: {}",
                    compiled.rule.code,
                    err
                );
            }
        }
    }

    let mut diagnostics = Vec::new();

    for (line_idx, line) in text.split('\n').enumerate() {
        for compiled in &active {
            if let Some(diagnostic) = match_rule(line_idx, line, compiled, options) {
                diagnostics.push(diagnostic);
            }
        }
    }

    Ok(diagnostics)
}

/// First match of one rule on one line
fn match_rule(
    line_idx: usize,
    line: &str,
    compiled: &CompiledRule,
    options: &ScanOptions,
) -> Option<Diagnostic> {
    let RulePattern::Valid(re) = &compiled.pattern else {
        return None;
    };

    let found = re.find(line)?;

    if options.legacy_zero_offset && found.start() == 0 {
        return None;
    }

    let start_column = utf16_len(&line[..found.start()]);
    let end_column = start_column + utf16_len(found.as_str());

    Some(Diagnostic {
        code: compiled.rule.code.clone(),
        message: compiled.rule.message.clone(),
        severity: compiled.rule.severity,
        range: Range::on_line(line_idx, start_column, end_column),
    })
}

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}
