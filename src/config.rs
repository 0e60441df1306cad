//! Configuration management for the TMOS -> XC language server.
//!
//! Handles:
//! - Command-line argument parsing
//! - Project configuration from `.tmos-xc.toml`
//! - Rule source selection

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use crate::diagnostics::ScanOptions;
use crate::rules::RuleSource;

/// Project configuration file looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = ".tmos-xc.toml";

/// Options shared by the server and the command-line scanner
#[derive(Debug, Default, clap::Args)]
pub struct CommonArgs {
    /// Rule table to load instead of the built-in one
    #[arg(long, help = "Path to a tmosXcRules.json rule file")]
    pub rules: Option<PathBuf>,

    /// Reproduce the old behaviour of ignoring matches at column 0
    #[arg(long, overrides_with = "no_legacy_zero_offset")]
    pub legacy_zero_offset: bool,

    /// Report matches at column 0, even if the project file enables legacy mode
    #[arg(long, overrides_with = "legacy_zero_offset")]
    pub no_legacy_zero_offset: bool,

    /// Fail scans on rules with invalid patterns instead of skipping them
    #[arg(long, overrides_with = "no_strict_patterns")]
    pub strict_patterns: bool,

    /// Skip rules with invalid patterns, even if the project file is strict
    #[arg(long, overrides_with = "strict_patterns")]
    pub no_strict_patterns: bool,

    /// Log level
    #[arg(
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// Command-line arguments for the TMOS -> XC language server
#[derive(Debug, Default, Parser)]
#[command(name = "tmos-xc-ls")]
#[command(about = "Language server flagging TMOS config that does not migrate to XC")]
#[command(version)]
pub struct Args {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Reload the rule file when it changes on disk, even if the project file disables it
    #[arg(long, overrides_with = "no_watch")]
    pub watch: bool,

    /// Do not reload the rule file when it changes on disk
    #[arg(long, overrides_with = "watch")]
    pub no_watch: bool,
}

/// Resolve a `--flag`/`--no-flag` pair; `None` when neither was given
fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Settings read from `.tmos-xc.toml`
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Relative paths resolve against the config file's directory
    pub rules: Option<PathBuf>,
    pub legacy_zero_offset: Option<bool>,
    pub strict_patterns: Option<bool>,
    pub watch: Option<bool>,
}

impl ProjectConfig {
    /// Load the project config in `dir`, if present
    pub fn load_from_dir(dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let path = dir.join(PROJECT_CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read project config: {}", path.display()))?;
        let mut config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse project config: {}", path.display()))?;

        if let Some(rules) = config.rules.take() {
            config.rules = Some(if rules.is_relative() {
                dir.join(rules)
            } else {
                rules
            });
        }

        Ok(Some((config, path)))
    }
}

/// Combined configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub rule_source: RuleSource,
    pub scan: ScanOptions,
    /// Reload rules when the rule file changes
    pub watch_rules: bool,
    pub log_level: String,
    /// Project config that contributed to this configuration, if any
    pub project_config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rule_source: RuleSource::Embedded,
            scan: ScanOptions::default(),
            watch_rules: true,
            log_level: "info".to_string(),
            project_config_path: None,
        }
    }
}

impl Config {
    /// Create configuration from command-line arguments and the current directory
    pub fn from_args_and_env() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine working directory")?;
        Self::from_args_in(Args::parse(), &cwd)
    }

    /// Create configuration from explicit arguments (useful for testing)
    ///
    /// Command-line values win over the project file, which wins over defaults.
    /// Each boolean option has a `--no-` form so the command line can turn off
    /// what the project file turns on.
    pub fn from_args_in(args: Args, project_dir: &Path) -> Result<Self> {
        let mut config = Self::from_common_args_in(args.common, project_dir)?;
        if let Some(watch) = flag_pair(args.watch, args.no_watch) {
            config.watch_rules = watch;
        }
        Ok(config)
    }

    /// Configuration for tools that only scan, without the server-only options
    pub fn from_common_args_in(args: CommonArgs, project_dir: &Path) -> Result<Self> {
        let (project, project_config_path) = match ProjectConfig::load_from_dir(project_dir)? {
            Some((project, path)) => (project, Some(path)),
            None => (ProjectConfig::default(), None),
        };

        let rule_source = match args.rules.or(project.rules) {
            Some(path) => RuleSource::File(path),
            None => RuleSource::Embedded,
        };

        let scan = ScanOptions {
            legacy_zero_offset: flag_pair(args.legacy_zero_offset, args.no_legacy_zero_offset)
                .or(project.legacy_zero_offset)
                .unwrap_or(false),
            strict_patterns: flag_pair(args.strict_patterns, args.no_strict_patterns)
                .or(project.strict_patterns)
                .unwrap_or(false),
        };

        let watch_rules = project.watch.unwrap_or(true);

        Ok(Config {
            rule_source,
            scan,
            watch_rules,
            log_level: args.log_level,
            project_config_path,
        })
    }

    pub fn has_project_config(&self) -> bool {
        self.project_config_path.is_some()
    }
}
