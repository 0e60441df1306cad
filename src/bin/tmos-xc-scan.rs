//! Scan TMOS config files from the command line and print diagnostics.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use tmos_xc_language_server::config::CommonArgs;
use tmos_xc_language_server::lsp::server::init_logging;
use tmos_xc_language_server::{
    Config, Diagnostic, Severity, SeverityStats, get_diagnostics, get_stats, load_rules,
};

#[derive(Debug, Parser)]
#[command(name = "tmos-xc-scan")]
#[command(about = "Report TMOS config constructs that do not migrate to XC")]
#[command(version)]
struct ScanArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Configuration files to scan
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FileReport {
    file: PathBuf,
    diagnostics: Vec<Diagnostic>,
    stats: SeverityStats,
}

fn main() -> Result<ExitCode> {
    let args = ScanArgs::parse();
    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let config = Config::from_common_args_in(args.common, &cwd)?;
    init_logging(&config.log_level);

    let rules = load_rules(&config.rule_source)?;

    let mut reports = Vec::with_capacity(args.files.len());
    for file in args.files {
        let text = fs::read_to_string(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let diagnostics = get_diagnostics(&text, &rules, &config.scan)
            .with_context(|| format!("Failed to scan {}", file.display()))?;
        let stats = get_stats(&diagnostics);
        reports.push(FileReport {
            file,
            diagnostics,
            stats,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    let has_errors = reports
        .iter()
        .any(|report| report.stats.contains(Severity::Error));

    Ok(if has_errors {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_report(report: &FileReport) {
    for d in &report.diagnostics {
        println!(
            "{}:{}:{}: {}[{}]: {}",
            report.file.display(),
            d.range.start_line + 1,
            d.range.start_column + 1,
            d.severity,
            d.code,
            d.message
        );
    }

    let summary: Vec<String> = report
        .stats
        .iter()
        .map(|(severity, count)| format!("{}: {}", severity, count))
        .collect();

    if summary.is_empty() {
        println!("{}: no findings", report.file.display());
    } else {
        println!("{}: {}", report.file.display(), summary.join(", "));
    }
}
