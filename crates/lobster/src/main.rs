//! lobster - Lightweight Open BMW Software Traceability Evidence Report
//!
//! Reads a tracing policy, collects the items it declares, checks every item
//! against the policy and writes a report. `lobster status` prints the
//! coverage of a written report and can gate CI on it.

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use lobster::output::{OutputFormat, is_passing, render_diagnostics, render_status};
use lobster_core::{
    DEFAULT_CONFIG, DEFAULT_REPORT, Diagnostics, DiskFiles, InterchangeExtractor, Report,
};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "lobster", version, about = "Check and report requirements traceability")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Subcommands
#[derive(Debug, Subcommand)]
enum Command {
    /// Build a report from a tracing policy
    Report {
        /// Tracing policy to read
        #[arg(long, default_value = DEFAULT_CONFIG)]
        lobster_config: PathBuf,

        /// Where to write the report
        #[arg(long, default_value = DEFAULT_REPORT)]
        out: PathBuf,
    },

    /// Show coverage and failing items of a report
    Status {
        /// Report to read
        #[arg(default_value = DEFAULT_REPORT)]
        report: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,

        /// Exit 1 if any level is below the threshold
        #[arg(long)]
        check: bool,

        /// Minimum coverage percentage to pass (default: 100)
        #[arg(long)]
        threshold: Option<f64>,

        /// Also list items that are covered
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<ExitCode> {
    lobster::init_logging();
    let args = Args::parse();

    match args.command {
        Command::Report {
            lobster_config,
            out,
        } => run_report(&lobster_config, &out),
        Command::Status {
            report,
            format,
            check,
            threshold,
            verbose,
        } => run_status(&report, format, check, threshold.unwrap_or(100.0), verbose),
    }
}

fn run_report(policy: &Path, out: &Path) -> Result<ExitCode> {
    let files = DiskFiles::current_dir().wrap_err("Failed to determine working directory")?;
    let mut diagnostics = Diagnostics::new();

    eprintln!("{} Reading {}...", "->".blue().bold(), policy.display());
    let result = Report::parse_config(
        &policy.to_string_lossy(),
        &files,
        &mut InterchangeExtractor::new(),
        &mut diagnostics,
    );
    eprint!("{}", render_diagnostics(&diagnostics));
    debug!(warnings = diagnostics.warnings(), errors = diagnostics.errors(), "policy processed");

    let Ok(report) = result else {
        info!(policy = %policy.display(), "report aborted by a fatal error");
        return Ok(ExitCode::FAILURE);
    };

    report
        .write(out)
        .wrap_err_with(|| format!("Failed to write {}", out.display()))?;
    eprintln!(
        "   Wrote {} ({} items)",
        out.display(),
        report.items.len().to_string().green()
    );

    if diagnostics.has_fatal() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_status(
    path: &Path,
    format: OutputFormat,
    check: bool,
    threshold: f64,
    verbose: bool,
) -> Result<ExitCode> {
    let files = DiskFiles::current_dir().wrap_err("Failed to determine working directory")?;
    let mut diagnostics = Diagnostics::new();

    let result = Report::load(&path.to_string_lossy(), &files, &mut diagnostics);
    eprint!("{}", render_diagnostics(&diagnostics));
    let Ok(report) = result else {
        return Ok(ExitCode::FAILURE);
    };

    let output = render_status(&report, format, threshold, verbose)
        .wrap_err("Failed to render status")?;
    print!("{}", output);

    let passing = is_passing(&report, threshold);
    info!(report = %path.display(), threshold, passing, "checked coverage");
    if check && !passing {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
