//! Output formatting for diagnostics and tracing status

use lobster_core::{Diagnostics, Item, Report, Severity, TracingStatus};
use owo_colors::OwoColorize;
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Render every diagnostic, one per line.
pub fn render_diagnostics(diagnostics: &Diagnostics) -> String {
    let mut output = String::new();
    for d in diagnostics {
        let severity = match d.severity {
            Severity::Warning => d.severity.as_str().yellow().bold().to_string(),
            Severity::Error => d.severity.as_str().red().bold().to_string(),
        };
        output.push_str(&format!("{}: lobster {}: {}\n", d.location, severity, d.message));
    }
    output
}

/// Render per-level coverage and the items that need attention.
/// `passing` in the JSON form is judged against `threshold`.
pub fn render_status(
    report: &Report,
    format: OutputFormat,
    threshold: f64,
    verbose: bool,
) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report, verbose)),
        OutputFormat::Json => render_json(report, threshold, verbose),
    }
}

/// Whether every level is covered to at least `threshold` percent.
/// Levels without items do not count against the threshold.
pub fn is_passing(report: &Report, threshold: f64) -> bool {
    report
        .coverage
        .values()
        .all(|c| c.items == 0 || c.is_passing(threshold))
}

/// Items of `level` to show, grouped by file and ordered by position.
fn shown_items<'a>(report: &'a Report, level: &'a str, verbose: bool) -> Vec<&'a Item> {
    let mut items: Vec<&Item> = report
        .items_of_level(level)
        .filter(|item| verbose || !item.tracing_status.is_some_and(|s| s.is_covered()))
        .collect();
    items.sort_by_key(|item| (item.location.sort_key(), item.key()));
    items
}

fn colored_status(status: Option<TracingStatus>) -> String {
    let Some(status) = status else {
        return "UNKNOWN".dimmed().to_string();
    };
    match status {
        TracingStatus::Ok => status.as_str().green().to_string(),
        TracingStatus::Justified => status.as_str().cyan().to_string(),
        TracingStatus::Partial => status.as_str().yellow().to_string(),
        TracingStatus::Missing | TracingStatus::Error => status.as_str().red().to_string(),
    }
}

fn render_text(report: &Report, verbose: bool) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str(&format!("{} Tracing Status\n", "##".bold()));
    output.push('\n');

    for level in &report.config {
        let coverage = report.coverage.get(&level.name).copied().unwrap_or_default();
        let percent = coverage.percentage();
        let percent_str = format!("{:.1}%", percent);
        let color_percent = if percent >= 100.0 {
            percent_str.green().to_string()
        } else if percent >= 50.0 {
            percent_str.yellow().to_string()
        } else {
            percent_str.red().to_string()
        };

        output.push_str(&format!(
            "{} ({}): {} ({}/{} items)\n",
            level.name.cyan().bold(),
            level.kind.as_str().dimmed(),
            color_percent,
            coverage.ok,
            coverage.items
        ));

        for item in shown_items(report, &level.name, verbose) {
            output.push_str(&format!(
                "  {} {} [{}] {}\n",
                "-".yellow(),
                item.tag,
                colored_status(item.tracing_status),
                item.location.to_text().dimmed()
            ));
            for message in &item.messages {
                output.push_str(&format!("      {}\n", message));
            }
        }
        output.push('\n');
    }

    if let Some(custom) = &report.custom_data {
        for (key, value) in custom {
            output.push_str(&format!("{}: {}\n", key.dimmed(), value));
        }
    }

    output
}

#[derive(Serialize)]
struct JsonStatus<'a> {
    passing: bool,
    threshold: f64,
    levels: Vec<JsonLevel<'a>>,
}

#[derive(Serialize)]
struct JsonLevel<'a> {
    name: &'a str,
    kind: &'a str,
    items: usize,
    ok: usize,
    coverage_percent: f64,
    details: Vec<JsonItem<'a>>,
}

#[derive(Serialize)]
struct JsonItem<'a> {
    tag: String,
    location: String,
    status: Option<TracingStatus>,
    messages: &'a [String],
}

fn render_json(report: &Report, threshold: f64, verbose: bool) -> serde_json::Result<String> {
    let levels = report
        .config
        .iter()
        .map(|level| {
            let coverage = report.coverage.get(&level.name).copied().unwrap_or_default();
            JsonLevel {
                name: &level.name,
                kind: level.kind.as_str(),
                items: coverage.items,
                ok: coverage.ok,
                coverage_percent: coverage.percentage(),
                details: shown_items(report, &level.name, verbose)
                    .into_iter()
                    .map(|item| JsonItem {
                        tag: item.tag.to_string(),
                        location: item.location.to_text(),
                        status: item.tracing_status,
                        messages: &item.messages,
                    })
                    .collect(),
            }
        })
        .collect();

    serde_json::to_string_pretty(&JsonStatus {
        passing: is_passing(report, threshold),
        threshold,
        levels,
    })
}
