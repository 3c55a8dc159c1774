//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{Manifest, ValidationResult};
use crate::labels::LabelTable;
use crate::reconciler::RunReport;
use crate::resources::{RawResponse, UserInfo};
use crate::settings::{render_value, TaskDiff};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Resource row for table display.
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Changes")]
    changes: usize,
}

/// Label row for table display.
#[derive(Tabled)]
struct LabelRow {
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "ID")]
    id: i64,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the reports of a manifest run.
    #[must_use]
    pub fn format_reports(&self, reports: &[RunReport], check_mode: bool, show_diff: bool) -> String {
        match self.format {
            OutputFormat::Json => to_json(&RunJson {
                check_mode,
                changed: RunReport::changed_count(reports),
                total: reports.len(),
                resources: reports,
            }),
            OutputFormat::Text => Self::format_reports_text(reports, check_mode, show_diff),
        }
    }

    fn format_reports_text(reports: &[RunReport], check_mode: bool, show_diff: bool) -> String {
        if reports.is_empty() {
            return String::from("No resources declared in the manifest.\n");
        }

        let changed = RunReport::changed_count(reports);
        if changed == 0 {
            return format!(
                "{} No changes required - the Errata Tool matches the manifest.\n",
                "✓".green()
            );
        }

        let rows: Vec<ResourceRow> = reports
            .iter()
            .map(|r| ResourceRow {
                kind: r.kind.clone(),
                name: r.name.clone(),
                status: if r.outcome.changed {
                    "changed".yellow().to_string()
                } else {
                    "ok".green().to_string()
                },
                changes: r.outcome.stdout_lines.len(),
            })
            .collect();

        let mut output = String::new();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        for report in reports.iter().filter(|r| r.outcome.changed) {
            let _ = writeln!(output, "\n{} {} {}", "~".yellow(), report.kind, report.name.bold());
            for line in &report.outcome.stdout_lines {
                let _ = writeln!(output, "    {line}");
            }
            if show_diff && let Some(diff) = &report.outcome.diff {
                output.push_str(&Self::format_task_diff(diff));
            }
        }

        let verb = if check_mode { "would change" } else { "changed" };
        let _ = write!(
            output,
            "\n{}: {} of {} resources {verb}\n",
            if check_mode { "Plan" } else { "Apply" },
            changed.to_string().yellow(),
            reports.len()
        );
        output
    }

    /// Renders the keys whose value differs between before and after.
    fn format_task_diff(diff: &TaskDiff) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "    {} {}", "---".red(), diff.before_header);
        let _ = writeln!(output, "    {} {}", "+++".green(), diff.after_header);

        let keys = diff
            .after
            .keys()
            .chain(diff.before.keys().filter(|k| !diff.after.contains_key(*k)));
        for key in keys {
            let before = diff.before.get(key);
            let after = diff.after.get(key);
            if before == after {
                continue;
            }
            if let Some(value) = before {
                let _ = writeln!(output, "    {}", format!("- {key}: {}", render_value(value)).red());
            }
            if let Some(value) = after {
                let _ = writeln!(output, "    {}", format!("+ {key}: {}", render_value(value)).green());
            }
        }
        output
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(
        &self,
        result: &ValidationResult,
        manifest: &Manifest,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "valid": result.is_valid(),
                "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "warnings": result.warnings,
                "resources": manifest.resource_count(),
            })),
            OutputFormat::Text => {
                let mut output = String::new();
                if result.is_valid() {
                    let _ = writeln!(output, "{} Manifest is valid!", "✓".green());
                } else {
                    let _ = writeln!(
                        output,
                        "{} Manifest has {} errors:",
                        "✗".red(),
                        result.error_count()
                    );
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                }

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output.push_str("\nManifest summary:\n");
                let _ = writeln!(output, "   Users: {}", manifest.users.len());
                let _ = writeln!(output, "   RHEL releases: {}", manifest.rhel_releases.len());
                let _ = writeln!(output, "   Products: {}", manifest.products.len());
                let _ = writeln!(output, "   Product versions: {}", manifest.product_versions.len());
                let _ = writeln!(output, "   Variants: {}", manifest.variants.len());
                let _ = writeln!(output, "   Releases: {}", manifest.releases.len());
                let _ = writeln!(output, "   CDN repos: {}", manifest.cdn_repos.len());
                output
            }
        }
    }

    /// Formats a user query.
    #[must_use]
    pub fn format_user_info(&self, login_name: &str, info: &UserInfo) -> String {
        match self.format {
            OutputFormat::Json => to_json(info),
            OutputFormat::Text => {
                if !info.exists {
                    return format!("{} User {login_name} does not exist\n", "✗".red());
                }
                let mut output = format!("{} User {login_name}\n", "✓".green());
                if let Some(fields) = info.data.as_object() {
                    for (key, value) in fields {
                        let _ = writeln!(output, "   {key}: {}", render_value(value));
                    }
                }
                output
            }
        }
    }

    /// Formats a raw API response.
    #[must_use]
    pub fn format_raw(&self, response: &RawResponse) -> String {
        match self.format {
            OutputFormat::Json => to_json(response),
            OutputFormat::Text => {
                let status = if (200..300).contains(&response.status) {
                    response.status.to_string().green()
                } else {
                    response.status.to_string().red()
                };
                let mut output = format!("HTTP {status} {}\n", response.url);
                if let Some(json) = &response.json {
                    let _ = writeln!(output, "{}", to_json(json));
                } else if let Some(content) = &response.content {
                    let _ = writeln!(output, "{content}");
                }
                output
            }
        }
    }

    /// Formats a label enumeration.
    #[must_use]
    pub fn format_labels(&self, table: &LabelTable) -> String {
        match self.format {
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = table
                    .iter()
                    .map(|(label, id)| (label.to_string(), id.into()))
                    .collect();
                to_json(&map)
            }
            OutputFormat::Text => {
                let rows: Vec<LabelRow> = table
                    .iter()
                    .map(|(label, id)| LabelRow {
                        label: label.to_string(),
                        id,
                    })
                    .collect();
                format!("{} ({})\n{}\n", table.name(), table.len(), Table::new(rows))
            }
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

// JSON serialization helpers

#[derive(Serialize)]
struct RunJson<'a> {
    check_mode: bool,
    changed: usize,
    total: usize,
    resources: &'a [RunReport],
}
