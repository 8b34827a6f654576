//! Report generation with multiple output formats
//!
//! Architecture: Anti-Corruption Layer - formatters translate domain objects to external formats
//! - AnalysisReport (domain) is converted to text or JSON representations
//! - Both formats carry identical information so CI and humans see the same facts
//! - Degraded files are listed apart from violations in every format

use crate::domain::violations::{AnalysisReport, BoundaryResult, Severity, Violation};
use serde_json::Value as JsonValue;
use std::io::Write;

/// Supported output formats for analysis reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text grouped by file
    #[default]
    Text,
    /// JSON for programmatic consumption
    Json,
}

impl OutputFormat {
    /// Parse format from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// All available format names
    pub fn all_formats() -> &'static [&'static str] {
        &["text", "json"]
    }
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (text format only)
    pub use_colors: bool,
    /// Whether to list the modules involved in each violation
    pub show_related: bool,
    /// Minimum severity level to include
    pub min_severity: Option<Severity>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { use_colors: true, show_related: true, min_severity: None }
    }
}

/// Formats analysis reports for output
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    /// Format a report in the specified format
    pub fn format_report(
        &self,
        report: &AnalysisReport,
        format: OutputFormat,
    ) -> BoundaryResult<String> {
        let filtered = self.filter_violations(&report.violations);
        match format {
            OutputFormat::Text => self.format_text(report, &filtered),
            OutputFormat::Json => self.format_json(report, &filtered),
        }
    }

    /// Write a formatted report to a writer
    pub fn write_report<W: Write>(
        &self,
        report: &AnalysisReport,
        format: OutputFormat,
        mut writer: W,
    ) -> BoundaryResult<()> {
        let formatted = self.format_report(report, format)?;
        writer
            .write_all(formatted.as_bytes())
            .map_err(|e| crate::domain::violations::BoundaryError::Io { source: e })?;
        Ok(())
    }

    fn filter_violations<'a>(&self, violations: &'a [Violation]) -> Vec<&'a Violation> {
        violations
            .iter()
            .filter(|v| match self.options.min_severity {
                Some(min) => v.severity >= min,
                None => true,
            })
            .collect()
    }

    fn format_text(
        &self,
        report: &AnalysisReport,
        violations: &[&Violation],
    ) -> BoundaryResult<String> {
        let mut output = String::new();

        if violations.is_empty() {
            if self.options.use_colors {
                output.push_str("\x1b[32mNo boundary violations found\x1b[0m\n");
            } else {
                output.push_str("No boundary violations found\n");
            }
        } else {
            if self.options.use_colors {
                let color = if report.has_errors() { "31" } else { "33" };
                output.push_str(&format!("\x1b[{color}mBoundary violations found\x1b[0m\n\n"));
            } else {
                output.push_str("Boundary violations found\n\n");
            }

            let mut by_file: std::collections::BTreeMap<&std::path::Path, Vec<&Violation>> =
                std::collections::BTreeMap::new();
            for violation in violations {
                by_file.entry(&violation.file).or_default().push(violation);
            }

            for (file, file_violations) in by_file {
                output.push_str(&format!("{}\n", file.display()));

                for violation in file_violations {
                    let position = match (violation.line, violation.column) {
                        (Some(line), Some(col)) => format!("{line}:{col}"),
                        (Some(line), None) => line.to_string(),
                        _ => "-".to_string(),
                    };

                    if self.options.use_colors {
                        let severity_color = match violation.severity {
                            Severity::Error => "31",
                            Severity::Warning => "33",
                            Severity::Info => "36",
                        };
                        output.push_str(&format!(
                            "  \x1b[2m{}\x1b[0m [\x1b[{}m{}\x1b[0m] {}: {}\n",
                            position,
                            severity_color,
                            violation.severity.as_str(),
                            violation.rule_id,
                            violation.message
                        ));
                    } else {
                        output.push_str(&format!(
                            "  {} [{}] {}: {}\n",
                            position,
                            violation.severity.as_str(),
                            violation.rule_id,
                            violation.message
                        ));
                    }

                    if self.options.show_related && !violation.related_modules.is_empty() {
                        let related = violation.related_modules.join(", ");
                        if self.options.use_colors {
                            output.push_str(&format!("    \x1b[2mmodules: {related}\x1b[0m\n"));
                        } else {
                            output.push_str(&format!("    modules: {related}\n"));
                        }
                    }
                }
                output.push('\n');
            }
        }

        if !report.degraded.is_empty() {
            if self.options.use_colors {
                output.push_str("\x1b[33mFiles analyzed with reduced confidence:\x1b[0m\n");
            } else {
                output.push_str("Files analyzed with reduced confidence:\n");
            }
            for degraded in &report.degraded {
                output.push_str(&format!("  {} ({})\n", degraded.file.display(), degraded.reason));
            }
            output.push('\n');
        }

        output.push_str(&self.format_summary(report));
        Ok(output)
    }

    /// JSON payload mirrors the text format field for field
    fn format_json(
        &self,
        report: &AnalysisReport,
        violations: &[&Violation],
    ) -> BoundaryResult<String> {
        let json_violations: Vec<JsonValue> = violations
            .iter()
            .map(|v| {
                serde_json::json!({
                    "file": v.file.display().to_string(),
                    "line": v.line,
                    "column": v.column,
                    "ruleId": v.rule_id,
                    "severity": v.severity.as_str(),
                    "message": v.message,
                    "relatedModules": v.related_modules,
                })
            })
            .collect();

        let json_degraded: Vec<JsonValue> = report
            .degraded
            .iter()
            .map(|d| {
                serde_json::json!({
                    "file": d.file.display().to_string(),
                    "reason": d.reason,
                })
            })
            .collect();

        let json_report = serde_json::json!({
            "violations": json_violations,
            "degraded": json_degraded,
            "summary": {
                "errorCount": report.summary.violations_by_severity.error,
                "warningCount": report.summary.violations_by_severity.warning,
                "infoCount": report.summary.violations_by_severity.info,
                "moduleCount": report.summary.module_count,
                "edgeCount": report.summary.edge_count,
                "degradedCount": report.summary.degraded_count,
                "executionTimeMs": report.summary.execution_time_ms,
                "analyzedAt": report.summary.analyzed_at.to_rfc3339(),
            },
            "configFingerprint": report.config_fingerprint,
        });

        serde_json::to_string_pretty(&json_report).map_err(|e| {
            crate::domain::violations::BoundaryError::internal(format!(
                "JSON serialization failed: {e}"
            ))
        })
    }

    fn format_summary(&self, report: &AnalysisReport) -> String {
        let counts = &report.summary.violations_by_severity;
        let execution_time = (report.summary.execution_time_ms as f64) / 1000.0;

        let mut summary = String::new();
        if self.options.use_colors {
            summary.push_str("\x1b[1mSummary:\x1b[0m ");
        } else {
            summary.push_str("Summary: ");
        }

        if counts.total() == 0 {
            let text = format!(
                "0 violations across {} modules ({:.1}s)\n",
                report.summary.module_count, execution_time
            );
            if self.options.use_colors {
                summary.push_str(&format!("\x1b[32m{text}\x1b[0m"));
            } else {
                summary.push_str(&text);
            }
            return summary;
        }

        let mut parts = Vec::new();
        if counts.error > 0 {
            let text = format!("{} error{}", counts.error, plural(counts.error));
            parts.push(self.colorize(text, "31"));
        }
        if counts.warning > 0 {
            let text = format!("{} warning{}", counts.warning, plural(counts.warning));
            parts.push(self.colorize(text, "33"));
        }
        if counts.info > 0 {
            parts.push(self.colorize(format!("{} info", counts.info), "36"));
        }

        summary.push_str(&format!(
            "{} across {} modules ({:.1}s)\n",
            parts.join(", "),
            report.summary.module_count,
            execution_time
        ));
        summary
    }

    fn colorize(&self, text: String, color: &str) -> String {
        if self.options.use_colors {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text
        }
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(ReportOptions::default())
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::violations::{rules, DegradedFile};
    use std::path::PathBuf;

    fn test_report() -> AnalysisReport {
        let mut report = AnalysisReport::new();
        report.add_violation(
            Violation::new(
                rules::LAYER_BOUNDARY,
                Severity::Error,
                PathBuf::from("ui/Modal.ts"),
                "Module 'ui/Modal' (ui) may not import 'infra/logging' (infra)",
            )
            .with_position(3, 1)
            .with_related(vec!["ui/Modal".to_string(), "infra/logging".to_string()]),
        );
        report.add_violation(
            Violation::new(
                rules::UNTAGGED_MODULE,
                Severity::Warning,
                PathBuf::from("misc/orphan.ts"),
                "Module 'misc/orphan' matched no configured layer rule",
            )
            .with_related(vec!["misc/orphan".to_string()]),
        );
        report.add_degraded(DegradedFile {
            file: PathBuf::from("ui/broken.ts"),
            reason: "file contains binary data".to_string(),
        });
        report.set_graph_stats(12, 30);
        report.set_execution_time(150);
        report.sort();
        report
    }

    fn plain_formatter() -> ReportFormatter {
        ReportFormatter::new(ReportOptions { use_colors: false, ..Default::default() })
    }

    #[test]
    fn test_text_format() {
        let output = plain_formatter().format_report(&test_report(), OutputFormat::Text).unwrap();

        assert!(output.contains("Boundary violations found"));
        assert!(output.contains("ui/Modal.ts"));
        assert!(output.contains("3:1 [error] layer-boundary:"));
        assert!(output.contains("modules: ui/Modal, infra/logging"));
        assert!(output.contains("reduced confidence"));
        assert!(output.contains("ui/broken.ts (file contains binary data)"));
        assert!(output.contains("1 error, 1 warning across 12 modules"));
    }

    #[test]
    fn test_json_format_carries_the_same_information() {
        let output = plain_formatter().format_report(&test_report(), OutputFormat::Json).unwrap();
        let json: JsonValue = serde_json::from_str(&output).unwrap();

        let violations = json["violations"].as_array().unwrap();
        assert_eq!(violations.len(), 2);
        // Sorted by file: misc/orphan.ts before ui/Modal.ts
        assert_eq!(violations[0]["ruleId"], "untagged-module");
        assert_eq!(violations[1]["ruleId"], "layer-boundary");
        assert_eq!(violations[1]["line"], 3);
        assert_eq!(violations[1]["relatedModules"][0], "ui/Modal");

        assert_eq!(json["summary"]["errorCount"], 1);
        assert_eq!(json["summary"]["warningCount"], 1);
        assert_eq!(json["summary"]["moduleCount"], 12);
        assert_eq!(json["degraded"][0]["file"], "ui/broken.ts");
    }

    #[test]
    fn test_empty_report() {
        let report = AnalysisReport::new();
        let output = plain_formatter().format_report(&report, OutputFormat::Text).unwrap();
        assert!(output.contains("No boundary violations found"));
        assert!(output.contains("0 violations"));
    }

    #[test]
    fn test_severity_filtering() {
        let formatter = ReportFormatter::new(ReportOptions {
            use_colors: false,
            min_severity: Some(Severity::Error),
            ..Default::default()
        });

        let output = formatter.format_report(&test_report(), OutputFormat::Json).unwrap();
        let json: JsonValue = serde_json::from_str(&output).unwrap();
        assert_eq!(json["violations"].as_array().unwrap().len(), 1);
        assert_eq!(json["violations"][0]["ruleId"], "layer-boundary");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::parse("text"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("sarif"), None);
    }
}
