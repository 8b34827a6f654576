//! Violations, analysis reports and the error taxonomy
//!
//! Architecture: Rich Domain Models - Violations are entities with behavior, not just data
//! - Violations classify themselves and carry their related module sets
//! - AnalysisReport acts as an aggregate root managing violations and degraded files
//! - The error taxonomy keeps "the analysis broke" visibly distinct from
//!   "the code violates policy"

use crate::domain::model::ModuleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Rule identifiers emitted by the engine
pub mod rules {
    /// Edge not present in the allowed layer-transition table
    pub const LAYER_BOUNDARY: &str = "layer-boundary";
    /// Edge into a scoped package bypassing its declared root module
    pub const ENCAPSULATION: &str = "encapsulation";
    /// Same-tag edge between different scopes without a whitelist entry
    pub const CROSS_SCOPE: &str = "cross-scope";
    /// Strongly connected component or self-loop in the import graph
    pub const CYCLE: &str = "cycle";
    /// Module matched no configured layer rule
    pub const UNTAGGED_MODULE: &str = "untagged-module";
    /// Import specifier could not be mapped to any module or package
    pub const UNRESOLVED_IMPORT: &str = "unresolved-import";
    /// Re-export chain revisited a module during flattening
    pub const REEXPORT_CYCLE: &str = "reexport-cycle";
    /// Computed import target; reduced-confidence edge
    pub const DYNAMIC_IMPORT: &str = "dynamic-import";
    /// Third-party import from a tag not permitted to reach externals
    pub const EXTERNAL_IMPORT: &str = "external-import";
}

/// Severity levels for boundary violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational findings (e.g. lenient-mode dynamic imports)
    Info,
    /// Findings that should be addressed but don't fail the run by default
    Warning,
    /// Policy breaches that fail CI
    Error,
}

impl Severity {
    /// Whether this severity level fails the run
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Error)
    }

    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A boundary violation detected during analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Identifier of the rule that produced this violation
    pub rule_id: String,
    /// Severity level
    pub severity: Severity,
    /// File where the violation was found
    pub file: PathBuf,
    /// Line number (1-indexed) of the offending declaration
    pub line: Option<u32>,
    /// Column number (1-indexed) of the offending declaration
    pub column: Option<u32>,
    /// Human-readable description
    pub message: String,
    /// Modules involved: edge endpoints, or the full member set for cycles
    pub related_modules: Vec<ModuleId>,
}

impl Violation {
    /// Create a new violation
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        file: PathBuf,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            file,
            line: None,
            column: None,
            message: message.into(),
            related_modules: Vec::new(),
        }
    }

    /// Set line and column position
    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Attach the involved module identifiers
    pub fn with_related(mut self, modules: impl IntoIterator<Item = ModuleId>) -> Self {
        self.related_modules = modules.into_iter().collect();
        self
    }

    /// Whether this violation fails the run
    pub fn is_blocking(&self) -> bool {
        self.severity.is_blocking()
    }
}

/// A file whose imports could not be extracted; the module is treated as
/// having zero outgoing edges and listed apart from policy violations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradedFile {
    /// File that failed extraction
    pub file: PathBuf,
    /// Why extraction failed
    pub reason: String,
}

/// Count of violations by severity level
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViolationCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl ViolationCounts {
    /// Total number of violations across all severities
    pub fn total(&self) -> usize {
        self.error + self.warning + self.info
    }

    /// Whether there are any blocking violations
    pub fn has_blocking(&self) -> bool {
        self.error > 0
    }

    /// Add a violation to the counts
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// Summary statistics for an analysis report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Number of workspace modules discovered
    pub module_count: usize,
    /// Number of import edges in the graph
    pub edge_count: usize,
    /// Violation counts by severity
    pub violations_by_severity: ViolationCounts,
    /// Number of files that could not be analyzed
    pub degraded_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u64,
    /// When the analysis was performed
    pub analyzed_at: DateTime<Utc>,
}

/// Complete analysis report: all violations, degraded files and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// All boundary violations found
    pub violations: Vec<Violation>,
    /// Files that could not be analyzed, listed apart from violations
    pub degraded: Vec<DegradedFile>,
    /// Summary statistics
    pub summary: AnalysisSummary,
    /// Fingerprint of the configuration used for this run
    pub config_fingerprint: Option<String>,
}

impl AnalysisReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            violations: Vec::new(),
            degraded: Vec::new(),
            summary: AnalysisSummary { analyzed_at: Utc::now(), ..Default::default() },
            config_fingerprint: None,
        }
    }

    /// Add a violation to the report
    pub fn add_violation(&mut self, violation: Violation) {
        self.summary.violations_by_severity.add(violation.severity);
        self.violations.push(violation);
    }

    /// Record a degraded file
    pub fn add_degraded(&mut self, degraded: DegradedFile) {
        self.degraded.push(degraded);
        self.summary.degraded_count = self.degraded.len();
    }

    /// Whether the report contains any violations
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Whether the report contains blocking (error) violations
    pub fn has_errors(&self) -> bool {
        self.summary.violations_by_severity.has_blocking()
    }

    /// Whether the report contains warnings
    pub fn has_warnings(&self) -> bool {
        self.summary.violations_by_severity.warning > 0
    }

    /// Get violations of a specific severity
    pub fn violations_by_severity(&self, severity: Severity) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.severity == severity)
    }

    /// Set graph statistics
    pub fn set_graph_stats(&mut self, module_count: usize, edge_count: usize) {
        self.summary.module_count = module_count;
        self.summary.edge_count = edge_count;
    }

    /// Set the execution time
    pub fn set_execution_time(&mut self, duration_ms: u64) {
        self.summary.execution_time_ms = duration_ms;
    }

    /// Set the configuration fingerprint
    pub fn set_config_fingerprint(&mut self, fingerprint: impl Into<String>) {
        self.config_fingerprint = Some(fingerprint.into());
    }

    /// Sort violations by (file, line, rule id) for reproducible output, and
    /// degraded files by path
    pub fn sort(&mut self) {
        self.violations.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then_with(|| a.line.unwrap_or(0).cmp(&b.line.unwrap_or(0)))
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });
        self.degraded.sort_by(|a, b| a.file.cmp(&b.file));
    }

    /// Process exit status derived from this report: 0 clean, 1 when a
    /// blocking violation exists (or any warning with `fail_on_warning`)
    pub fn exit_code(&self, fail_on_warning: bool) -> i32 {
        if self.has_errors() || (fail_on_warning && self.has_warnings()) {
            1
        } else {
            0
        }
    }
}

impl Default for AnalysisReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Error types that can occur during a boundary analysis run
#[derive(Debug, thiserror::Error)]
pub enum BoundaryError {
    /// Malformed or contradictory configuration; fatal, aborts before graph work
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// File could not be read or accessed
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A module's import syntax could not be extracted; non-fatal per module
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// Analysis failed for a specific file
    #[error("Analysis error in {file}: {message}")]
    Analysis { file: String, message: String },

    /// Graph invariant broken; fatal and distinct from policy findings
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Cache operation failed
    #[error("Cache error: {message}")]
    Cache { message: String },
}

impl BoundaryError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a parse error
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse { file: file.into(), message: message.into() }
    }

    /// Create an analysis error
    pub fn analysis(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Analysis { file: file.into(), message: message.into() }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Create a cache error
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache { message: message.into() }
    }

    /// Whether this error aborts the whole run rather than degrading one file
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Internal { .. })
    }
}

/// Result type for boundary operations
pub type BoundaryResult<T> = Result<T, BoundaryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_violation_creation() {
        let violation = Violation::new(
            rules::LAYER_BOUNDARY,
            Severity::Error,
            PathBuf::from("ui/Modal.ts"),
            "ui module may not import infra",
        )
        .with_position(3, 1)
        .with_related(vec!["ui/Modal".to_string(), "infra/logging".to_string()]);

        assert_eq!(violation.rule_id, "layer-boundary");
        assert_eq!(violation.file, Path::new("ui/Modal.ts"));
        assert_eq!(violation.line, Some(3));
        assert_eq!(violation.related_modules.len(), 2);
        assert!(violation.is_blocking());
    }

    #[test]
    fn test_report_counts_and_exit_codes() {
        let mut report = AnalysisReport::new();
        assert_eq!(report.exit_code(false), 0);

        report.add_violation(Violation::new(
            rules::UNTAGGED_MODULE,
            Severity::Warning,
            PathBuf::from("misc/thing.ts"),
            "module matched no layer rule",
        ));
        assert_eq!(report.exit_code(false), 0);
        assert_eq!(report.exit_code(true), 1);

        report.add_violation(Violation::new(
            rules::CYCLE,
            Severity::Error,
            PathBuf::from("entities/order/index.ts"),
            "dependency cycle",
        ));
        assert!(report.has_errors());
        assert_eq!(report.exit_code(false), 1);
        assert_eq!(report.summary.violations_by_severity.total(), 2);
    }

    #[test]
    fn test_degraded_files_listed_separately() {
        let mut report = AnalysisReport::new();
        report.add_degraded(DegradedFile {
            file: PathBuf::from("ui/broken.ts"),
            reason: "invalid UTF-8".to_string(),
        });

        assert!(!report.has_violations());
        assert_eq!(report.summary.degraded_count, 1);
        // Degraded files never fail the run by themselves
        assert_eq!(report.exit_code(false), 0);
    }

    #[test]
    fn test_sort_is_deterministic() {
        let mut report = AnalysisReport::new();
        report.add_violation(
            Violation::new(rules::CYCLE, Severity::Error, PathBuf::from("b.ts"), "m")
                .with_position(2, 1),
        );
        report.add_violation(
            Violation::new(rules::LAYER_BOUNDARY, Severity::Error, PathBuf::from("a.ts"), "m")
                .with_position(9, 1),
        );
        report.add_violation(
            Violation::new(rules::ENCAPSULATION, Severity::Error, PathBuf::from("b.ts"), "m")
                .with_position(2, 1),
        );

        report.sort();
        let order: Vec<_> = report
            .violations
            .iter()
            .map(|v| (v.file.display().to_string(), v.rule_id.clone()))
            .collect();
        assert_eq!(order[0].0, "a.ts");
        // Same file and line sorts by rule id
        assert_eq!(order[1].1, "cycle");
        assert_eq!(order[2].1, "encapsulation");
    }

    #[test]
    fn test_error_fatality() {
        assert!(BoundaryError::config("bad").is_fatal());
        assert!(BoundaryError::internal("dup id").is_fatal());
        assert!(!BoundaryError::parse("a.ts", "bad syntax").is_fatal());
        assert!(!BoundaryError::cache("stale").is_fatal());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert!(Severity::Error.is_blocking());
        assert!(!Severity::Warning.is_blocking());
    }
}
