//! Boundary Guardian CLI - command-line interface for module-boundary enforcement
//!
//! Architecture: Application Layer - the CLI coordinates user interactions with domain services
//! - Translates user commands to domain operations
//! - Handles external concerns like file I/O, process exit codes, and terminal output
//! - Exit codes: 0 clean, 1 violations, 2 configuration or internal failure

use boundary_guardian::{
    domain::violations::rules, BoundaryChecker, BoundaryConfig, BoundaryResult, CheckOptions,
    ImportCache, OutputFormat, ReportFormatter, ReportOptions, Severity,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;

/// Boundary Guardian - static module-boundary enforcement
#[derive(Parser)]
#[command(name = "boundary-guardian")]
#[command(version = "0.1.0")]
#[command(about = "Static enforcement of layer boundaries in frontend workspaces")]
#[command(
    long_about = "Boundary Guardian builds the import graph of a layered workspace and checks every edge against the configured layer policy: allowed transitions, package encapsulation, scope isolation and dependency cycles."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a workspace for boundary violations
    Check {
        /// Workspace root to analyze (defaults to current directory)
        workspace: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormatArg,

        /// Minimum severity level to report
        #[arg(short, long, value_enum)]
        severity: Option<SeverityArg>,

        /// Treat warnings as failures
        #[arg(long)]
        fail_on_warning: bool,

        /// Evaluate third-party imports against the policy
        #[arg(long)]
        check_external: bool,

        /// Additional exclude patterns
        #[arg(long, action = clap::ArgAction::Append)]
        exclude: Vec<String>,

        /// Disable parallel extraction
        #[arg(long)]
        no_parallel: bool,

        /// Enable extraction caching for faster repeat runs
        #[arg(long)]
        cache: bool,

        /// Custom cache file path
        #[arg(long)]
        cache_file: Option<PathBuf>,
    },

    /// Validate a configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },

    /// Explain what a specific rule checks
    Explain {
        /// Rule ID to explain
        rule_id: String,
    },

    /// List the rules the engine enforces
    Rules,

    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show cache statistics
    Stats {
        /// Cache file path
        #[arg(long)]
        cache_file: Option<PathBuf>,
    },

    /// Clear the cache
    Clear {
        /// Cache file path
        #[arg(long)]
        cache_file: Option<PathBuf>,
    },

    /// Remove entries for files that no longer exist
    Cleanup {
        /// Cache file path
        #[arg(long)]
        cache_file: Option<PathBuf>,

        /// Workspace root the entries are relative to
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Text,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Text => OutputFormat::Text,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum SeverityArg {
    Info,
    Warning,
    Error,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run_command(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e}");
            // A propagated error means the analysis itself broke, not that
            // the code violates policy
            process::exit(2);
        }
    }
}

async fn run_command(cli: Cli) -> BoundaryResult<i32> {
    match cli.command {
        Commands::Check {
            workspace,
            format,
            severity,
            fail_on_warning,
            check_external,
            exclude,
            no_parallel,
            cache,
            cache_file,
        } => {
            run_check(
                cli.config,
                workspace,
                format,
                severity,
                fail_on_warning,
                check_external,
                exclude,
                no_parallel,
                cache,
                cache_file,
                !cli.no_color,
            )
            .await
        }
        Commands::ValidateConfig { config_file } => run_validate_config(config_file.or(cli.config)),
        Commands::Explain { rule_id } => run_explain(&rule_id),
        Commands::Rules => run_list_rules(),
        Commands::Cache { action } => run_cache_command(action),
    }
}

/// Locate and load the configuration: explicit flag, conventional file names,
/// or the built-in defaults
fn load_config(config_path: Option<PathBuf>, workspace: &Path) -> BoundaryResult<BoundaryConfig> {
    if let Some(path) = config_path {
        return BoundaryConfig::load_from_file(path);
    }

    for name in ["boundary.yaml", "boundary.yml", ".boundary.yaml"] {
        let candidate = workspace.join(name);
        if candidate.exists() {
            return BoundaryConfig::load_from_file(candidate);
        }
    }

    Ok(BoundaryConfig::default())
}

#[allow(clippy::too_many_arguments)]
async fn run_check(
    config_path: Option<PathBuf>,
    workspace: Option<PathBuf>,
    format: OutputFormatArg,
    severity: Option<SeverityArg>,
    fail_on_warning: bool,
    check_external: bool,
    exclude_patterns: Vec<String>,
    no_parallel: bool,
    use_cache: bool,
    cache_file: Option<PathBuf>,
    use_colors: bool,
) -> BoundaryResult<i32> {
    let workspace = workspace.unwrap_or_else(|| PathBuf::from("."));

    let mut config = load_config(config_path, &workspace)?;
    config.paths.patterns.extend(exclude_patterns);
    config.validate()?;

    let formatter = ReportFormatter::new(ReportOptions {
        use_colors,
        min_severity: severity.map(|s| s.into()),
        ..Default::default()
    });

    let mut checker =
        BoundaryChecker::new_with_config(config)?.with_report_formatter(formatter);
    if use_cache {
        let cache_path =
            cache_file.unwrap_or_else(|| boundary_guardian::default_cache_path(&workspace));
        checker = checker.with_cache(cache_path)?;
    }

    let options = CheckOptions {
        parallel: !no_parallel,
        check_external: check_external.then_some(true),
    };
    let report = checker.check_with_options(&workspace, &options).await?;

    let formatted = checker.format_report(&report, format.into())?;
    println!("{formatted}");

    if use_cache && format == OutputFormatArg::Text {
        if let Some(stats) = checker.cache_statistics() {
            eprintln!("{}", stats.format_display());
        }
    }

    Ok(report.exit_code(fail_on_warning))
}

fn run_validate_config(config_path: Option<PathBuf>) -> BoundaryResult<i32> {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from("boundary.yaml"));

    println!("Validating configuration: {}", config_path.display());

    match BoundaryConfig::load_from_file(&config_path) {
        Ok(config) => {
            println!("Configuration is valid");
            println!("  Layer rules: {}", config.layers.len());
            println!(
                "  Transition table entries: {}",
                config.policy.allowed.values().map(|t| t.len()).sum::<usize>()
            );
            println!("  Cross-scope whitelist entries: {}", config.policy.cross_scope_allow.len());
            println!("  Path patterns: {}", config.paths.patterns.len());
            println!("  Resolver aliases: {}", config.resolver.aliases.len());
            Ok(0)
        }
        Err(e) => {
            eprintln!("Configuration validation failed: {e}");
            Ok(1)
        }
    }
}

/// Rule ids with a short description of what each one checks
fn rule_catalog() -> &'static [(&'static str, &'static str, &'static str)] {
    &[
        (
            rules::LAYER_BOUNDARY,
            "error",
            "An import edge between two differently tagged modules is absent from the allowed-transition table.",
        ),
        (
            rules::ENCAPSULATION,
            "error",
            "A module outside a feature or entity package reaches a package-internal module without going through the declared package root.",
        ),
        (
            rules::CROSS_SCOPE,
            "error",
            "A same-tag import crosses scope boundaries without an entry in the cross-scope whitelist.",
        ),
        (
            rules::CYCLE,
            "error",
            "A set of workspace modules forms an import cycle (including a module importing itself).",
        ),
        (
            rules::UNTAGGED_MODULE,
            "warning",
            "A discovered module matched none of the configured layer rules.",
        ),
        (
            rules::UNRESOLVED_IMPORT,
            "warning",
            "An import specifier resolves to neither a workspace module nor a third-party package.",
        ),
        (
            rules::REEXPORT_CYCLE,
            "warning",
            "A re-export chain revisits a module while flattening barrel attribution.",
        ),
        (
            rules::DYNAMIC_IMPORT,
            "warning",
            "A dynamic import target cannot be statically resolved; the edge is excluded from hard checks.",
        ),
        (
            rules::EXTERNAL_IMPORT,
            "error",
            "A third-party import originates from a tag the policy does not permit to reach externals (only with external checking enabled).",
        ),
    ]
}

fn run_explain(rule_id: &str) -> BoundaryResult<i32> {
    for (id, severity, description) in rule_catalog() {
        if *id == rule_id {
            println!("Rule: {id}");
            println!("Severity: {severity}");
            println!();
            println!("{description}");
            return Ok(0);
        }
    }

    eprintln!("Rule '{rule_id}' not found");
    println!();
    println!("Available rules:");
    for (id, _, _) in rule_catalog() {
        println!("  - {id}");
    }
    Ok(1)
}

fn run_list_rules() -> BoundaryResult<i32> {
    println!("Enforced rules\n");
    for (id, severity, description) in rule_catalog() {
        println!("  {id} [{severity}]");
        println!("    {description}");
    }
    Ok(0)
}

fn run_cache_command(action: CacheCommands) -> BoundaryResult<i32> {
    let default_path = || boundary_guardian::default_cache_path(Path::new("."));

    match action {
        CacheCommands::Stats { cache_file } => {
            let cache_path = cache_file.unwrap_or_else(default_path);
            if !cache_path.exists() {
                println!("No cache file found at {}", cache_path.display());
                return Ok(1);
            }

            let mut cache = ImportCache::new(&cache_path);
            cache.load()?;

            let stats = cache.statistics();
            println!("Cache statistics");
            println!("  File: {}", cache_path.display());
            println!("  {}", stats.format_display());
            println!("  Created: {}", format_timestamp(stats.created_at));
            println!("  Updated: {}", format_timestamp(stats.updated_at));
            Ok(0)
        }
        CacheCommands::Clear { cache_file } => {
            let cache_path = cache_file.unwrap_or_else(default_path);
            let mut cache = ImportCache::new(&cache_path);
            cache.load()?;
            cache.clear()?;

            println!("Cache cleared: {}", cache_path.display());
            Ok(0)
        }
        CacheCommands::Cleanup { cache_file, workspace } => {
            let cache_path = cache_file.unwrap_or_else(default_path);
            if !cache_path.exists() {
                println!("No cache file found at {}", cache_path.display());
                return Ok(1);
            }

            let workspace = workspace.unwrap_or_else(|| PathBuf::from("."));
            let mut cache = ImportCache::new(&cache_path);
            cache.load()?;
            let removed = cache.cleanup(&workspace)?;
            cache.save()?;

            println!("Removed {removed} stale cache entries");
            Ok(0)
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };

    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();
}

fn format_timestamp(timestamp: u64) -> String {
    use chrono::{TimeZone, Utc};

    let dt = Utc.timestamp_opt(timestamp as i64, 0).single().unwrap_or_else(Utc::now);
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_check_command_reports_violations() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("ui")).unwrap();
        fs::create_dir_all(root.join("infra")).unwrap();
        fs::write(root.join("infra/logging.ts"), "export const log = () => {};\n").unwrap();
        fs::write(
            root.join("ui/Modal.ts"),
            "import { log } from '../infra/logging';\nexport const Modal = 1;\n",
        )
        .unwrap();

        let code = run_check(
            None,
            Some(root.to_path_buf()),
            OutputFormatArg::Json,
            None,
            false,
            false,
            vec![],
            false,
            false,
            None,
            false,
        )
        .await
        .unwrap();
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_check_command_clean_workspace() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("util")).unwrap();
        fs::write(root.join("util/a.ts"), "export const a = 1;\n").unwrap();

        let code = run_check(
            None,
            Some(root.to_path_buf()),
            OutputFormatArg::Text,
            None,
            false,
            false,
            vec![],
            false,
            false,
            None,
            false,
        )
        .await
        .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn test_validate_config() {
        let temp = TempDir::new().unwrap();
        let config_file = temp.path().join("boundary.yaml");

        let yaml = serde_yaml::to_string(&BoundaryConfig::default()).unwrap();
        fs::write(&config_file, yaml).unwrap();

        assert_eq!(run_validate_config(Some(config_file)).unwrap(), 0);
        assert_eq!(
            run_validate_config(Some(temp.path().join("missing.yaml"))).unwrap(),
            1
        );
    }

    #[test]
    fn test_explain_rule() {
        assert_eq!(run_explain("layer-boundary").unwrap(), 0);
        assert_eq!(run_explain("cycle").unwrap(), 0);
        assert_eq!(run_explain("nonexistent-rule").unwrap(), 1);
    }

    #[test]
    fn test_list_rules() {
        assert_eq!(run_list_rules().unwrap(), 0);
    }
}
