//! Boundary Guardian - static module-boundary enforcement for layered workspaces
//!
//! Architecture: Clean Architecture - the library interface is the application layer
//! - Discovery, graph construction, policy and cycle detection compose a pipeline
//! - Pure domain logic stays separate from parsing, caching and reporting
//! - The CI integration API wraps the pipeline in pass/fail workflows

pub mod cache;
pub mod config;
pub mod cycles;
pub mod discovery;
pub mod domain;
pub mod graph;
pub mod parser;
pub mod policy;
pub mod report;

// Re-export main types for convenient access
pub use domain::model::{EdgeKind, ImportEdge, LayerTag, Module, ModuleGraph, ModuleId};
pub use domain::violations::{
    AnalysisReport, AnalysisSummary, BoundaryError, BoundaryResult, DegradedFile, Severity,
    Violation,
};

pub use config::{BoundaryConfig, ConfigBuilder, DynamicImportMode, LayerRule, PolicyConfig};

pub use cache::{CacheStatistics, ImportCache};
pub use cycles::CycleDetector;
pub use discovery::ModuleDiscovery;
pub use graph::{GraphBuilder, ModuleResolver, Resolution, WorkspaceResolver};
pub use parser::{EsModuleParser, ImportParser};
pub use policy::PolicyEngine;
pub use report::{OutputFormat, ReportFormatter, ReportOptions};

use graph::SourceCache;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Options controlling one analysis run
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Whether per-file extraction runs on the thread pool
    pub parallel: bool,
    /// Override the configured external-import checking for this run
    pub check_external: Option<bool>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self { parallel: true, check_external: None }
    }
}

/// High-level checker wiring the full pipeline together
pub struct BoundaryChecker {
    config: BoundaryConfig,
    parser: EsModuleParser,
    cache: Option<ImportCache>,
    formatter: ReportFormatter,
}

impl BoundaryChecker {
    /// Create a checker with the given configuration
    pub fn new_with_config(config: BoundaryConfig) -> BoundaryResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            parser: EsModuleParser::new(),
            cache: None,
            formatter: ReportFormatter::default(),
        })
    }

    /// Create a checker with the default configuration
    pub fn new() -> BoundaryResult<Self> {
        Self::new_with_config(BoundaryConfig::default())
    }

    /// Create a checker loading configuration from a YAML file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> BoundaryResult<Self> {
        let config = BoundaryConfig::load_from_file(path)?;
        Self::new_with_config(config)
    }

    /// Enable caching with the specified cache file
    pub fn with_cache<P: AsRef<Path>>(mut self, cache_path: P) -> BoundaryResult<Self> {
        let mut cache = ImportCache::new(cache_path);
        cache.load()?;
        cache.set_config_fingerprint(&self.config.fingerprint());
        self.cache = Some(cache);
        Ok(self)
    }

    /// Set a custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn config(&self) -> &BoundaryConfig {
        &self.config
    }

    /// Check a workspace with default options
    pub async fn check<P: AsRef<Path>>(&mut self, workspace_root: P) -> BoundaryResult<AnalysisReport> {
        self.check_with_options(workspace_root, &CheckOptions::default()).await
    }

    /// Check a workspace with custom options
    pub async fn check_with_options<P: AsRef<Path>>(
        &mut self,
        workspace_root: P,
        options: &CheckOptions,
    ) -> BoundaryResult<AnalysisReport> {
        let report = self.run_check(workspace_root.as_ref(), options)?;
        if let Some(cache) = &mut self.cache {
            cache.save()?;
        }
        Ok(report)
    }

    /// The synchronous pipeline: discover, build, evaluate, detect, aggregate
    fn run_check(&mut self, root: &Path, options: &CheckOptions) -> BoundaryResult<AnalysisReport> {
        let start_time = std::time::Instant::now();
        tracing::info!("Checking workspace {}", root.display());

        let discovery = ModuleDiscovery::new(&self.config)?;
        let discovered = discovery.discover(root)?;
        tracing::debug!("Discovered {} modules", discovered.modules.len());

        let known: BTreeSet<ModuleId> = discovered.modules.keys().cloned().collect();
        let resolver = WorkspaceResolver::new(known, &self.config.resolver);
        let builder = GraphBuilder::new(
            &self.parser,
            &resolver,
            self.config.policy.dynamic_imports,
            options.parallel,
        );
        let outcome = builder.build(
            root,
            discovered.modules,
            self.cache.as_ref().map(|c| c as &dyn SourceCache),
        )?;

        if let Some(cache) = &mut self.cache {
            cache.apply_updates(outcome.cache_updates);
        }

        let mut policy = self.config.policy.clone();
        if let Some(check_external) = options.check_external {
            policy.check_external = check_external;
        }
        let engine = PolicyEngine::new(policy);

        let mut report = AnalysisReport::new();
        for warning in discovered.warnings {
            report.add_violation(warning);
        }
        for warning in outcome.warnings {
            report.add_violation(warning);
        }
        for violation in engine.evaluate(&outcome.graph) {
            report.add_violation(violation);
        }
        for violation in CycleDetector::detect(&outcome.graph) {
            report.add_violation(violation);
        }
        for degraded in outcome.degraded {
            report.add_degraded(degraded);
        }

        report.set_graph_stats(outcome.graph.module_count(), outcome.graph.edges().len());
        report.set_execution_time(start_time.elapsed().as_millis() as u64);
        report.set_config_fingerprint(self.config.fingerprint());
        report.sort();

        tracing::info!(
            "Check finished: {} errors, {} warnings",
            report.summary.violations_by_severity.error,
            report.summary.violations_by_severity.warning
        );
        Ok(report)
    }

    /// Format an analysis report for output
    pub fn format_report(
        &self,
        report: &AnalysisReport,
        format: OutputFormat,
    ) -> BoundaryResult<String> {
        self.formatter.format_report(report, format)
    }

    /// Get cache statistics (if caching is enabled)
    pub fn cache_statistics(&self) -> Option<CacheStatistics> {
        self.cache.as_ref().map(|c| c.statistics())
    }

    /// Clear the cache (if enabled)
    pub fn clear_cache(&mut self) -> BoundaryResult<()> {
        if let Some(cache) = &mut self.cache {
            cache.clear()?;
        }
        Ok(())
    }

    /// Remove cache entries whose files disappeared from the workspace
    pub fn cleanup_cache(&mut self, workspace_root: &Path) -> BoundaryResult<Option<usize>> {
        match &mut self.cache {
            Some(cache) => Ok(Some(cache.cleanup(workspace_root)?)),
            None => Ok(None),
        }
    }

    /// Save the cache to disk (if enabled and modified)
    pub fn save_cache(&mut self) -> BoundaryResult<()> {
        if let Some(cache) = &mut self.cache {
            cache.save()?;
        }
        Ok(())
    }
}

/// Convenience function to check a workspace with default settings
pub async fn check_workspace<P: AsRef<Path>>(workspace_root: P) -> BoundaryResult<AnalysisReport> {
    let mut checker = BoundaryChecker::new()?;
    checker.check(workspace_root).await
}

/// Convenience function to check a workspace against a config file
pub async fn check_workspace_with_config<P: AsRef<Path>, C: AsRef<Path>>(
    workspace_root: P,
    config_path: C,
) -> BoundaryResult<AnalysisReport> {
    let mut checker = BoundaryChecker::from_config_file(config_path)?;
    checker.check(workspace_root).await
}

/// CI integration utilities
pub mod ci {
    use super::*;

    /// Pre-merge gate: succeeds only when the workspace has no blocking
    /// violations
    pub async fn pre_merge_check<P: AsRef<Path>>(workspace_root: P) -> BoundaryResult<()> {
        let mut checker = BoundaryChecker::new()?;
        let report = checker.check(workspace_root).await?;

        if report.has_errors() {
            let error_count = report.summary.violations_by_severity.error;
            return Err(BoundaryError::analysis(
                "workspace",
                format!(
                    "Pre-merge check failed: {} blocking violation{} found",
                    error_count,
                    if error_count == 1 { "" } else { "s" }
                ),
            ));
        }

        Ok(())
    }

    /// Strict gate for release branches; warnings count as failures
    pub async fn strict_check<P: AsRef<Path>>(
        workspace_root: P,
    ) -> BoundaryResult<AnalysisReport> {
        let mut checker = BoundaryChecker::new()?;
        let report = checker.check(workspace_root).await?;

        if report.exit_code(true) != 0 {
            return Err(BoundaryError::analysis(
                "workspace",
                format!(
                    "Strict check failed: {} violations found",
                    report.summary.violations_by_severity.total()
                ),
            ));
        }

        Ok(report)
    }
}

/// Default cache file location relative to the workspace root
pub fn default_cache_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".boundary").join("cache.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::violations::rules;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// A small layered workspace with exactly one boundary breach: a shared
    /// UI component reaching into infra
    fn layered_workspace() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        write(root, "infra/logging.ts", "export const log = (msg: string) => {};\n");
        write(
            root,
            "util/formatDate.ts",
            "export const formatDate = (d: Date) => d.toISOString();\n",
        );
        write(
            root,
            "ui/Modal.ts",
            "import { formatDate } from '../util/formatDate';\n\
             import { log } from '../infra/logging';\n\
             export class Modal {}\n",
        );
        write(root, "entities/product/model.ts", "export class Product {}\n");
        write(root, "entities/product/index.ts", "export { Product } from './model';\n");
        write(
            root,
            "features/ProductList/index.ts",
            "import { Product } from '../../entities/product';\n\
             import { Modal } from '../../ui/Modal';\n\
             import { formatDate } from '../../util/formatDate';\n\
             export const ProductList = () => {};\n",
        );

        temp
    }

    #[tokio::test]
    async fn test_layered_workspace_flags_only_the_breach() {
        let temp = layered_workspace();
        let report = check_workspace(temp.path()).await.unwrap();

        let errors: Vec<_> = report.violations_by_severity(Severity::Error).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule_id, rules::LAYER_BOUNDARY);
        assert_eq!(errors[0].related_modules, vec!["ui/Modal", "infra/logging"]);
        assert_eq!(errors[0].file, PathBuf::from("ui/Modal.ts"));
        assert_eq!(errors[0].line, Some(2));

        assert_eq!(report.summary.module_count, 6);
        assert_eq!(report.exit_code(false), 1);
    }

    #[tokio::test]
    async fn test_clean_workspace_passes() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "util/a.ts", "export const a = 1;\n");
        write(root, "ui/B.ts", "import { a } from '../util/a';\nexport const B = 2;\n");

        let report = check_workspace(root).await.unwrap();
        assert!(!report.has_violations());
        assert_eq!(report.exit_code(false), 0);
        assert_eq!(report.exit_code(true), 0);
    }

    #[tokio::test]
    async fn test_deep_import_via_facade() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "entities/order/model.ts", "export class Order {}\n");
        write(root, "entities/order/index.ts", "export { Order } from './model';\n");
        write(
            root,
            "features/Checkout/index.ts",
            "import { Order } from '../../entities/order/model';\n",
        );

        let report = check_workspace(root).await.unwrap();
        let errors: Vec<_> = report.violations_by_severity(Severity::Error).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule_id, rules::ENCAPSULATION);
    }

    #[tokio::test]
    async fn test_cycle_detection_via_facade() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "util/a.ts", "import { b } from './b';\nexport const a = 1;\n");
        write(root, "util/b.ts", "import { a } from './a';\nexport const b = 2;\n");

        let report = check_workspace(root).await.unwrap();
        let cycles: Vec<_> =
            report.violations.iter().filter(|v| v.rule_id == rules::CYCLE).collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].related_modules, vec!["util/a", "util/b"]);
    }

    #[tokio::test]
    async fn test_untagged_module_warns_but_passes() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "scripts/build.ts", "export const build = 1;\n");

        let report = check_workspace(root).await.unwrap();
        assert!(report.has_warnings());
        assert!(!report.has_errors());
        assert_eq!(report.exit_code(false), 0);
        assert_eq!(report.exit_code(true), 1);
    }

    #[tokio::test]
    async fn test_cached_run_produces_identical_findings() {
        let temp = layered_workspace();
        let cache_path = temp.path().join(".boundary/cache.json");

        let first = {
            let mut checker =
                BoundaryChecker::new().unwrap().with_cache(&cache_path).unwrap();
            checker.check(temp.path()).await.unwrap()
        };

        let mut checker = BoundaryChecker::new().unwrap().with_cache(&cache_path).unwrap();
        let second = checker.check(temp.path()).await.unwrap();

        let key = |r: &AnalysisReport| -> Vec<(String, String)> {
            r.violations.iter().map(|v| (v.rule_id.clone(), v.message.clone())).collect()
        };
        assert_eq!(key(&first), key(&second));

        // Second run served every file from cache
        let stats = checker.cache_statistics().unwrap();
        assert!(stats.cache_hits >= 6);
    }

    #[tokio::test]
    async fn test_check_external_override() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "ui/Http.ts", "import axios from 'axios';\nexport const h = 1;\n");

        let config = ConfigBuilder::new().check_external([LayerTag::Infra]).build().unwrap();
        let mut checker = BoundaryChecker::new_with_config(config).unwrap();

        let flagged = checker.check(root).await.unwrap();
        assert!(flagged.violations.iter().any(|v| v.rule_id == rules::EXTERNAL_IMPORT));

        let options = CheckOptions { check_external: Some(false), ..Default::default() };
        let waved = checker.check_with_options(root, &options).await.unwrap();
        assert!(!waved.violations.iter().any(|v| v.rule_id == rules::EXTERNAL_IMPORT));
    }

    #[tokio::test]
    async fn test_pre_merge_check() {
        let clean = TempDir::new().unwrap();
        write(clean.path(), "util/a.ts", "export const a = 1;\n");
        assert!(ci::pre_merge_check(clean.path()).await.is_ok());

        let dirty = layered_workspace();
        assert!(ci::pre_merge_check(dirty.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_report_formatting_via_facade() {
        let temp = layered_workspace();
        let mut checker = BoundaryChecker::new()
            .unwrap()
            .with_report_formatter(ReportFormatter::new(ReportOptions {
                use_colors: false,
                ..Default::default()
            }));
        let report = checker.check(temp.path()).await.unwrap();

        let text = checker.format_report(&report, OutputFormat::Text).unwrap();
        assert!(text.contains("layer-boundary"));

        let json = checker.format_report(&report, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["summary"]["errorCount"], 1);
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let config = BoundaryConfig {
            version: "9.9".to_string(),
            ..BoundaryConfig::default()
        };
        let result = BoundaryChecker::new_with_config(config);
        assert!(matches!(result, Err(ref e) if e.is_fatal()));
    }
}
