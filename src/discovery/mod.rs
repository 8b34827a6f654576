//! Module discovery and layer tagging
//!
//! Architecture: Domain Services - discovery turns a directory tree into tagged modules
//! - Walks the workspace through the path filter and canonicalizes module ids
//! - Classifies every module against the configured layer rules
//! - Unmatched modules become Untagged warnings; contradictory rules abort the run

pub mod path_filter;

use crate::config::{BoundaryConfig, LayerRule};
use crate::domain::model::{LayerTag, Module, ModuleId};
use crate::domain::violations::{rules, BoundaryError, BoundaryResult, Severity, Violation};
use glob::MatchOptions;
use path_filter::PathFilter;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Result of a discovery pass: tagged modules plus discovery-stage warnings
#[derive(Debug, Default)]
pub struct DiscoveredModules {
    /// All modules by canonical id
    pub modules: BTreeMap<ModuleId, Module>,
    /// Untagged-module warnings
    pub warnings: Vec<Violation>,
}

/// Classifies workspace module paths into tagged Module records
pub struct ModuleDiscovery {
    filter: PathFilter,
    rules: Vec<CompiledRule>,
}

struct CompiledRule {
    pattern: glob::Pattern,
    rule: LayerRule,
}

/// Layer patterns treat `*` as a single path segment and `**` as any depth
fn layer_match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

impl ModuleDiscovery {
    /// Compile the configured layer rules and path filter
    pub fn new(config: &BoundaryConfig) -> BoundaryResult<Self> {
        let ignore_file = match config.paths.ignore_file.as_deref() {
            Some("") | None => None,
            Some(name) => Some(name.to_string()),
        };

        let filter = PathFilter::new(
            config.paths.patterns.clone(),
            config.paths.extensions.clone(),
            ignore_file,
        )?;

        let rules = config
            .layers
            .iter()
            .map(|rule| {
                let pattern = glob::Pattern::new(&rule.pattern).map_err(|e| {
                    BoundaryError::config(format!(
                        "Invalid layer pattern '{}': {}",
                        rule.pattern, e
                    ))
                })?;
                Ok(CompiledRule { pattern, rule: rule.clone() })
            })
            .collect::<BoundaryResult<Vec<_>>>()?;

        Ok(Self { filter, rules })
    }

    /// Discover and tag every module under the workspace root
    pub fn discover(&self, workspace_root: &Path) -> BoundaryResult<DiscoveredModules> {
        let files = self.filter.find_module_files(workspace_root)?;
        let mut discovered = DiscoveredModules::default();

        for relative in &files {
            let id = canonical_module_id(relative);
            let module = self.classify(&id, relative.clone())?;

            if module.tag == LayerTag::Untagged {
                discovered.warnings.push(
                    Violation::new(
                        rules::UNTAGGED_MODULE,
                        Severity::Warning,
                        relative.clone(),
                        format!("Module '{id}' matched no configured layer rule"),
                    )
                    .with_related([id.clone()]),
                );
            }

            discovered.modules.insert(id, module);
        }

        self.assign_package_roots(&mut discovered.modules);
        Ok(discovered)
    }

    /// Tag a single module path; fatal when configured rules contradict each
    /// other for this path
    pub fn classify(&self, id: &str, file_path: PathBuf) -> BoundaryResult<Module> {
        let options = layer_match_options();
        let matching: Vec<&CompiledRule> = self
            .rules
            .iter()
            .filter(|compiled| compiled.pattern.matches_with(id, options))
            .collect();

        let Some(first) = matching.first() else {
            return Ok(Module::new(id, LayerTag::Untagged, file_path));
        };

        let (scope, package_dir) = derive_scope(&first.rule, id);
        for other in &matching[1..] {
            let (other_scope, _) = derive_scope(&other.rule, id);
            if other.rule.tag != first.rule.tag || other_scope != scope {
                return Err(BoundaryError::config(format!(
                    "Contradictory layer rules for module '{}': '{}' ({}) vs '{}' ({})",
                    id,
                    first.rule.pattern,
                    first.rule.tag,
                    other.rule.pattern,
                    other.rule.tag,
                )));
            }
        }

        let mut module = Module::new(id, first.rule.tag, file_path);
        if let Some(scope) = scope {
            module = module.with_scope(scope);
        }
        if first.rule.tag.is_scoped() {
            if let Some(dir) = package_dir {
                // Provisional root; fixed up once all modules are known
                let root = format!("{dir}/{}", first.rule.root);
                module = module.with_package(dir, root);
            }
        }

        Ok(module)
    }

    /// Resolve provisional package roots against the discovered module set.
    /// A package whose `<dir>/<root>` module does not exist falls back to the
    /// single-file module at the package directory itself; with neither
    /// present the package has no enforceable root.
    fn assign_package_roots(&self, modules: &mut BTreeMap<ModuleId, Module>) {
        let ids: std::collections::BTreeSet<ModuleId> = modules.keys().cloned().collect();

        for module in modules.values_mut() {
            let (Some(dir), Some(root)) = (&module.package_dir, &module.package_root) else {
                continue;
            };
            if ids.contains(root) {
                continue;
            }
            if ids.contains(dir) {
                module.package_root = Some(dir.clone());
            } else {
                module.package_root = None;
            }
        }
    }
}

/// Canonical module id: workspace-relative path, forward slashes, no extension
pub fn canonical_module_id(relative: &Path) -> ModuleId {
    let mut path = relative.to_string_lossy().replace('\\', "/");
    if let Some(dot) = path.rfind('.') {
        if !path[dot..].contains('/') {
            path.truncate(dot);
        }
    }
    path
}

/// Derive (scope, package_dir) for a module matched by a rule.
///
/// Scoped tags take the first path segment after the rule's static prefix as
/// the scope (`features/Checkout/ui/Cart` under `features/**` -> `Checkout`);
/// other tags use the rule's explicit scope or the static prefix itself.
fn derive_scope(rule: &LayerRule, id: &str) -> (Option<String>, Option<String>) {
    if let Some(explicit) = &rule.scope {
        let package_dir = rule
            .tag
            .is_scoped()
            .then(|| scoped_package_dir(rule, id))
            .flatten();
        return (Some(explicit.clone()), package_dir);
    }

    if rule.tag.is_scoped() {
        let prefix = rule.static_prefix();
        let rest = id.strip_prefix(prefix).unwrap_or(id).trim_start_matches('/');
        let segment = rest.split('/').next().filter(|s| !s.is_empty());
        match segment {
            Some(scope) => {
                let dir = if prefix.is_empty() {
                    scope.to_string()
                } else {
                    format!("{prefix}/{scope}")
                };
                (Some(scope.to_string()), Some(dir))
            }
            None => (None, None),
        }
    } else {
        let prefix = rule.static_prefix();
        let scope = if prefix.is_empty() { None } else { Some(prefix.to_string()) };
        (scope, None)
    }
}

fn scoped_package_dir(rule: &LayerRule, id: &str) -> Option<String> {
    let prefix = rule.static_prefix();
    let rest = id.strip_prefix(prefix)?.trim_start_matches('/');
    let segment = rest.split('/').next().filter(|s| !s.is_empty())?;
    Some(if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}/{segment}")
    })
}
