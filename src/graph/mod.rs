//! Import graph construction
//!
//! Architecture: Domain Services - the builder turns tagged modules into a typed graph
//! - Specifier resolution sits behind `ModuleResolver` so workspace conventions
//!   (aliases, index files) are interchangeable strategies
//! - Per-file extraction and resolution run in parallel fragments; a
//!   single-threaded merge produces the final immutable graph
//! - Barrel chains are flattened with a depth-bounded, cycle-guarded traversal

use crate::config::{DynamicImportMode, ResolverConfig};
use crate::domain::model::{EdgeKind, ImportEdge, Module, ModuleGraph, ModuleId};
use crate::domain::violations::{
    rules, BoundaryError, BoundaryResult, DegradedFile, Severity, Violation,
};
use crate::parser::{ImportDeclKind, ImportParser, ModuleSource};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Re-export chains longer than this stop flattening
const MAX_REEXPORT_DEPTH: usize = 16;

/// Outcome of resolving one import specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Another workspace module
    Module(ModuleId),
    /// A third-party package (canonical package name)
    External(String),
    /// No known module or package; contributes no connectivity
    Unresolved,
}

/// Capability for mapping import specifiers to modules
pub trait ModuleResolver: Send + Sync {
    /// Resolve a specifier as written in `from_module`'s source
    fn resolve(&self, specifier: &str, from_module: &str) -> Resolution;
}

/// Default resolver: relative paths, configured alias prefixes,
/// workspace-absolute specifiers, `index` files, bare externals
pub struct WorkspaceResolver {
    known: BTreeSet<ModuleId>,
    aliases: BTreeMap<String, String>,
}

impl WorkspaceResolver {
    pub fn new(known: BTreeSet<ModuleId>, config: &ResolverConfig) -> Self {
        Self { known, aliases: config.aliases.clone() }
    }

    /// Try a workspace path as a module, falling back to its `index` file
    fn lookup(&self, path: &str) -> Option<ModuleId> {
        if self.known.contains(path) {
            return Some(path.to_string());
        }
        let index = format!("{path}/index");
        if self.known.contains(index.as_str()) {
            return Some(index);
        }
        None
    }
}

impl ModuleResolver for WorkspaceResolver {
    fn resolve(&self, specifier: &str, from_module: &str) -> Resolution {
        // Relative specifiers resolve against the importing module's directory
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = match from_module.rfind('/') {
                Some(pos) => &from_module[..pos],
                None => "",
            };
            return match normalize_path(base, specifier) {
                Some(path) => match self.lookup(&path) {
                    Some(id) => Resolution::Module(id),
                    None => Resolution::Unresolved,
                },
                // Escapes the workspace root
                None => Resolution::Unresolved,
            };
        }

        // Alias prefixes rewrite to workspace-relative paths; longest wins
        let alias = self
            .aliases
            .iter()
            .filter(|(prefix, _)| specifier.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        if let Some((prefix, target)) = alias {
            let rewritten = format!("{}{}", target, &specifier[prefix.len()..]);
            let rewritten = rewritten.trim_start_matches('/');
            return match self.lookup(rewritten) {
                Some(id) => Resolution::Module(id),
                None => Resolution::Unresolved,
            };
        }

        // Workspace-absolute convention: bare specifier naming a known module
        if let Some(id) = self.lookup(specifier.trim_end_matches('/')) {
            return Resolution::Module(id);
        }

        Resolution::External(external_package_name(specifier))
    }
}

/// Canonical third-party package name: `@org/pkg/sub` -> `@org/pkg`,
/// `lodash/get` -> `lodash`
fn external_package_name(specifier: &str) -> String {
    let mut segments = specifier.split('/');
    match segments.next() {
        Some(org) if org.starts_with('@') => match segments.next() {
            Some(pkg) => format!("{org}/{pkg}"),
            None => org.to_string(),
        },
        Some(pkg) => pkg.to_string(),
        None => specifier.to_string(),
    }
}

/// Join a relative specifier onto a base directory, resolving `.` and `..`.
/// Returns None when the path climbs above the workspace root.
fn normalize_path(base: &str, specifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = if base.is_empty() {
        Vec::new()
    } else {
        base.split('/').collect()
    };

    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    Some(segments.join("/"))
}

/// Everything one analysis run learns while building the graph
#[derive(Debug, Default)]
pub struct GraphBuildOutcome {
    /// The complete immutable graph
    pub graph: ModuleGraph,
    /// Builder-stage warnings (unresolved imports, re-export cycles, dynamics)
    pub warnings: Vec<Violation>,
    /// Files whose imports could not be extracted
    pub degraded: Vec<DegradedFile>,
    /// Freshly parsed sources for the cache layer: (file, content hash, source)
    pub cache_updates: Vec<(PathBuf, String, ModuleSource)>,
}

/// Per-module fragment produced by the parallel phase
struct Fragment {
    id: ModuleId,
    source: Option<ModuleSource>,
    degraded: Option<DegradedFile>,
    cache_update: Option<(PathBuf, String, ModuleSource)>,
}

/// Cached-source lookup used during the parallel phase; implemented by the
/// cache layer, read-only so fragments can share it across threads
pub trait SourceCache: Send + Sync {
    fn lookup(&self, file: &Path, content_hash: &str) -> Option<ModuleSource>;
}

/// Builds the import graph from discovered modules
pub struct GraphBuilder<'a> {
    parser: &'a dyn ImportParser,
    resolver: &'a dyn ModuleResolver,
    dynamic_mode: DynamicImportMode,
    parallel: bool,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        parser: &'a dyn ImportParser,
        resolver: &'a dyn ModuleResolver,
        dynamic_mode: DynamicImportMode,
        parallel: bool,
    ) -> Self {
        Self { parser, resolver, dynamic_mode, parallel }
    }

    /// Build the complete graph for the discovered modules.
    ///
    /// Extraction runs per file (parallel unless disabled); the merge is
    /// single-threaded and deterministic so downstream consumers always
    /// observe a complete, consistent graph.
    pub fn build(
        &self,
        workspace_root: &Path,
        modules: BTreeMap<ModuleId, Module>,
        cache: Option<&dyn SourceCache>,
    ) -> BoundaryResult<GraphBuildOutcome> {
        let inputs: Vec<&Module> = modules.values().collect();

        let fragments: Vec<Fragment> = if self.parallel && inputs.len() > 1 {
            inputs.par_iter().map(|module| self.load_fragment(workspace_root, module, cache)).collect()
        } else {
            inputs.iter().map(|module| self.load_fragment(workspace_root, module, cache)).collect()
        };

        self.merge(modules, fragments)
    }

    /// Read, hash and parse one module's source; extraction failures degrade
    /// the file to zero outgoing edges
    fn load_fragment(
        &self,
        workspace_root: &Path,
        module: &Module,
        cache: Option<&dyn SourceCache>,
    ) -> Fragment {
        let abs_path = workspace_root.join(&module.file_path);

        let content = match fs::read_to_string(&abs_path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", abs_path.display(), e);
                return Fragment {
                    id: module.id.clone(),
                    source: None,
                    degraded: Some(DegradedFile {
                        file: module.file_path.clone(),
                        reason: format!("failed to read file: {e}"),
                    }),
                    cache_update: None,
                };
            }
        };

        let content_hash = crate::cache::content_hash(&content);
        if let Some(cache) = cache {
            if let Some(source) = cache.lookup(&module.file_path, &content_hash) {
                return Fragment {
                    id: module.id.clone(),
                    source: Some(source),
                    degraded: None,
                    cache_update: None,
                };
            }
        }

        match self.parser.extract(&module.file_path, &content) {
            Ok(source) => Fragment {
                id: module.id.clone(),
                source: Some(source.clone()),
                degraded: None,
                cache_update: cache
                    .is_some()
                    .then(|| (module.file_path.clone(), content_hash, source)),
            },
            Err(e) => {
                tracing::warn!("Degraded {}: {}", module.file_path.display(), e);
                Fragment {
                    id: module.id.clone(),
                    source: None,
                    degraded: Some(DegradedFile {
                        file: module.file_path.clone(),
                        reason: e.to_string(),
                    }),
                    cache_update: None,
                }
            }
        }
    }

    /// Single-threaded aggregation: resolve declarations into edges, flatten
    /// barrels, fill export surfaces, enforce the unique-id invariant
    fn merge(
        &self,
        mut modules: BTreeMap<ModuleId, Module>,
        fragments: Vec<Fragment>,
    ) -> BoundaryResult<GraphBuildOutcome> {
        let mut outcome = GraphBuildOutcome::default();
        let mut edges: Vec<ImportEdge> = Vec::new();
        // Barrel id -> resolved re-export targets with the symbols they carry
        let mut barrels: BTreeMap<ModuleId, Vec<(ModuleId, BTreeSet<String>)>> = BTreeMap::new();
        let mut seen: HashSet<ModuleId> = HashSet::new();

        // Fragments arrive in module-id order because the input map is ordered
        for fragment in fragments {
            if !seen.insert(fragment.id.clone()) {
                return Err(BoundaryError::internal(format!(
                    "duplicate canonical module id '{}'",
                    fragment.id
                )));
            }

            if let Some(update) = fragment.cache_update {
                outcome.cache_updates.push(update);
            }
            if let Some(degraded) = fragment.degraded {
                outcome.degraded.push(degraded);
                continue;
            }
            let Some(source) = fragment.source else { continue };

            let module = modules
                .get_mut(&fragment.id)
                .ok_or_else(|| {
                    BoundaryError::internal(format!("fragment for unknown module '{}'", fragment.id))
                })?;
            module.public_exports = source.exports.clone();
            let file = module.file_path.clone();
            let is_barrel = source.is_barrel();

            for decl in &source.imports {
                if decl.kind == ImportDeclKind::DynamicComputed {
                    outcome.warnings.push(
                        Violation::new(
                            rules::DYNAMIC_IMPORT,
                            self.dynamic_severity(),
                            file.clone(),
                            "Computed import target cannot be statically resolved",
                        )
                        .with_position(decl.line, decl.column)
                        .with_related([fragment.id.clone()]),
                    );
                    continue;
                }

                match self.resolver.resolve(&decl.specifier, &fragment.id) {
                    Resolution::Module(target) => {
                        let kind = match decl.kind {
                            ImportDeclKind::Static => EdgeKind::Direct,
                            ImportDeclKind::ReExport => EdgeKind::ReExport,
                            ImportDeclKind::Dynamic => EdgeKind::Dynamic,
                            ImportDeclKind::DynamicComputed => unreachable!("handled above"),
                        };
                        if is_barrel && kind == EdgeKind::ReExport {
                            barrels.entry(fragment.id.clone()).or_default().push((
                                target.clone(),
                                decl.symbols.iter().cloned().collect(),
                            ));
                        }
                        edges.push(
                            ImportEdge::new(
                                fragment.id.clone(),
                                target,
                                kind,
                                file.clone(),
                                decl.line,
                                decl.column,
                            )
                            .with_symbols(decl.symbols.iter().cloned()),
                        );
                    }
                    Resolution::External(package) => {
                        edges.push(
                            ImportEdge::new(
                                fragment.id.clone(),
                                package,
                                EdgeKind::External,
                                file.clone(),
                                decl.line,
                                decl.column,
                            )
                            .with_symbols(decl.symbols.iter().cloned()),
                        );
                    }
                    Resolution::Unresolved => {
                        outcome.warnings.push(
                            Violation::new(
                                rules::UNRESOLVED_IMPORT,
                                Severity::Warning,
                                file.clone(),
                                format!(
                                    "Import specifier '{}' does not resolve to any module or package",
                                    decl.specifier
                                ),
                            )
                            .with_position(decl.line, decl.column)
                            .with_related([fragment.id.clone()]),
                        );
                    }
                }
            }
        }

        self.flatten_reexports(&mut edges, &barrels, &mut outcome.warnings);

        let mut graph = ModuleGraph::new();
        for (_, module) in std::mem::take(&mut modules) {
            if !graph.insert_module(module) {
                return Err(BoundaryError::internal("duplicate module during graph assembly"));
            }
        }
        for edge in edges {
            graph.insert_edge(edge);
        }

        outcome.graph = graph;
        Ok(outcome)
    }

    /// Attribute edges into barrels to the module the chain ultimately
    /// re-exports. Bounded depth; a chain revisiting a module stops and is
    /// reported as a re-export cycle.
    fn flatten_reexports(
        &self,
        edges: &mut [ImportEdge],
        barrels: &BTreeMap<ModuleId, Vec<(ModuleId, BTreeSet<String>)>>,
        warnings: &mut Vec<Violation>,
    ) {
        for edge in edges.iter_mut() {
            if !barrels.contains_key(&edge.target) || edge.kind == EdgeKind::External {
                continue;
            }

            let mut visited: BTreeSet<ModuleId> = BTreeSet::new();
            visited.insert(edge.source.clone());
            let mut current = edge.target.clone();
            let mut cycle = false;

            for _ in 0..MAX_REEXPORT_DEPTH {
                if !visited.insert(current.clone()) {
                    cycle = true;
                    break;
                }
                let Some(targets) = barrels.get(&current) else { break };
                let next = next_in_chain(targets, &edge.symbols);
                match next {
                    Some(next) => current = next,
                    None => break,
                }
            }

            if cycle {
                warnings.push(
                    Violation::new(
                        rules::REEXPORT_CYCLE,
                        Severity::Warning,
                        edge.file.clone(),
                        format!("Re-export chain through '{}' revisits a module", edge.target),
                    )
                    .with_position(edge.line, edge.column)
                    .with_related(visited.iter().cloned()),
                );
                continue;
            }

            if current != edge.target {
                edge.attributed_target = Some(current);
            }
        }
    }

    fn dynamic_severity(&self) -> Severity {
        match self.dynamic_mode {
            DynamicImportMode::Strict => Severity::Warning,
            DynamicImportMode::Lenient => Severity::Info,
        }
    }
}

/// Pick the next hop of a re-export chain: the target carrying one of the
/// imported symbols, or the sole target for whole-module imports. Ambiguous
/// whole-module imports into multi-target barrels stop the chain.
fn next_in_chain(
    targets: &[(ModuleId, BTreeSet<String>)],
    symbols: &BTreeSet<String>,
) -> Option<ModuleId> {
    if !symbols.is_empty() {
        if let Some((target, _)) =
            targets.iter().find(|(_, exported)| symbols.iter().any(|s| exported.contains(s)))
        {
            return Some(target.clone());
        }
    }
    match targets {
        [(only, _)] => Some(only.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::discovery::ModuleDiscovery;
    use crate::parser::EsModuleParser;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn build(root: &Path) -> GraphBuildOutcome {
        let config = ConfigBuilder::new().build().unwrap();
        let discovered = ModuleDiscovery::new(&config).unwrap().discover(root).unwrap();
        let known: BTreeSet<ModuleId> = discovered.modules.keys().cloned().collect();
        let resolver = WorkspaceResolver::new(known, &config.resolver);
        let parser = EsModuleParser::new();
        let builder =
            GraphBuilder::new(&parser, &resolver, DynamicImportMode::Strict, false);
        builder.build(root, discovered.modules, None).unwrap()
    }

    #[test]
    fn test_resolver_relative_and_index() {
        let known: BTreeSet<ModuleId> = ["util/formatDate", "entities/order/index"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let resolver = WorkspaceResolver::new(known, &ResolverConfig::default());

        assert_eq!(
            resolver.resolve("../util/formatDate", "ui/Modal"),
            Resolution::Module("util/formatDate".to_string())
        );
        assert_eq!(
            resolver.resolve("./order", "entities/other"),
            Resolution::Module("entities/order/index".to_string())
        );
        assert_eq!(
            resolver.resolve("entities/order", "features/ProductList"),
            Resolution::Module("entities/order/index".to_string())
        );
        assert_eq!(resolver.resolve("./missing", "ui/Modal"), Resolution::Unresolved);
        // Climbing above the workspace root never resolves
        assert_eq!(resolver.resolve("../../outside", "ui/Modal"), Resolution::Unresolved);
        assert_eq!(
            resolver.resolve("react", "ui/Modal"),
            Resolution::External("react".to_string())
        );
        assert_eq!(
            resolver.resolve("@tanstack/react-query/core", "ui/Modal"),
            Resolution::External("@tanstack/react-query".to_string())
        );
    }

    #[test]
    fn test_resolver_aliases() {
        let known: BTreeSet<ModuleId> =
            ["util/formatDate"].iter().map(|s| s.to_string()).collect();
        let config = ResolverConfig {
            aliases: [("@/".to_string(), "".to_string())].into_iter().collect(),
        };
        let resolver = WorkspaceResolver::new(known, &config);

        assert_eq!(
            resolver.resolve("@/util/formatDate", "ui/Modal"),
            Resolution::Module("util/formatDate".to_string())
        );
        assert_eq!(resolver.resolve("@/util/missing", "ui/Modal"), Resolution::Unresolved);
    }

    #[test]
    fn test_graph_edges_and_exports() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "util/formatDate.ts", "export const formatDate = () => '';\n");
        write(
            root,
            "ui/Modal.ts",
            "import { formatDate } from '../util/formatDate';\nimport React from 'react';\nexport class Modal {}\n",
        );

        let outcome = build(root);
        assert_eq!(outcome.graph.module_count(), 2);
        let edges: Vec<_> = outcome.graph.outgoing("ui/Modal").collect();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].target, "util/formatDate");
        assert_eq!(edges[0].kind, EdgeKind::Direct);
        assert_eq!(edges[1].target, "react");
        assert_eq!(edges[1].kind, EdgeKind::External);

        let util = outcome.graph.module("util/formatDate").unwrap();
        assert!(util.public_exports.contains("formatDate"));
    }

    #[test]
    fn test_unresolved_import_warns_without_edge() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "ui/Modal.ts", "import { x } from './missing';\n");

        let outcome = build(root);
        assert_eq!(outcome.graph.outgoing("ui/Modal").count(), 0);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].rule_id, rules::UNRESOLVED_IMPORT);
    }

    #[test]
    fn test_dynamic_imports() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "util/loader.ts", "export const load = () => 1;\n");
        write(
            root,
            "features/Lazy.ts",
            "const a = import('../util/loader');\nconst b = import(somePath);\n",
        );

        let outcome = build(root);
        let edges: Vec<_> = outcome.graph.outgoing("features/Lazy").collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, EdgeKind::Dynamic);
        assert!(outcome.warnings.iter().any(|w| w.rule_id == rules::DYNAMIC_IMPORT));
    }

    #[test]
    fn test_barrel_flattening_attributes_inner_module() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "entities/order/model.ts", "export class Order {}\n");
        write(root, "entities/order/index.ts", "export { Order } from './model';\n");
        write(
            root,
            "features/Checkout/index.ts",
            "import { Order } from '../../entities/order';\n",
        );

        let outcome = build(root);
        let edge = outcome
            .graph
            .outgoing("features/Checkout/index")
            .next()
            .expect("edge into the barrel");
        assert_eq!(edge.target, "entities/order/index");
        assert_eq!(edge.attributed_target.as_deref(), Some("entities/order/model"));
    }

    #[test]
    fn test_reexport_cycle_guard() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "util/a.ts", "export * from './b';\n");
        write(root, "util/b.ts", "export * from './a';\n");
        write(root, "util/use.ts", "import { x } from './a';\n");

        let outcome = build(root);
        assert!(outcome.warnings.iter().any(|w| w.rule_id == rules::REEXPORT_CYCLE));
    }

    #[test]
    fn test_degraded_file_has_no_edges() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "ui/ok.ts", "import { x } from './broken';\nexport const x = 1;\n");
        write(root, "ui/broken.ts", "\0\0binary\0\0");

        let outcome = build(root);
        assert_eq!(outcome.degraded.len(), 1);
        assert_eq!(outcome.graph.outgoing("ui/broken").count(), 0);
        // The degraded module still exists as an import target
        assert_eq!(outcome.graph.outgoing("ui/ok").count(), 1);
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "util/a.ts", "import { b } from './b';\nexport const a = 1;\n");
        write(root, "util/b.ts", "import { c } from './c';\nexport const b = 1;\n");
        write(root, "util/c.ts", "export const c = 1;\n");

        let config = ConfigBuilder::new().build().unwrap();
        let discovered = ModuleDiscovery::new(&config).unwrap().discover(root).unwrap();
        let known: BTreeSet<ModuleId> = discovered.modules.keys().cloned().collect();
        let resolver = WorkspaceResolver::new(known, &config.resolver);
        let parser = EsModuleParser::new();

        let sequential = GraphBuilder::new(&parser, &resolver, DynamicImportMode::Strict, false)
            .build(root, discovered.modules.clone(), None)
            .unwrap();
        let parallel = GraphBuilder::new(&parser, &resolver, DynamicImportMode::Strict, true)
            .build(root, discovered.modules, None)
            .unwrap();

        let seq_edges: Vec<_> =
            sequential.graph.edges().iter().map(|e| (e.source.clone(), e.target.clone())).collect();
        let par_edges: Vec<_> =
            parallel.graph.edges().iter().map(|e| (e.source.clone(), e.target.clone())).collect();
        assert_eq!(seq_edges, par_edges);
    }
}
