//! Core model for workspace modules and the import graph
//!
//! Architecture: Rich Domain Models - Modules and edges carry behavior, not just data
//! - LayerTag encodes the architectural role every module must have exactly one of
//! - ImportEdge knows its own policy-relevant attributes (kind, attributed target)
//! - ModuleGraph is an aggregate built once per run and immutable afterwards

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Canonical identifier of a workspace module.
///
/// Always workspace-relative, forward slashes, no file extension
/// (e.g. `features/Checkout/index`).
pub type ModuleId = String;

/// Architectural layer assigned to every workspace module
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerTag {
    /// Feature packages composing entities, UI and utilities into user flows
    Feature,
    /// Domain entity packages (one scope per domain)
    Entity,
    /// Shared presentational components
    Ui,
    /// Shared pure helpers
    Util,
    /// Platform plumbing (logging, transport, storage adapters)
    Infra,
    /// No configured rule matched; still a first-class tag, reported as a warning
    Untagged,
}

impl LayerTag {
    /// Convert to string for display and report payloads
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Entity => "entity",
            Self::Ui => "ui",
            Self::Util => "util",
            Self::Infra => "infra",
            Self::Untagged => "untagged",
        }
    }

    /// Whether modules of this tag belong to a scoped package with an
    /// encapsulated internal structure
    pub fn is_scoped(self) -> bool {
        matches!(self, Self::Feature | Self::Entity)
    }
}

impl fmt::Display for LayerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered workspace module with its layer classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Canonical module identifier
    pub id: ModuleId,
    /// Architectural layer
    pub tag: LayerTag,
    /// Domain name for Entity, feature name for Feature, library namespace otherwise
    pub scope: Option<String>,
    /// Identifiers this module exposes as its external surface
    pub public_exports: BTreeSet<String>,
    /// Package directory for scoped (Feature/Entity) packages
    pub package_dir: Option<String>,
    /// The package-root module that is the externally visible entry point
    pub package_root: Option<ModuleId>,
    /// Source file backing this module, for diagnostics
    pub file_path: PathBuf,
}

impl Module {
    /// Create a module record with the given identity and tag
    pub fn new(id: impl Into<ModuleId>, tag: LayerTag, file_path: PathBuf) -> Self {
        Self {
            id: id.into(),
            tag,
            scope: None,
            public_exports: BTreeSet::new(),
            package_dir: None,
            package_root: None,
            file_path,
        }
    }

    /// Set the scope name
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the enclosing package directory and its declared root module
    pub fn with_package(mut self, dir: impl Into<String>, root: impl Into<ModuleId>) -> Self {
        self.package_dir = Some(dir.into());
        self.package_root = Some(root.into());
        self
    }

    /// Whether this module is the declared entry point of its package
    pub fn is_package_root(&self) -> bool {
        self.package_root.as_deref() == Some(self.id.as_str())
    }

    /// Whether this module lies strictly inside a scoped package, i.e. it is
    /// part of a Feature/Entity package but not its declared root
    pub fn is_package_internal(&self) -> bool {
        self.package_root.is_some() && !self.is_package_root()
    }

    /// Whether two modules belong to the same scoped package
    pub fn same_package(&self, other: &Module) -> bool {
        match (&self.package_dir, &other.package_dir) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Kind of a resolved import edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Plain static `import ... from` declaration
    Direct,
    /// `export ... from` re-export declaration
    ReExport,
    /// `import(...)` with a literal specifier; reduced-confidence edge
    Dynamic,
    /// Specifier resolved to a third-party package outside the workspace
    External,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::ReExport => "reexport",
            Self::Dynamic => "dynamic",
            Self::External => "external",
        }
    }

    /// Whether edges of this kind are subject to the layer-transition table
    pub fn is_table_checked(self) -> bool {
        matches!(self, Self::Direct | Self::ReExport)
    }
}

/// A static dependency from one module to another
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEdge {
    /// Importing module
    pub source: ModuleId,
    /// Imported module, or the package name for External edges
    pub target: ModuleId,
    /// How the dependency was declared
    pub kind: EdgeKind,
    /// Imported identifiers; empty means whole-module import
    pub symbols: BTreeSet<String>,
    /// Source file of the import declaration
    pub file: PathBuf,
    /// 1-indexed line of the declaration
    pub line: u32,
    /// 1-indexed column of the declaration
    pub column: u32,
    /// For edges into barrels: the module the re-export chain ultimately
    /// publishes; used by the encapsulation check
    pub attributed_target: Option<ModuleId>,
}

impl ImportEdge {
    /// Create an edge between two modules
    pub fn new(
        source: impl Into<ModuleId>,
        target: impl Into<ModuleId>,
        kind: EdgeKind,
        file: PathBuf,
        line: u32,
        column: u32,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            symbols: BTreeSet::new(),
            file,
            line,
            column,
            attributed_target: None,
        }
    }

    /// Set the imported symbol names
    pub fn with_symbols(mut self, symbols: impl IntoIterator<Item = String>) -> Self {
        self.symbols = symbols.into_iter().collect();
        self
    }

    /// Record the flattened re-export target
    pub fn with_attributed_target(mut self, target: impl Into<ModuleId>) -> Self {
        self.attributed_target = Some(target.into());
        self
    }

    /// The module the policy should treat as the effective target: the
    /// flattened barrel target when one exists, the direct target otherwise
    pub fn effective_target(&self) -> &ModuleId {
        self.attributed_target.as_ref().unwrap_or(&self.target)
    }
}

/// The complete, immutable import graph for one analysis run
///
/// Modules are keyed deterministically; edges keep their insertion order so
/// policy evaluation is reproducible before the reporter's final sort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleGraph {
    /// All discovered modules by canonical id
    modules: BTreeMap<ModuleId, Module>,
    /// Edges in insertion order
    edges: Vec<ImportEdge>,
    /// Outgoing edge indices per source module
    outgoing: BTreeMap<ModuleId, Vec<usize>>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a module; returns false when the canonical id already exists
    /// (the caller treats that as a broken graph invariant)
    pub fn insert_module(&mut self, module: Module) -> bool {
        if self.modules.contains_key(&module.id) {
            return false;
        }
        self.modules.insert(module.id.clone(), module);
        true
    }

    /// Append an edge, maintaining the outgoing index
    pub fn insert_edge(&mut self, edge: ImportEdge) {
        let idx = self.edges.len();
        self.outgoing.entry(edge.source.clone()).or_default().push(idx);
        self.edges.push(edge);
    }

    pub fn module(&self, id: &str) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn contains_module(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// Modules in deterministic (id) order
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn module_ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Edges in insertion order
    pub fn edges(&self) -> &[ImportEdge] {
        &self.edges
    }

    /// Outgoing edges of one module, in insertion order
    pub fn outgoing(&self, id: &str) -> impl Iterator<Item = &ImportEdge> {
        self.outgoing
            .get(id)
            .into_iter()
            .flat_map(move |indices| indices.iter().map(move |&i| &self.edges[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: &str, tag: LayerTag) -> Module {
        Module::new(id, tag, PathBuf::from(format!("{id}.ts")))
    }

    #[test]
    fn test_package_root_detection() {
        let root = module("features/Checkout/index", LayerTag::Feature)
            .with_scope("Checkout")
            .with_package("features/Checkout", "features/Checkout/index");
        let inner = module("features/Checkout/ui/Cart", LayerTag::Feature)
            .with_scope("Checkout")
            .with_package("features/Checkout", "features/Checkout/index");

        assert!(root.is_package_root());
        assert!(!root.is_package_internal());
        assert!(inner.is_package_internal());
        assert!(root.same_package(&inner));
    }

    #[test]
    fn test_unscoped_modules_share_no_package() {
        let a = module("util/formatDate", LayerTag::Util);
        let b = module("util/truncate", LayerTag::Util);
        assert!(!a.same_package(&b));
        assert!(!a.is_package_internal());
    }

    #[test]
    fn test_graph_rejects_duplicate_ids() {
        let mut graph = ModuleGraph::new();
        assert!(graph.insert_module(module("util/a", LayerTag::Util)));
        assert!(!graph.insert_module(module("util/a", LayerTag::Util)));
        assert_eq!(graph.module_count(), 1);
    }

    #[test]
    fn test_edge_insertion_order_preserved() {
        let mut graph = ModuleGraph::new();
        graph.insert_module(module("a", LayerTag::Util));
        graph.insert_module(module("b", LayerTag::Util));
        graph.insert_edge(ImportEdge::new("a", "b", EdgeKind::Direct, "a.ts".into(), 1, 1));
        graph.insert_edge(ImportEdge::new("a", "c", EdgeKind::External, "a.ts".into(), 2, 1));

        let targets: Vec<_> = graph.outgoing("a").map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["b", "c"]);
    }

    #[test]
    fn test_effective_target_prefers_attribution() {
        let edge = ImportEdge::new("a", "pkg/index", EdgeKind::Direct, "a.ts".into(), 1, 1)
            .with_attributed_target("pkg/internal/impl");
        assert_eq!(edge.effective_target(), "pkg/internal/impl");
    }
}
