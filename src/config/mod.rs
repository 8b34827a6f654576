//! Configuration loading and management for Boundary Guardian
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to clean domain objects
//! - The default transition table is embedded in the domain, not infrastructure
//! - Configuration acts as a repository for layer rules and the policy tables

use crate::domain::model::LayerTag;
use crate::domain::violations::{BoundaryError, BoundaryResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Main configuration structure for Boundary Guardian
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryConfig {
    /// Configuration format version
    pub version: String,
    /// Path filtering configuration
    pub paths: PathConfig,
    /// Layer tagging rules, evaluated against every discovered module path
    pub layers: Vec<LayerRule>,
    /// Allowed-transition table and the orthogonal policy rules
    pub policy: PolicyConfig,
    /// Import-specifier resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// Path filtering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Include/exclude patterns (gitignore-style, `!` prefix includes)
    pub patterns: Vec<String>,
    /// Optional ignore file name walked up from each module
    pub ignore_file: Option<String>,
    /// File extensions treated as workspace modules
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

/// A single layer tagging rule: glob pattern over canonical module paths
#[derive(Debug, Clone, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub struct LayerRule {
    /// Glob pattern matched against canonical module ids (`features/**`)
    pub pattern: String,
    /// Layer assigned to matching modules
    pub tag: LayerTag,
    /// Explicit scope; when absent, scoped tags derive the scope from the
    /// first path segment after the pattern's static prefix
    pub scope: Option<String>,
    /// Package root file name for Feature/Entity packages
    #[serde(default = "default_root_file")]
    pub root: String,
}

/// Dynamic-import handling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DynamicImportMode {
    /// Unresolvable dynamic targets are warnings
    #[default]
    Strict,
    /// Unresolvable dynamic targets are informational only
    Lenient,
}

/// Policy tables: layer transitions, cross-scope whitelist, external rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Allowed layer transitions: absence of a (from, to) pair is a violation
    pub allowed: BTreeMap<LayerTag, BTreeSet<LayerTag>>,
    /// Per-source-scope whitelist of same-tag target scopes
    #[serde(default)]
    pub cross_scope_allow: BTreeMap<String, BTreeSet<String>>,
    /// How computed import targets are reported
    #[serde(default)]
    pub dynamic_imports: DynamicImportMode,
    /// Whether third-party imports are evaluated at all
    #[serde(default)]
    pub check_external: bool,
    /// Tags permitted to import third-party packages when external checking is
    /// on; `None` permits all tags
    #[serde(default)]
    pub external_allowed_from: Option<BTreeSet<LayerTag>>,
}

/// Import-specifier resolution settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolverConfig {
    /// Alias prefixes mapped to workspace-relative prefixes (`"@/": ""`)
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl PolicyConfig {
    /// Whether the transition table allows an edge between two different tags
    pub fn allows(&self, from: LayerTag, to: LayerTag) -> bool {
        self.allowed.get(&from).map(|targets| targets.contains(&to)).unwrap_or(false)
    }

    /// Whether a same-tag edge between two scopes is whitelisted
    pub fn cross_scope_allowed(&self, from_scope: &str, to_scope: &str) -> bool {
        self.cross_scope_allow
            .get(from_scope)
            .map(|targets| targets.contains(to_scope))
            .unwrap_or(false)
    }

    /// Whether modules of the given tag may import third-party packages
    pub fn external_allowed(&self, from: LayerTag) -> bool {
        match &self.external_allowed_from {
            Some(tags) => tags.contains(&from),
            None => true,
        }
    }
}

impl BoundaryConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> BoundaryResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            BoundaryError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            BoundaryError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> BoundaryResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| BoundaryError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Get default configuration: conventional layer directories and the
    /// strict-partial-order transition table
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            paths: PathConfig {
                patterns: vec![
                    "**/node_modules/**".to_string(),
                    "**/.git/**".to_string(),
                    "**/dist/**".to_string(),
                    "**/build/**".to_string(),
                    "**/*.d.ts".to_string(),
                    "**/*.test.*".to_string(),
                    "**/*.spec.*".to_string(),
                ],
                ignore_file: Some(".boundaryignore".to_string()),
                extensions: default_extensions(),
            },
            layers: vec![
                LayerRule::new("features/**", LayerTag::Feature),
                LayerRule::new("entities/**", LayerTag::Entity),
                LayerRule::new("ui/**", LayerTag::Ui),
                LayerRule::new("util/**", LayerTag::Util),
                LayerRule::new("infra/**", LayerTag::Infra),
            ],
            policy: PolicyConfig {
                allowed: Self::default_transition_table(),
                cross_scope_allow: BTreeMap::new(),
                dynamic_imports: DynamicImportMode::Strict,
                check_external: false,
                external_allowed_from: None,
            },
            resolver: ResolverConfig::default(),
        }
    }

    /// The default allowed-transition table; layering forms a strict partial
    /// order with Infra at the bottom accepting no outgoing dependencies
    pub fn default_transition_table() -> BTreeMap<LayerTag, BTreeSet<LayerTag>> {
        let mut table = BTreeMap::new();
        table.insert(
            LayerTag::Feature,
            [LayerTag::Entity, LayerTag::Ui, LayerTag::Util, LayerTag::Infra].into(),
        );
        table.insert(LayerTag::Entity, [LayerTag::Util, LayerTag::Infra].into());
        table.insert(LayerTag::Ui, [LayerTag::Util].into());
        table.insert(LayerTag::Util, [LayerTag::Infra].into());
        table.insert(LayerTag::Infra, BTreeSet::new());
        table
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> BoundaryResult<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            return Err(BoundaryError::config(format!(
                "Unsupported configuration version: {}. Supported versions: 1.0",
                self.version
            )));
        }

        for pattern in &self.paths.patterns {
            let raw = pattern.strip_prefix('!').unwrap_or(pattern);
            glob::Pattern::new(raw).map_err(|e| {
                BoundaryError::config(format!("Invalid path pattern '{raw}': {e}"))
            })?;
        }

        for rule in &self.layers {
            glob::Pattern::new(&rule.pattern).map_err(|e| {
                BoundaryError::config(format!("Invalid layer pattern '{}': {}", rule.pattern, e))
            })?;

            if rule.tag == LayerTag::Untagged {
                return Err(BoundaryError::config(format!(
                    "Layer pattern '{}' assigns the reserved tag 'untagged'",
                    rule.pattern
                )));
            }

            // Identical patterns with diverging outcomes are contradictory
            let conflicting = self.layers.iter().any(|other| {
                other.pattern == rule.pattern
                    && (other.tag != rule.tag || other.scope != rule.scope)
            });
            if conflicting {
                return Err(BoundaryError::config(format!(
                    "Contradictory layer rules for pattern '{}'",
                    rule.pattern
                )));
            }
        }

        for (from, targets) in &self.policy.allowed {
            if *from == LayerTag::Untagged || targets.contains(&LayerTag::Untagged) {
                return Err(BoundaryError::config(
                    "Transition table must not reference the 'untagged' tag",
                ));
            }
        }

        for alias in self.resolver.aliases.keys() {
            if alias.is_empty() {
                return Err(BoundaryError::config("Resolver alias prefix must not be empty"));
            }
        }

        Ok(())
    }

    /// Convert to JSON for serialization
    pub fn to_json(&self) -> BoundaryResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BoundaryError::config(format!("Failed to serialize config: {e}")))
    }

    /// Create a fingerprint of the configuration for cache validation
    pub fn fingerprint(&self) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();

        self.version.hash(&mut hasher);
        for pattern in &self.paths.patterns {
            pattern.hash(&mut hasher);
        }
        self.paths.ignore_file.hash(&mut hasher);
        for ext in &self.paths.extensions {
            ext.hash(&mut hasher);
        }

        // Layer rules and tables are already deterministically ordered
        for rule in &self.layers {
            rule.hash(&mut hasher);
        }
        for (from, targets) in &self.policy.allowed {
            from.as_str().hash(&mut hasher);
            for to in targets {
                to.as_str().hash(&mut hasher);
            }
        }
        for (scope, targets) in &self.policy.cross_scope_allow {
            scope.hash(&mut hasher);
            for to in targets {
                to.hash(&mut hasher);
            }
        }
        self.policy.dynamic_imports.hash(&mut hasher);
        self.policy.check_external.hash(&mut hasher);
        if let Some(tags) = &self.policy.external_allowed_from {
            for tag in tags {
                tag.as_str().hash(&mut hasher);
            }
        }
        for (alias, target) in &self.resolver.aliases {
            alias.hash(&mut hasher);
            target.hash(&mut hasher);
        }

        format!("{:x}", hasher.finish())
    }
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl LayerRule {
    /// Create a rule with the default package-root file name
    pub fn new(pattern: impl Into<String>, tag: LayerTag) -> Self {
        Self { pattern: pattern.into(), tag, scope: None, root: default_root_file() }
    }

    /// Set an explicit scope name
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the package-root file name
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    /// The static prefix of the glob pattern, up to the first wildcard,
    /// trimmed of the trailing separator (`features/**` -> `features`)
    pub fn static_prefix(&self) -> &str {
        let end = self.pattern.find(['*', '?', '[']).unwrap_or(self.pattern.len());
        self.pattern[..end].trim_end_matches('/')
    }
}

fn default_root_file() -> String {
    "index".to_string()
}

fn default_extensions() -> Vec<String> {
    vec![
        "ts".to_string(),
        "tsx".to_string(),
        "js".to_string(),
        "jsx".to_string(),
        "mjs".to_string(),
    ]
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: BoundaryConfig,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self { config: BoundaryConfig::default() }
    }

    /// Replace the layer rules entirely
    pub fn layers(mut self, rules: Vec<LayerRule>) -> Self {
        self.config.layers = rules;
        self
    }

    /// Add a layer rule
    pub fn add_layer(mut self, rule: LayerRule) -> Self {
        self.config.layers.push(rule);
        self
    }

    /// Add a path pattern
    pub fn add_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.paths.patterns.push(pattern.into());
        self
    }

    /// Override the allowed targets for one layer
    pub fn allow(mut self, from: LayerTag, targets: impl IntoIterator<Item = LayerTag>) -> Self {
        self.config.policy.allowed.insert(from, targets.into_iter().collect());
        self
    }

    /// Whitelist a same-tag cross-scope edge
    pub fn allow_cross_scope(
        mut self,
        from_scope: impl Into<String>,
        to_scope: impl Into<String>,
    ) -> Self {
        self.config
            .policy
            .cross_scope_allow
            .entry(from_scope.into())
            .or_default()
            .insert(to_scope.into());
        self
    }

    /// Set the dynamic-import handling mode
    pub fn dynamic_imports(mut self, mode: DynamicImportMode) -> Self {
        self.config.policy.dynamic_imports = mode;
        self
    }

    /// Enable external checking, restricting it to the given tags
    pub fn check_external(mut self, allowed_from: impl IntoIterator<Item = LayerTag>) -> Self {
        self.config.policy.check_external = true;
        self.config.policy.external_allowed_from = Some(allowed_from.into_iter().collect());
        self
    }

    /// Register a resolver alias
    pub fn alias(mut self, prefix: impl Into<String>, target: impl Into<String>) -> Self {
        self.config.resolver.aliases.insert(prefix.into(), target.into());
        self
    }

    /// Build the final configuration
    pub fn build(self) -> BoundaryResult<BoundaryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LayerTag::Feature, LayerTag::Entity, true)]
    #[case(LayerTag::Feature, LayerTag::Ui, true)]
    #[case(LayerTag::Feature, LayerTag::Util, true)]
    #[case(LayerTag::Feature, LayerTag::Infra, true)]
    #[case(LayerTag::Entity, LayerTag::Util, true)]
    #[case(LayerTag::Entity, LayerTag::Infra, true)]
    #[case(LayerTag::Entity, LayerTag::Feature, false)]
    #[case(LayerTag::Entity, LayerTag::Ui, false)]
    #[case(LayerTag::Ui, LayerTag::Util, true)]
    #[case(LayerTag::Ui, LayerTag::Feature, false)]
    #[case(LayerTag::Ui, LayerTag::Entity, false)]
    #[case(LayerTag::Ui, LayerTag::Infra, false)]
    #[case(LayerTag::Util, LayerTag::Infra, true)]
    #[case(LayerTag::Util, LayerTag::Feature, false)]
    #[case(LayerTag::Util, LayerTag::Entity, false)]
    #[case(LayerTag::Util, LayerTag::Ui, false)]
    #[case(LayerTag::Infra, LayerTag::Feature, false)]
    #[case(LayerTag::Infra, LayerTag::Entity, false)]
    #[case(LayerTag::Infra, LayerTag::Ui, false)]
    #[case(LayerTag::Infra, LayerTag::Util, false)]
    fn test_default_table_is_strict_partial_order(
        #[case] from: LayerTag,
        #[case] to: LayerTag,
        #[case] allowed: bool,
    ) {
        let policy = BoundaryConfig::default().policy;
        assert_eq!(policy.allows(from, to), allowed);
    }

    #[test]
    fn test_contradictory_rules_rejected() {
        let result = ConfigBuilder::new()
            .add_layer(LayerRule::new("shared/**", LayerTag::Util))
            .add_layer(LayerRule::new("shared/**", LayerTag::Ui))
            .build();

        assert!(matches!(result, Err(BoundaryError::Configuration { .. })));
    }

    #[test]
    fn test_untagged_is_reserved() {
        let result =
            ConfigBuilder::new().add_layer(LayerRule::new("misc/**", LayerTag::Untagged)).build();
        assert!(matches!(result, Err(BoundaryError::Configuration { .. })));
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let result =
            ConfigBuilder::new().add_layer(LayerRule::new("features/[", LayerTag::Feature)).build();
        assert!(matches!(result, Err(BoundaryError::Configuration { .. })));
    }

    #[test]
    fn test_cross_scope_whitelist() {
        let config = ConfigBuilder::new().allow_cross_scope("order", "user").build().unwrap();
        assert!(config.policy.cross_scope_allowed("order", "user"));
        assert!(!config.policy.cross_scope_allowed("user", "order"));
        assert!(!config.policy.cross_scope_allowed("order", "product"));
    }

    #[test]
    fn test_static_prefix() {
        assert_eq!(LayerRule::new("features/**", LayerTag::Feature).static_prefix(), "features");
        assert_eq!(LayerRule::new("entities/*", LayerTag::Entity).static_prefix(), "entities");
        assert_eq!(LayerRule::new("infra/logging", LayerTag::Infra).static_prefix(), "infra/logging");
    }

    #[test]
    fn test_fingerprint_stability() {
        let config = BoundaryConfig::default();
        assert_eq!(config.fingerprint(), config.fingerprint());

        let other = ConfigBuilder::new().allow_cross_scope("order", "user").build().unwrap();
        assert_ne!(config.fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = BoundaryConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let rehydrated = BoundaryConfig::load_from_str(&yaml).unwrap();
        assert_eq!(config.fingerprint(), rehydrated.fingerprint());
    }

    #[test]
    fn test_load_from_str_rejects_bad_version() {
        let yaml = r#"
version: "2.0"
paths:
  patterns: []
  ignore_file: null
layers: []
policy:
  allowed: {}
"#;
        assert!(matches!(
            BoundaryConfig::load_from_str(yaml),
            Err(BoundaryError::Configuration { .. })
        ));
    }

    #[test]
    fn test_external_allowed_defaults_to_all() {
        let config = BoundaryConfig::default();
        assert!(config.policy.external_allowed(LayerTag::Ui));

        let restricted =
            ConfigBuilder::new().check_external([LayerTag::Infra, LayerTag::Util]).build().unwrap();
        assert!(restricted.policy.external_allowed(LayerTag::Infra));
        assert!(!restricted.policy.external_allowed(LayerTag::Ui));
    }
}
