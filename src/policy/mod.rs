//! Boundary policy evaluation
//!
//! Architecture: Domain Services - the engine applies configured rules to a finished graph
//! - The transition table governs Direct and ReExport edges between different tags
//! - Same-tag edges between scopes answer to the cross-scope whitelist instead
//! - Dynamic edges skip the table but resolved ones still answer to the
//!   encapsulation and cross-scope rules
//! - Encapsulation follows flattened attribution so barrel chains cannot
//!   launder package-internal modules

use crate::config::PolicyConfig;
use crate::domain::model::{EdgeKind, ImportEdge, LayerTag, Module, ModuleGraph};
use crate::domain::violations::{rules, Severity, Violation};

/// Evaluates every edge of the graph against the configured policy
pub struct PolicyEngine {
    policy: PolicyConfig,
}

impl PolicyEngine {
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }

    /// Evaluate all edges in insertion order.
    ///
    /// Dynamic edges with a literal, resolvable target are real workspace
    /// edges; only the transition-table lookup is waived for them.
    pub fn evaluate(&self, graph: &ModuleGraph) -> Vec<Violation> {
        let mut violations = Vec::new();

        for edge in graph.edges() {
            let Some(source) = graph.module(&edge.source) else { continue };

            if edge.kind == EdgeKind::External {
                self.check_external(source, edge, &mut violations);
                continue;
            }

            if let Some(target) = graph.module(&edge.target) {
                self.check_transition(source, target, edge, &mut violations);
            }
            if let Some(reached) = graph.module(edge.effective_target()) {
                self.check_encapsulation(source, reached, edge, &mut violations);
            }
        }

        violations
    }

    /// Layer-transition table for different tags (Direct and ReExport edges
    /// only), cross-scope whitelist for same-tag edges. Untagged endpoints
    /// were already reported at discovery and are exempt here.
    fn check_transition(
        &self,
        source: &Module,
        target: &Module,
        edge: &ImportEdge,
        violations: &mut Vec<Violation>,
    ) {
        if source.tag == LayerTag::Untagged || target.tag == LayerTag::Untagged {
            return;
        }

        if source.tag == target.tag {
            let (Some(from_scope), Some(to_scope)) = (&source.scope, &target.scope) else {
                return;
            };
            if from_scope != to_scope && !self.policy.cross_scope_allowed(from_scope, to_scope) {
                violations.push(
                    Violation::new(
                        rules::CROSS_SCOPE,
                        Severity::Error,
                        edge.file.clone(),
                        format!(
                            "Import between {} scopes '{}' and '{}' is not whitelisted",
                            source.tag, from_scope, to_scope
                        ),
                    )
                    .with_position(edge.line, edge.column)
                    .with_related([source.id.clone(), target.id.clone()]),
                );
            }
            return;
        }

        if !edge.kind.is_table_checked() {
            return;
        }
        if !self.policy.allows(source.tag, target.tag) {
            violations.push(
                Violation::new(
                    rules::LAYER_BOUNDARY,
                    Severity::Error,
                    edge.file.clone(),
                    format!(
                        "Module '{}' ({}) may not import '{}' ({})",
                        source.id, source.tag, target.id, target.tag
                    ),
                )
                .with_position(edge.line, edge.column)
                .with_related([source.id.clone(), target.id.clone()]),
            );
        }
    }

    /// A package-internal module may only be reached from inside its own
    /// package or through the package root. Flattened attribution means an
    /// edge whose named target IS the root stays legal even though the chain
    /// ends at an internal module.
    fn check_encapsulation(
        &self,
        source: &Module,
        reached: &Module,
        edge: &ImportEdge,
        violations: &mut Vec<Violation>,
    ) {
        if !reached.is_package_internal() || source.same_package(reached) {
            return;
        }
        let via_root = reached.package_root.as_deref() == Some(edge.target.as_str());
        if via_root {
            return;
        }

        let hint = reached
            .package_root
            .as_deref()
            .map(|root| format!("; import '{root}' instead"))
            .unwrap_or_default();
        violations.push(
            Violation::new(
                rules::ENCAPSULATION,
                Severity::Error,
                edge.file.clone(),
                format!(
                    "Module '{}' reaches package-internal module '{}'{}",
                    source.id, reached.id, hint
                ),
            )
            .with_position(edge.line, edge.column)
            .with_related([source.id.clone(), reached.id.clone()]),
        );
    }

    /// Third-party imports are unchecked unless the policy opts in; then only
    /// whitelisted tags may depend on externals
    fn check_external(&self, source: &Module, edge: &ImportEdge, violations: &mut Vec<Violation>) {
        if !self.policy.check_external || source.tag == LayerTag::Untagged {
            return;
        }
        if self.policy.external_allowed(source.tag) {
            return;
        }

        violations.push(
            Violation::new(
                rules::EXTERNAL_IMPORT,
                Severity::Error,
                edge.file.clone(),
                format!(
                    "Module '{}' ({}) may not import third-party package '{}'",
                    source.id, source.tag, edge.target
                ),
            )
            .with_position(edge.line, edge.column)
            .with_related([source.id.clone()]),
        );
    }
}
