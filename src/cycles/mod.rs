//! Import cycle detection
//!
//! Architecture: Domain Services - Tarjan's strongly connected components over the graph
//! - Every SCC with more than one member is a cycle; self-loops count too
//! - External edges leave the workspace and never participate
//! - Members are reported sorted so identical workspaces produce identical output

use crate::domain::model::{EdgeKind, ModuleGraph, ModuleId};
use crate::domain::violations::{rules, Severity, Violation};
use std::collections::HashMap;

/// Finds dependency cycles between workspace modules
pub struct CycleDetector;

struct TarjanState<'g> {
    graph: &'g ModuleGraph,
    index: usize,
    index_map: HashMap<&'g str, usize>,
    lowlink: HashMap<&'g str, usize>,
    on_stack: HashMap<&'g str, bool>,
    stack: Vec<&'g str>,
    components: Vec<Vec<ModuleId>>,
}

impl CycleDetector {
    /// One violation per cycle, anchored at the first member in sorted order
    pub fn detect(graph: &ModuleGraph) -> Vec<Violation> {
        let components = Self::strongly_connected_components(graph);
        let mut violations = Vec::new();

        for members in components {
            let is_cycle = members.len() > 1 || has_self_loop(graph, &members[0]);
            if !is_cycle {
                continue;
            }

            let anchor = &members[0];
            let file = graph
                .module(anchor)
                .map(|m| m.file_path.clone())
                .unwrap_or_else(|| anchor.clone().into());
            let message = if members.len() == 1 {
                format!("Module '{anchor}' imports itself")
            } else {
                format!("Dependency cycle between {} modules: {}", members.len(), members.join(" -> "))
            };

            violations.push(
                Violation::new(rules::CYCLE, Severity::Error, file, message)
                    .with_related(members),
            );
        }

        violations
    }

    /// Tarjan's algorithm; module ids are visited in deterministic order so
    /// component discovery order is stable
    fn strongly_connected_components(graph: &ModuleGraph) -> Vec<Vec<ModuleId>> {
        let mut state = TarjanState {
            graph,
            index: 0,
            index_map: HashMap::new(),
            lowlink: HashMap::new(),
            on_stack: HashMap::new(),
            stack: Vec::new(),
            components: Vec::new(),
        };

        for id in graph.module_ids() {
            if !state.index_map.contains_key(id.as_str()) {
                visit(&mut state, id.as_str());
            }
        }

        state.components
    }
}

fn visit<'g>(state: &mut TarjanState<'g>, node: &'g str) {
    state.index_map.insert(node, state.index);
    state.lowlink.insert(node, state.index);
    state.index += 1;
    state.stack.push(node);
    state.on_stack.insert(node, true);

    for edge in state.graph.outgoing(node) {
        if edge.kind == EdgeKind::External {
            continue;
        }
        // Unresolved targets are absent from the module map and never close a loop
        let Some(target) = state.graph.module(&edge.target).map(|m| m.id.as_str()) else {
            continue;
        };

        if !state.index_map.contains_key(target) {
            visit(state, target);
            let low = state.lowlink[node].min(state.lowlink[target]);
            state.lowlink.insert(node, low);
        } else if state.on_stack.get(target).copied().unwrap_or(false) {
            let low = state.lowlink[node].min(state.index_map[target]);
            state.lowlink.insert(node, low);
        }
    }

    if state.lowlink[node] == state.index_map[node] {
        let mut members = Vec::new();
        while let Some(top) = state.stack.pop() {
            state.on_stack.insert(top, false);
            members.push(top.to_string());
            if top == node {
                break;
            }
        }
        members.sort();
        state.components.push(members);
    }
}

fn has_self_loop(graph: &ModuleGraph, id: &str) -> bool {
    graph
        .outgoing(id)
        .any(|edge| edge.kind != EdgeKind::External && edge.target == id)
}
