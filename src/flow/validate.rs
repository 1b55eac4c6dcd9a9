//! Flow Validator
//!
//! Checks a candidate node/edge list against the catalog: existence of every
//! referenced definition and endpoint, handle type compatibility, and
//! chatflow/agentflow consistency.

use std::collections::HashMap;

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};
use super::handle::Handle;
use crate::compat::TypeResolver;
use crate::schema::{Definition, FlowKind};

/// Anything that can resolve a definition by name
pub trait DefinitionLookup {
    fn definition(&self, name: &str) -> Option<&Definition>;
}

impl DefinitionLookup for HashMap<String, Definition> {
    fn definition(&self, name: &str) -> Option<&Definition> {
        self.get(name)
    }
}

// =============================================================================
// Candidate input
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateNodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A node as submitted by a caller; the definition is named by `data.name`,
/// then `name`, then `type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateNode {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CandidateNodeData>,
}

impl CandidateNode {
    pub fn new(id: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(definition.into()),
            ..Default::default()
        }
    }

    pub fn definition_name(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.name.as_deref())
            .or(self.name.as_deref())
            .or(self.node_type.as_deref())
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
}

impl CandidateEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn with_handles(mut self, source_handle: impl Into<String>, target_handle: impl Into<String>) -> Self {
        self.source_handle = Some(source_handle.into());
        self.target_handle = Some(target_handle.into());
        self
    }

    pub fn with_type(mut self, edge_type: impl Into<String>) -> Self {
        self.edge_type = Some(edge_type.into());
        self
    }

    /// Explicit id, or `source->target`
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("{}->{}", self.source, self.target),
        }
    }
}

/// A candidate graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateFlow {
    #[serde(default)]
    pub nodes: Vec<CandidateNode>,
    #[serde(default)]
    pub edges: Vec<CandidateEdge>,
}

// =============================================================================
// Result
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// No hard errors
    pub valid: bool,
    pub errors: Vec<DiagnosticItem>,
    pub warnings: Vec<DiagnosticItem>,
}

impl From<Diagnostics> for ValidationResult {
    fn from(diags: Diagnostics) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) = diags
            .into_iter()
            .partition(|item| item.severity() == super::diagnostics::Severity::Error);
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

// =============================================================================
// Validator
// =============================================================================

struct Accepted<'d> {
    definition: &'d Definition,
    kind: FlowKind,
    index: NodeIndex,
}

pub struct FlowValidator<'a, L: DefinitionLookup + ?Sized> {
    lookup: &'a L,
    resolver: &'a TypeResolver,
}

impl<'a, L: DefinitionLookup + ?Sized> FlowValidator<'a, L> {
    pub fn new(lookup: &'a L, resolver: &'a TypeResolver) -> Self {
        Self { lookup, resolver }
    }

    pub fn validate(&self, flow: &CandidateFlow) -> ValidationResult {
        self.diagnose(&flow.nodes, &flow.edges).into()
    }

    /// Full diagnostics, in node-then-edge order
    pub fn diagnose(&self, nodes: &[CandidateNode], edges: &[CandidateEdge]) -> Diagnostics {
        let lookup: &'a L = self.lookup;
        let mut diags = Diagnostics::new();
        let mut graph: DiGraph<&str, ()> = DiGraph::with_capacity(nodes.len(), edges.len());
        let mut accepted: HashMap<&str, Accepted<'a>> = HashMap::new();
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for node in nodes {
            let Some(def_name) = node.definition_name() else {
                diags.report(
                    node.id.as_str(),
                    DiagnosticCode::MalformedNode,
                    "Node does not name a definition",
                );
                continue;
            };
            if node.id.is_empty() {
                diags.report(def_name, DiagnosticCode::MalformedNode, "Node has no id");
                continue;
            }
            let count = seen.entry(node.id.as_str()).or_insert(0);
            *count += 1;
            if *count > 1 {
                diags.report(
                    node.id.as_str(),
                    DiagnosticCode::DuplicateNodeId,
                    format!("Node id '{}' is used more than once", node.id),
                );
                continue;
            }
            match lookup.definition(def_name) {
                Some(definition) => {
                    let index = graph.add_node(node.id.as_str());
                    accepted.insert(
                        node.id.as_str(),
                        Accepted {
                            definition,
                            kind: definition.flow_kind(),
                            index,
                        },
                    );
                }
                None => diags.missing_definition(&node.id, def_name),
            }
        }

        for edge in edges {
            let label = edge.label();
            let source = accepted.get(edge.source.as_str());
            let target = accepted.get(edge.target.as_str());
            if source.is_none() {
                diags.unknown_endpoint(&label, "source", &edge.source);
            }
            if target.is_none() {
                diags.unknown_endpoint(&label, "target", &edge.target);
            }
            let (Some(source), Some(target)) = (source, target) else {
                continue;
            };
            graph.add_edge(source.index, target.index, ());

            self.check_handles(edge, &label, source, &mut diags);

            if source.kind != target.kind {
                diags.push(
                    DiagnosticItem::new(
                        label.as_str(),
                        DiagnosticCode::FlowKindMismatch,
                        format!(
                            "Edge joins a {} node to a {} node",
                            source.kind, target.kind
                        ),
                    )
                    .with_context(format!(
                        "{} -> {}",
                        source.definition.name, target.definition.name
                    )),
                );
            } else if let Some(tag) = edge.edge_type.as_deref() {
                let expected = source.kind.edge_tag();
                if tag != expected {
                    diags.report(
                        label.as_str(),
                        DiagnosticCode::EdgeTagMismatch,
                        format!("Edge type '{}' should be '{}' in a {}", tag, expected, source.kind),
                    );
                }
            }
        }

        let all_chatflow = accepted.values().all(|a| a.kind == FlowKind::Chatflow);
        if all_chatflow {
            for scc in kosaraju_scc(&graph) {
                let looped = scc.len() > 1 || graph.contains_edge(scc[0], scc[0]);
                if looped {
                    let mut members: Vec<&str> = scc.iter().map(|i| graph[*i]).collect();
                    members.sort_unstable();
                    diags.push(
                        DiagnosticItem::new(members[0], DiagnosticCode::Cycle, "Chatflow contains a cycle")
                            .with_context(format!("Nodes: {}", members.join(", "))),
                    );
                }
            }
        }

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            errors = diags.error_count(),
            warnings = diags.warning_count(),
            "validated flow"
        );
        diags
    }

    fn check_handles(&self, edge: &CandidateEdge, label: &str, source: &Accepted<'_>, diags: &mut Diagnostics) {
        let (Some(raw_source), Some(raw_target)) = (edge.source_handle.as_deref(), edge.target_handle.as_deref())
        else {
            return;
        };
        // agentflow wires carry untyped handles
        let (Some(out), Some(inp)) = (Handle::parse(raw_source), Handle::parse(raw_target)) else {
            debug!(edge = label, "untyped handles, skipping type check");
            return;
        };

        let required = inp.primary_type();
        let claimed = out.types.iter().any(|t| self.resolver.is_compatible(t, required));
        let declared = source
            .definition
            .base_classes
            .iter()
            .any(|t| self.resolver.is_compatible(t, required));

        if !claimed && !declared {
            diags.type_mismatch(label, out.primary_type(), required, &source.definition.base_classes);
        }
    }
}
