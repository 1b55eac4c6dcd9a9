//! Example skeletons for common compositions
//!
//! Each skeleton is a fixed recipe of definitions and connector wiring,
//! instantiated against the catalog so handles and defaults are real.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{json, Value};

use super::handle::Handle;
use super::instance::{instance_id, instantiate};
use super::validate::DefinitionLookup;
use crate::compat::TypeResolver;
use crate::error::{Result, SchemaError};
use crate::schema::{Definition, FlowKind, OutputAnchor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkeletonKind {
    ConversationChain,
    RetrievalQa,
    ToolAgent,
    AgentflowBasic,
}

/// One connection: source node index, target node index, target input name.
/// Agentflow steps connect without a named input.
type Wire = (usize, usize, Option<&'static str>);

struct Recipe {
    description: &'static str,
    nodes: &'static [&'static str],
    wires: &'static [Wire],
}

impl SkeletonKind {
    pub const ALL: [SkeletonKind; 4] = [
        Self::ConversationChain,
        Self::RetrievalQa,
        Self::ToolAgent,
        Self::AgentflowBasic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConversationChain => "conversation_chain",
            Self::RetrievalQa => "retrieval_qa",
            Self::ToolAgent => "tool_agent",
            Self::AgentflowBasic => "agentflow_basic",
        }
    }

    fn recipe(&self) -> Recipe {
        match self {
            Self::ConversationChain => Recipe {
                description: "Chat model with buffer memory feeding a conversation chain",
                nodes: &["chatOpenAI", "bufferMemory", "conversationChain"],
                wires: &[(0, 2, Some("model")), (1, 2, Some("memory"))],
            },
            Self::RetrievalQa => Recipe {
                description: "Conversational retrieval over an in-memory vector store",
                nodes: &[
                    "chatOpenAI",
                    "openAIEmbeddings",
                    "memoryVectorStore",
                    "conversationalRetrievalQAChain",
                ],
                wires: &[
                    (1, 2, Some("embeddings")),
                    (0, 3, Some("model")),
                    (2, 3, Some("vectorStoreRetriever")),
                ],
            },
            Self::ToolAgent => Recipe {
                description: "Tool-calling agent with memory and a calculator tool",
                nodes: &["chatOpenAI", "bufferMemory", "calculator", "toolAgent"],
                wires: &[(0, 3, Some("model")), (1, 3, Some("memory")), (2, 3, Some("tools"))],
            },
            Self::AgentflowBasic => Recipe {
                description: "Start step followed by a single LLM step",
                nodes: &["startAgentflow", "llmAgentflow"],
                wires: &[(0, 1, None)],
            },
        }
    }
}

impl FromStr for SkeletonKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SchemaError::not_found("skeleton", s))
    }
}

impl fmt::Display for SkeletonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An instantiated example flow
#[derive(Debug, Clone, Serialize)]
pub struct Skeleton {
    pub kind: SkeletonKind,
    pub description: String,
    pub nodes: Vec<Value>,
    pub edges: Vec<Value>,
}

/// Instantiate `kind` against the catalog.
///
/// Fails with `NotFound` when a recipe definition or input is missing.
pub fn build<L: DefinitionLookup + ?Sized>(
    kind: SkeletonKind,
    lookup: &L,
    resolver: &TypeResolver,
) -> Result<Skeleton> {
    let recipe = kind.recipe();

    let definitions: Vec<&Definition> = recipe
        .nodes
        .iter()
        .map(|name| lookup.definition(name).ok_or_else(|| SchemaError::not_found("definition", *name)))
        .collect::<Result<_>>()?;
    let ids: Vec<String> = definitions.iter().map(|d| instance_id(d, 0)).collect();

    let nodes = definitions
        .iter()
        .zip(&ids)
        .enumerate()
        .map(|(i, (def, id))| instantiate(def, id, (100.0 + 400.0 * i as f64, 100.0)))
        .collect();

    let mut edges = Vec::with_capacity(recipe.wires.len());
    for &(from, to, input) in recipe.wires {
        let (source, target) = (definitions[from], definitions[to]);
        let (source_id, target_id) = (&ids[from], &ids[to]);

        let (anchor, target_handle) = match input {
            Some(input_name) => {
                let field = target
                    .inputs
                    .find_root(input_name)
                    .ok_or_else(|| SchemaError::not_found("input", format!("{}.{}", target.name, input_name)))?;
                let required = field.input_type.as_str();
                let anchor = pick_anchor(source, required, resolver);
                (anchor, Handle::input(target_id, input_name, required))
            }
            None => (
                source.effective_outputs().remove(0),
                target_id.clone(),
            ),
        };
        let edge_kind = if source.flow_kind() == FlowKind::Agentflow && target.flow_kind() == FlowKind::Agentflow {
            FlowKind::Agentflow
        } else {
            FlowKind::Chatflow
        };
        let source_handle = match edge_kind {
            FlowKind::Agentflow => Handle::untyped_output(source_id, &anchor.name),
            FlowKind::Chatflow => Handle::output(source_id, &anchor.name, &anchor.base_classes),
        };

        edges.push(json!({
            "id": format!("{}-{}-{}-{}", source_id, source_handle, target_id, target_handle),
            "source": source_id,
            "sourceHandle": source_handle,
            "target": target_id,
            "targetHandle": target_handle,
            "type": edge_kind.edge_tag(),
        }));
    }

    Ok(Skeleton {
        kind,
        description: recipe.description.to_string(),
        nodes,
        edges,
    })
}

/// First output whose chain satisfies `required`, else the first output
fn pick_anchor(source: &Definition, required: &str, resolver: &TypeResolver) -> OutputAnchor {
    let mut outputs = source.effective_outputs();
    let at = outputs
        .iter()
        .position(|a| a.base_classes.iter().any(|t| resolver.is_compatible(t, required)))
        .unwrap_or(0);
    outputs.swap_remove(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        for kind in SkeletonKind::ALL {
            assert_eq!(kind.as_str().parse::<SkeletonKind>().unwrap(), kind);
        }
        assert!(matches!(
            "nope".parse::<SkeletonKind>(),
            Err(SchemaError::NotFound { kind: "skeleton", .. })
        ));
    }

    #[test]
    fn test_missing_definition() {
        let lookup: std::collections::HashMap<String, Definition> = std::collections::HashMap::new();
        let err = build(SkeletonKind::ConversationChain, &lookup, &TypeResolver::builtin()).unwrap_err();
        assert!(matches!(err, SchemaError::NotFound { kind: "definition", .. }));
    }
}
