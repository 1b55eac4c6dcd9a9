//! Flow Validation Tests
//!
//! Candidate flows checked against a catalog built from the fixture tree.

use std::path::{Path, PathBuf};

use flow_schemas::flow::{DiagnosticCode, Handle, SkeletonKind};
use flow_schemas::{
    Batch, CandidateEdge, CandidateFlow, CandidateNode, Catalog, ChainAuthority, Ingestor, Store,
};

fn fixtures_path() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").leak()
}

fn templates_path() -> PathBuf {
    fixtures_path().join("marketplaces")
}

fn catalog() -> Catalog {
    let report = Ingestor::default().ingest(&fixtures_path().join("nodes")).unwrap();
    let mut definitions = report.definitions;
    let templates = flow_schemas::templates::load_templates(&templates_path()).unwrap();
    flow_schemas::templates::enrich_base_classes(&mut definitions, &templates);

    let mut store = Store::in_memory().unwrap();
    store
        .replace_all(Batch {
            definitions: &definitions,
            templates: &templates,
            checksum: None,
        })
        .unwrap();
    Catalog::from_snapshot(store.load().unwrap(), ChainAuthority::Table, 20)
}

fn codes(items: &[flow_schemas::flow::DiagnosticItem]) -> Vec<DiagnosticCode> {
    items.iter().map(|i| i.code).collect()
}

// =============================================================================
// Compatibility
// =============================================================================

#[test]
fn test_every_known_type_is_reflexive() {
    let catalog = catalog();
    for def in catalog.definitions() {
        for anchor in def.effective_outputs() {
            for t in &anchor.base_classes {
                assert!(catalog.resolver().is_compatible(t, t), "{} should accept itself", t);
            }
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_missing_definition_is_a_single_error() {
    let catalog = catalog();
    let flow = CandidateFlow {
        nodes: vec![
            CandidateNode::new("chatOpenAI_0", "chatOpenAI"),
            CandidateNode::new("ghost_0", "ghostNode"),
        ],
        edges: Vec::new(),
    };

    let result = catalog.validate(&flow);
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, DiagnosticCode::MissingDefinition);
    assert_eq!(result.errors[0].message, "Node definition 'ghostNode' does not exist");
}

#[test]
fn test_typed_edges() {
    let catalog = catalog();
    let nodes = vec![
        CandidateNode::new("chatOpenAI_0", "chatOpenAI"),
        CandidateNode::new("bufferMemory_0", "bufferMemory"),
        CandidateNode::new("conversationChain_0", "conversationChain"),
    ];
    let chat = catalog.get("chatOpenAI").unwrap();
    let memory = catalog.get("bufferMemory").unwrap();

    let good = CandidateFlow {
        nodes: nodes.clone(),
        edges: vec![
            CandidateEdge::new("chatOpenAI_0", "conversationChain_0")
                .with_handles(
                    Handle::output("chatOpenAI_0", "chatOpenAI", &chat.base_classes),
                    Handle::input("conversationChain_0", "model", "BaseChatModel"),
                )
                .with_type("buttonedge"),
            CandidateEdge::new("bufferMemory_0", "conversationChain_0").with_handles(
                Handle::output("bufferMemory_0", "bufferMemory", &memory.base_classes),
                Handle::input("conversationChain_0", "memory", "BaseMemory"),
            ),
        ],
    };
    let result = catalog.validate(&good);
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.warnings.is_empty());

    // memory wired into the model slot
    let crossed = CandidateFlow {
        nodes,
        edges: vec![CandidateEdge::new("bufferMemory_0", "conversationChain_0").with_handles(
            Handle::output("bufferMemory_0", "bufferMemory", &memory.base_classes),
            Handle::input("conversationChain_0", "model", "BaseChatModel"),
        )],
    };
    let result = catalog.validate(&crossed);
    assert!(!result.valid);
    assert_eq!(codes(&result.errors), vec![DiagnosticCode::TypeMismatch]);
}

#[test]
fn test_mixed_canvas_is_a_warning() {
    let catalog = catalog();
    let flow = CandidateFlow {
        nodes: vec![
            CandidateNode::new("startAgentflow_0", "startAgentflow"),
            CandidateNode::new("conversationChain_0", "conversationChain"),
        ],
        edges: vec![CandidateEdge::new("startAgentflow_0", "conversationChain_0")],
    };

    let result = catalog.validate(&flow);
    assert!(result.valid);
    assert_eq!(codes(&result.warnings), vec![DiagnosticCode::FlowKindMismatch]);
}

#[test]
fn test_wrong_edge_tag() {
    let catalog = catalog();
    let flow = CandidateFlow {
        nodes: vec![
            CandidateNode::new("startAgentflow_0", "startAgentflow"),
            CandidateNode::new("llmAgentflow_0", "llmAgentflow"),
        ],
        edges: vec![CandidateEdge::new("startAgentflow_0", "llmAgentflow_0").with_type("buttonedge")],
    };

    let result = catalog.validate(&flow);
    assert!(result.valid);
    assert_eq!(codes(&result.warnings), vec![DiagnosticCode::EdgeTagMismatch]);
}

#[test]
fn test_dangling_edge() {
    let catalog = catalog();
    let flow = CandidateFlow {
        nodes: vec![CandidateNode::new("chatOpenAI_0", "chatOpenAI")],
        edges: vec![CandidateEdge::new("chatOpenAI_0", "nowhere_0")],
    };

    let result = catalog.validate(&flow);
    assert!(!result.valid);
    assert_eq!(codes(&result.errors), vec![DiagnosticCode::UnknownEndpoint]);
}

#[test]
fn test_template_graph_validates() {
    let catalog = catalog();
    let template = catalog.template("Conversation Chain").unwrap();
    let flow: CandidateFlow = serde_json::from_value(serde_json::json!({
        "nodes": template.nodes,
        "edges": template.edges,
    }))
    .unwrap();

    let result = catalog.validate(&flow);
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[test]
fn test_agentflow_template_validates() {
    let catalog = catalog();
    let template = catalog.template("Simple LLM").unwrap();
    let flow: CandidateFlow = serde_json::from_value(serde_json::json!({
        "nodes": template.nodes,
        "edges": template.edges,
    }))
    .unwrap();

    let result = catalog.validate(&flow);
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[test]
fn test_candidate_file_format() {
    let catalog = catalog();
    let raw = r#"{
        "nodes": [
            { "id": "calculator_0", "data": { "name": "calculator" } },
            { "id": "toolAgent_0", "data": { "name": "toolAgent" } }
        ],
        "edges": [
            {
                "source": "calculator_0",
                "target": "toolAgent_0",
                "sourceHandle": "calculator_0-output-calculator-Calculator|Tool|StructuredTool|Runnable",
                "targetHandle": "toolAgent_0-input-tools-Tool",
                "type": "buttonedge"
            }
        ]
    }"#;
    let flow: CandidateFlow = serde_json::from_str(raw).unwrap();
    assert!(catalog.validate(&flow).valid);
}

// =============================================================================
// Skeletons
// =============================================================================

#[test]
fn test_skeletons_validate() {
    let catalog = catalog();
    for kind in SkeletonKind::ALL {
        let skeleton = catalog.skeleton(kind).unwrap();
        let flow: CandidateFlow = serde_json::from_value(serde_json::json!({
            "nodes": skeleton.nodes,
            "edges": skeleton.edges,
        }))
        .unwrap();

        let result = catalog.validate(&flow);
        assert!(result.valid, "{} skeleton: {:?}", kind, result.errors);
        assert!(result.warnings.is_empty(), "{} skeleton: {:?}", kind, result.warnings);
        assert_eq!(flow.nodes.len(), skeleton.nodes.len());
    }
}

#[test]
fn test_skeleton_edges() {
    let catalog = catalog();
    let skeleton = catalog.skeleton(SkeletonKind::RetrievalQa).unwrap();
    assert_eq!(skeleton.nodes.len(), 4);
    assert_eq!(skeleton.edges.len(), 3);

    let retriever = skeleton
        .edges
        .iter()
        .find(|e| e["targetHandle"] == "conversationalRetrievalQAChain_0-input-vectorStoreRetriever-BaseRetriever")
        .unwrap();
    assert_eq!(retriever["source"], "memoryVectorStore_0");
    assert!(retriever["sourceHandle"]
        .as_str()
        .unwrap()
        .starts_with("memoryVectorStore_0-output-retriever-"));
    assert_eq!(retriever["type"], "buttonedge");
}

#[test]
fn test_agentflow_skeleton_matches_template_wiring() {
    let catalog = catalog();
    let skeleton = catalog.skeleton(SkeletonKind::AgentflowBasic).unwrap();
    let template = catalog.template("Simple LLM").unwrap();

    assert_eq!(skeleton.edges.len(), 1);
    let edge = &skeleton.edges[0];
    assert_eq!(edge["sourceHandle"], template.edges[0]["sourceHandle"]);
    assert_eq!(edge["targetHandle"], template.edges[0]["targetHandle"]);
    assert_eq!(edge["type"], "agentFlow");
}

#[test]
fn test_unknown_skeleton() {
    assert!("fancy_flow".parse::<SkeletonKind>().is_err());
    assert_eq!("tool_agent".parse::<SkeletonKind>().unwrap(), SkeletonKind::ToolAgent);
}

#[test]
fn test_skeleton_needs_its_definitions() {
    let catalog = Catalog::from_snapshot(Default::default(), ChainAuthority::Table, 20);
    assert!(catalog.skeleton(SkeletonKind::ConversationChain).is_err());
}
