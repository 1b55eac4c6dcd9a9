//! Flow template corpus
//!
//! Example graphs live as one JSON file each, grouped by kind directory
//! (`chatflows/`, `agentflows/`, ...). Templates are stored opaque; the only
//! thing read out of them is each node's `data.name` / `data.baseClasses`,
//! used to enrich definitions whose declared chain is shorter.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, SchemaError};
use crate::schema::{Definition, FlowTemplate};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateFile {
    #[serde(default)]
    description: String,
    #[serde(default, alias = "usecases")]
    use_cases: Vec<String>,
    #[serde(default)]
    nodes: Value,
    #[serde(default)]
    edges: Value,
}

/// Parse one template document
pub fn parse_template(name: &str, kind: &str, content: &str) -> Result<FlowTemplate> {
    let file: TemplateFile = serde_json::from_str(content)?;
    if !file.nodes.is_array() {
        return Err(SchemaError::InvalidFormat(format!("template '{}' has no nodes array", name)));
    }
    Ok(FlowTemplate {
        name: name.to_string(),
        description: file.description,
        kind: kind.to_string(),
        nodes: file.nodes,
        edges: if file.edges.is_null() { Value::Array(Vec::new()) } else { file.edges },
        use_cases: file.use_cases,
    })
}

/// Load every `*.json` under `root`. The kind is the file's parent directory
/// name; unreadable files are skipped with a warning.
pub fn load_templates(root: &Path) -> Result<Vec<FlowTemplate>> {
    if !root.is_dir() {
        return Err(SchemaError::not_found("template directory", root.display().to_string()));
    }

    let mut templates = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        let name = match path.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => continue,
        };
        let kind = path
            .parent()
            .filter(|p| *p != root)
            .and_then(|p| p.file_name())
            .map(|k| k.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chatflows".to_string());

        let parsed = fs::read_to_string(path)
            .map_err(SchemaError::from)
            .and_then(|content| parse_template(&name, &kind, &content));
        match parsed {
            Ok(template) => {
                debug!(name = %template.name, kind = %template.kind, "loaded template");
                templates.push(template);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping template"),
        }
    }

    info!(count = templates.len(), root = %root.display(), "templates loaded");
    Ok(templates)
}

/// Longest base-class chain observed per definition name across template nodes
pub fn observed_chains(templates: &[FlowTemplate]) -> HashMap<String, Vec<String>> {
    let mut chains: HashMap<String, Vec<String>> = HashMap::new();
    for template in templates {
        let Some(nodes) = template.nodes.as_array() else {
            continue;
        };
        for node in nodes {
            let data = &node["data"];
            let Some(name) = data["name"].as_str() else {
                continue;
            };
            let Some(classes) = data["baseClasses"].as_array() else {
                continue;
            };
            let chain: Vec<String> = classes.iter().filter_map(|c| c.as_str().map(str::to_string)).collect();
            let longest = chains.entry(name.to_string()).or_default();
            if chain.len() > longest.len() {
                *longest = chain;
            }
        }
    }
    chains
}

/// Replace each definition's base classes with a strictly longer observed
/// chain. Output anchors that mirrored the old chain follow it. Returns the
/// number of definitions changed.
pub fn enrich_base_classes(definitions: &mut [Definition], templates: &[FlowTemplate]) -> usize {
    let chains = observed_chains(templates);
    let mut enriched = 0;
    for def in definitions.iter_mut() {
        let Some(chain) = chains.get(&def.name) else {
            continue;
        };
        if chain.len() <= def.base_classes.len() {
            continue;
        }
        for anchor in def.outputs.iter_mut().filter(|a| a.base_classes == def.base_classes) {
            anchor.base_classes = chain.clone();
        }
        debug!(definition = %def.name, from = def.base_classes.len(), to = chain.len(), "enriched base classes");
        def.base_classes = chain.clone();
        enriched += 1;
    }
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OutputAnchor;

    const TEMPLATE: &str = r#"{
        "description": "Basic conversation",
        "usecases": ["Chatbot"],
        "nodes": [
            { "id": "chatOpenAI_0", "data": { "name": "chatOpenAI", "baseClasses": ["ChatOpenAI", "BaseChatModel", "BaseLanguageModel", "Runnable"] } },
            { "id": "bufferMemory_0", "data": { "name": "bufferMemory", "baseClasses": ["BufferMemory"] } }
        ],
        "edges": []
    }"#;

    #[test]
    fn test_parse_template() {
        let template = parse_template("Conversation", "chatflows", TEMPLATE).unwrap();
        assert_eq!(template.description, "Basic conversation");
        assert_eq!(template.use_cases, vec!["Chatbot"]);
        assert_eq!(template.nodes.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_rejects_missing_nodes() {
        assert!(matches!(
            parse_template("x", "chatflows", r#"{"description": "x"}"#),
            Err(SchemaError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_enrich_only_when_strictly_longer() {
        let template = parse_template("Conversation", "chatflows", TEMPLATE).unwrap();

        let mut model = Definition::new("chatOpenAI", "ChatOpenAI");
        model.base_classes = vec!["ChatOpenAI".into(), "BaseChatModel".into()];
        model.outputs = vec![OutputAnchor::mirror_of(&model)];

        let mut memory = Definition::new("bufferMemory", "Buffer Memory");
        memory.base_classes = vec!["BufferMemory".into(), "BaseMemory".into()];

        let mut defs = vec![model, memory];
        assert_eq!(enrich_base_classes(&mut defs, &[template]), 1);
        assert_eq!(defs[0].base_classes.len(), 4);
        assert_eq!(defs[0].outputs[0].base_classes.len(), 4);
        assert_eq!(defs[1].base_classes, vec!["BufferMemory", "BaseMemory"]);
    }

    #[test]
    fn test_load_kind_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let chatflows = dir.path().join("chatflows");
        fs::create_dir_all(&chatflows).unwrap();
        fs::write(chatflows.join("Conversation.json"), TEMPLATE).unwrap();
        fs::write(chatflows.join("Broken.json"), "{ nope").unwrap();

        let templates = load_templates(dir.path()).unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].kind, "chatflows");
        assert_eq!(templates[0].name, "Conversation");
    }
}
