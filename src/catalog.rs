//! Query context
//!
//! One immutable [`Catalog`] is built from a loaded store at startup and
//! passed to every query. Nothing here writes.

use std::collections::HashMap;
use std::path::Path;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;
use serde_json::Value;

use crate::compat::{ChainAuthority, TypeResolver};
use crate::config::FlowSchemasConfig;
use crate::error::{Result, SchemaError};
use crate::flow::instance::{instance_id, instantiate};
use crate::flow::skeleton::{self, Skeleton, SkeletonKind};
use crate::flow::validate::{CandidateFlow, DefinitionLookup, FlowValidator, ValidationResult};
use crate::schema::{Category, Definition, FlowKind, FlowTemplate};
use crate::store::{Snapshot, Store};

/// Listing entry for a definition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionSummary {
    pub name: String,
    pub label: String,
    pub category: String,
    pub description: String,
    pub version: f64,
    pub flow_kind: FlowKind,
    pub base_classes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
}

impl DefinitionSummary {
    fn of(def: &Definition, score: Option<i64>) -> Self {
        Self {
            name: def.name.clone(),
            label: def.label.clone(),
            category: def.category.clone(),
            description: def.description.clone(),
            version: def.version,
            flow_kind: def.flow_kind(),
            base_classes: def.base_classes.clone(),
            score,
        }
    }
}

/// Listing entry for a template
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummary {
    pub name: String,
    pub kind: String,
    pub description: String,
    pub node_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub use_cases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
}

impl TemplateSummary {
    fn of(template: &FlowTemplate, score: Option<i64>) -> Self {
        Self {
            name: template.name.clone(),
            kind: template.kind.clone(),
            description: template.description.clone(),
            node_count: template.nodes.as_array().map(Vec::len).unwrap_or(0),
            use_cases: template.use_cases.clone(),
            score,
        }
    }
}

/// One possible connection between an output anchor and a connector input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibleLink {
    /// The other definition
    pub definition: String,
    pub label: String,
    pub category: String,
    /// Output anchor on the source side
    pub output: String,
    /// Connector input on the target side
    pub input: String,
    /// Type the input requires
    pub input_type: String,
}

/// Read-only snapshot plus everything derived from it
pub struct Catalog {
    definitions: Vec<Definition>,
    by_name: HashMap<String, usize>,
    categories: Vec<Category>,
    templates: Vec<FlowTemplate>,
    resolver: TypeResolver,
    search_limit: usize,
    generated_at: Option<String>,
    checksum: Option<String>,
}

impl DefinitionLookup for Catalog {
    fn definition(&self, name: &str) -> Option<&Definition> {
        self.by_name.get(name).map(|&i| &self.definitions[i])
    }
}

impl Catalog {
    pub fn from_snapshot(snapshot: Snapshot, authority: ChainAuthority, search_limit: usize) -> Self {
        let resolver = TypeResolver::from_definitions(&snapshot.definitions, authority);
        let by_name = snapshot
            .definitions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();
        Self {
            definitions: snapshot.definitions,
            by_name,
            categories: snapshot.categories,
            templates: snapshot.templates,
            resolver,
            search_limit,
            generated_at: snapshot.generated_at,
            checksum: snapshot.checksum,
        }
    }

    /// Load the store named by `config`; a missing store is fatal.
    pub fn open(config: &FlowSchemasConfig) -> Result<Self> {
        Self::open_path(&config.store_path(), config.compat.authority, config.query.search_limit)
    }

    pub fn open_path(path: &Path, authority: ChainAuthority, search_limit: usize) -> Result<Self> {
        let snapshot = Store::open(path)?.load()?;
        Ok(Self::from_snapshot(snapshot, authority, search_limit))
    }

    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    pub fn generated_at(&self) -> Option<&str> {
        self.generated_at.as_deref()
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    // === Definitions ===

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// All definitions, or those in `category`, sorted by name
    pub fn list(&self, category: Option<&str>) -> Vec<DefinitionSummary> {
        let mut out: Vec<DefinitionSummary> = self
            .definitions
            .iter()
            .filter(|d| category.map(|c| d.category.eq_ignore_ascii_case(c)).unwrap_or(true))
            .map(|d| DefinitionSummary::of(d, None))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Fuzzy search over name, label and category, best score first
    pub fn search(&self, query: &str) -> Vec<DefinitionSummary> {
        let matcher = SkimMatcherV2::default();
        let mut results: Vec<(i64, &Definition)> = self
            .definitions
            .iter()
            .filter_map(|d| {
                [d.name.as_str(), d.label.as_str(), d.category.as_str()]
                    .iter()
                    .filter_map(|field| matcher.fuzzy_match(field, query))
                    .max()
                    .map(|score| (score, d))
            })
            .collect();

        results.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));
        results
            .into_iter()
            .take(self.search_limit)
            .map(|(score, d)| DefinitionSummary::of(d, Some(score)))
            .collect()
    }

    pub fn get(&self, name: &str) -> Result<&Definition> {
        self.definition(name)
            .ok_or_else(|| SchemaError::not_found("definition", name))
    }

    /// Ready-to-instantiate node object for `name`
    pub fn instance(&self, name: &str, id: Option<&str>) -> Result<Value> {
        let def = self.get(name)?;
        let id = id.map(str::to_string).unwrap_or_else(|| instance_id(def, 0));
        Ok(instantiate(def, &id, (0.0, 0.0)))
    }

    // === Templates ===

    pub fn templates(&self, kind: Option<&str>) -> Vec<TemplateSummary> {
        self.templates
            .iter()
            .filter(|t| kind.map(|k| t.kind == k).unwrap_or(true))
            .map(|t| TemplateSummary::of(t, None))
            .collect()
    }

    pub fn template(&self, name: &str) -> Result<&FlowTemplate> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SchemaError::not_found("template", name))
    }

    pub fn search_templates(&self, query: &str) -> Vec<TemplateSummary> {
        let matcher = SkimMatcherV2::default();
        let mut results: Vec<(i64, &FlowTemplate)> = self
            .templates
            .iter()
            .filter_map(|t| {
                std::iter::once(t.name.as_str())
                    .chain(std::iter::once(t.description.as_str()))
                    .chain(t.use_cases.iter().map(String::as_str))
                    .filter_map(|field| matcher.fuzzy_match(field, query))
                    .max()
                    .map(|score| (score, t))
            })
            .collect();

        results.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));
        results
            .into_iter()
            .take(self.search_limit)
            .map(|(score, t)| TemplateSummary::of(t, Some(score)))
            .collect()
    }

    // === Compatibility ===

    /// Every (definition, connector input) that one of `name`'s outputs can feed
    pub fn compatible_targets(&self, name: &str) -> Result<Vec<CompatibleLink>> {
        let source = self.get(name)?;
        let outputs = source.effective_outputs();
        let mut links = Vec::new();

        for target in self.definitions.iter().filter(|d| d.name != source.name) {
            for input in target.connector_inputs() {
                let required = input.input_type.as_str();
                let anchor = outputs
                    .iter()
                    .find(|a| a.base_classes.iter().any(|t| self.resolver.is_compatible(t, required)));
                if let Some(anchor) = anchor {
                    links.push(CompatibleLink {
                        definition: target.name.clone(),
                        label: target.label.clone(),
                        category: target.category.clone(),
                        output: anchor.name.clone(),
                        input: input.name.clone(),
                        input_type: required.to_string(),
                    });
                }
            }
        }
        Ok(links)
    }

    /// Every (definition, output anchor) satisfying one of `name`'s connector inputs
    pub fn compatible_sources(&self, name: &str) -> Result<Vec<CompatibleLink>> {
        let target = self.get(name)?;
        let mut links = Vec::new();

        for input in target.connector_inputs() {
            let required = input.input_type.as_str();
            for source in self.definitions.iter().filter(|d| d.name != target.name) {
                for anchor in source.effective_outputs() {
                    if anchor.base_classes.iter().any(|t| self.resolver.is_compatible(t, required)) {
                        links.push(CompatibleLink {
                            definition: source.name.clone(),
                            label: source.label.clone(),
                            category: source.category.clone(),
                            output: anchor.name,
                            input: input.name.clone(),
                            input_type: required.to_string(),
                        });
                    }
                }
            }
        }
        Ok(links)
    }

    pub fn types_accepted_by(&self, output_type: &str) -> Vec<String> {
        self.resolver.types_accepted_by(output_type)
    }

    pub fn types_that_satisfy(&self, input_type: &str) -> Vec<String> {
        self.resolver.types_that_satisfy(input_type)
    }

    // === Flows ===

    pub fn validate(&self, flow: &CandidateFlow) -> ValidationResult {
        FlowValidator::new(self, &self.resolver).validate(flow)
    }

    pub fn skeleton(&self, kind: SkeletonKind) -> Result<Skeleton> {
        skeleton::build(kind, self, &self.resolver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{InputArena, InputField, InputType};

    fn definition(name: &str, category: &str, chain: &[&str], inputs: &[(&str, &str)]) -> Definition {
        let mut def = Definition::new(name, name);
        def.category = category.to_string();
        def.node_type = chain[0].to_string();
        def.base_classes = chain.iter().map(|s| s.to_string()).collect();
        let mut arena = InputArena::new();
        for (input, ty) in inputs {
            arena.push(None, InputField::new(*input, *input, InputType::parse(ty)));
        }
        def.inputs = arena;
        def
    }

    fn catalog() -> Catalog {
        let snapshot = Snapshot {
            definitions: vec![
                definition("chatOpenAI", "Chat Models", &["ChatOpenAI", "BaseChatModel"], &[("cache", "BaseCache")]),
                definition("bufferMemory", "Memory", &["BufferMemory", "BaseMemory"], &[]),
                definition(
                    "conversationChain",
                    "Chains",
                    &["ConversationChain", "BaseChain"],
                    &[("model", "BaseChatModel"), ("memory", "BaseMemory"), ("systemMessage", "string")],
                ),
            ],
            categories: vec![Category { name: "Chains".into(), count: 1 }],
            ..Default::default()
        };
        Catalog::from_snapshot(snapshot, ChainAuthority::Table, 2)
    }

    #[test]
    fn test_list_and_get() {
        let catalog = catalog();
        assert_eq!(catalog.list(None).len(), 3);
        assert_eq!(catalog.list(Some("memory")).len(), 1);
        assert!(catalog.get("bufferMemory").is_ok());
        assert!(matches!(
            catalog.get("nope"),
            Err(SchemaError::NotFound { kind: "definition", .. })
        ));
    }

    #[test]
    fn test_search_limit_and_order() {
        let catalog = catalog();
        let results = catalog.search("chat");
        assert!(results.len() <= 2);
        assert_eq!(results[0].name, "chatOpenAI");
    }

    #[test]
    fn test_compatible_neighbors() {
        let catalog = catalog();

        let targets = catalog.compatible_targets("chatOpenAI").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].definition, "conversationChain");
        assert_eq!(targets[0].input, "model");

        let sources = catalog.compatible_sources("conversationChain").unwrap();
        let names: Vec<&str> = sources.iter().map(|l| l.definition.as_str()).collect();
        assert_eq!(names, vec!["chatOpenAI", "bufferMemory"]);
    }

    #[test]
    fn test_instance_default_id() {
        let catalog = catalog();
        let node = catalog.instance("conversationChain", None).unwrap();
        assert_eq!(node["id"], "conversationChain_0");
        let node = catalog.instance("conversationChain", Some("cc")).unwrap();
        assert_eq!(node["data"]["inputAnchors"][0]["id"], "cc-input-model-BaseChatModel");
    }
}
