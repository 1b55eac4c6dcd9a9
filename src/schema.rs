//! Normalized schema types
//!
//! A [`Definition`] owns its input fields through an [`InputArena`]: slots are
//! appended in document pre-order, so every parent precedes its children and
//! parent links are plain indices known before anything is persisted.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input field type discriminator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InputType {
    String,
    Number,
    Boolean,
    Password,
    Json,
    Code,
    File,
    Date,
    Options,
    MultiOptions,
    AsyncOptions,
    AsyncMultiOptions,
    Array,
    Tabs,
    Datagrid,
    Credential,
    /// Connector to another definition's output, named by type
    Reference(String),
}

impl InputType {
    pub fn parse(s: &str) -> Self {
        match s {
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "password" => Self::Password,
            "json" => Self::Json,
            "code" => Self::Code,
            "file" => Self::File,
            "date" => Self::Date,
            "options" => Self::Options,
            "multiOptions" => Self::MultiOptions,
            "asyncOptions" => Self::AsyncOptions,
            "asyncMultiOptions" => Self::AsyncMultiOptions,
            "array" => Self::Array,
            "tabs" => Self::Tabs,
            "datagrid" => Self::Datagrid,
            "credential" => Self::Credential,
            other => Self::Reference(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Password => "password",
            Self::Json => "json",
            Self::Code => "code",
            Self::File => "file",
            Self::Date => "date",
            Self::Options => "options",
            Self::MultiOptions => "multiOptions",
            Self::AsyncOptions => "asyncOptions",
            Self::AsyncMultiOptions => "asyncMultiOptions",
            Self::Array => "array",
            Self::Tabs => "tabs",
            Self::Datagrid => "datagrid",
            Self::Credential => "credential",
            Self::Reference(name) => name,
        }
    }

    /// Structural kinds own child fields
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Array | Self::Tabs)
    }

    /// Selection kinds own options
    pub fn is_selection(&self) -> bool {
        matches!(
            self,
            Self::Options | Self::MultiOptions | Self::AsyncOptions | Self::AsyncMultiOptions
        )
    }

    pub fn is_connector(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    /// Key holding the child array of a structural field
    pub fn child_key(&self) -> Option<&'static str> {
        match self {
            Self::Array => Some("array"),
            Self::Tabs => Some("tabs"),
            _ => None,
        }
    }
}

impl From<String> for InputType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<InputType> for String {
    fn from(t: InputType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a visibility predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Flag(bool),
    Text(String),
    List(Vec<String>),
}

/// Field name -> expected value(s)
pub type Condition = BTreeMap<String, ConditionValue>;

/// A selectable option of a selection-kind field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputOption {
    pub label: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// One configuration slot on a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub input_type: InputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub additional_params: bool,
    #[serde(default)]
    pub free_solo: bool,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub refresh: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_method: Option<String>,
    #[serde(default)]
    pub accept_variable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_identifier: Option<String>,
    #[serde(default)]
    pub generate_instruction: bool,
    #[serde(default)]
    pub generate_doc_store_description: bool,
    #[serde(default)]
    pub hide_code_execute: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide: Option<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<InputOption>,
}

impl InputField {
    pub fn new(name: impl Into<String>, label: impl Into<String>, input_type: InputType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            input_type,
            description: None,
            placeholder: None,
            default_value: None,
            optional: false,
            hidden: false,
            additional_params: false,
            free_solo: false,
            list: false,
            refresh: false,
            rows: None,
            step: None,
            warning: None,
            load_method: None,
            accept_variable: false,
            file_type: None,
            tab_identifier: None,
            generate_instruction: false,
            generate_doc_store_description: false,
            hide_code_execute: false,
            show: None,
            hide: None,
            options: Vec::new(),
        }
    }

    /// Drop attributes that only make sense on leaf fields.
    pub fn clear_leaf_only(&mut self) {
        self.rows = None;
        self.placeholder = None;
        self.generate_instruction = false;
        self.generate_doc_store_description = false;
        self.hide_code_execute = false;
    }
}

/// Index of a slot in an [`InputArena`]
pub type FieldIdx = usize;

/// A field plus its position in the tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSlot {
    pub parent: Option<FieldIdx>,
    pub sort_order: u32,
    pub field: InputField,
}

/// Input fields of one definition, in document pre-order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputArena {
    slots: Vec<FieldSlot>,
}

impl InputArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field under `parent` (or at top level) and return its index.
    ///
    /// The sort key is the number of siblings already present, so it restarts
    /// at zero under every parent.
    ///
    /// # Panics
    /// If `parent` is not an existing slot or is not a structural kind.
    pub fn push(&mut self, parent: Option<FieldIdx>, field: InputField) -> FieldIdx {
        if let Some(p) = parent {
            assert!(
                self.slots[p].field.input_type.is_structural(),
                "only array/tabs fields may own children"
            );
        }
        let sort_order = self.slots.iter().filter(|s| s.parent == parent).count() as u32;
        self.slots.push(FieldSlot {
            parent,
            sort_order,
            field,
        });
        self.slots.len() - 1
    }

    pub fn get(&self, idx: FieldIdx) -> Option<&FieldSlot> {
        self.slots.get(idx)
    }

    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Children of `parent` (top-level fields for `None`), in sibling order
    pub fn children(&self, parent: Option<FieldIdx>) -> impl Iterator<Item = FieldIdx> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.parent == parent)
            .map(|(i, _)| i)
    }

    pub fn roots(&self) -> impl Iterator<Item = &InputField> + '_ {
        self.children(None).map(move |i| &self.slots[i].field)
    }

    pub fn find_root(&self, name: &str) -> Option<&InputField> {
        self.roots().find(|f| f.name == name)
    }

    /// Nesting depth of a slot; top-level fields are depth 0
    pub fn depth(&self, idx: FieldIdx) -> usize {
        let mut depth = 0;
        let mut cursor = self.slots[idx].parent;
        while let Some(p) = cursor {
            depth += 1;
            cursor = self.slots[p].parent;
        }
        depth
    }

    /// Nested JSON view of the tree, children under each structural field's
    /// child key.
    pub fn to_tree(&self) -> Vec<Value> {
        self.children(None).map(|i| self.subtree(i)).collect()
    }

    fn subtree(&self, idx: FieldIdx) -> Value {
        let slot = &self.slots[idx];
        let mut value = serde_json::to_value(&slot.field).unwrap_or(Value::Null);
        if let (Some(key), Value::Object(map)) = (slot.field.input_type.child_key(), &mut value) {
            let children: Vec<Value> = self.children(Some(idx)).map(|c| self.subtree(c)).collect();
            map.insert(key.to_string(), Value::Array(children));
        }
        value
    }
}

/// A typed connection point a definition exposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputAnchor {
    pub name: String,
    pub label: String,
    pub base_classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub is_anchor: bool,
}

impl OutputAnchor {
    /// Separator used in human-readable type chains
    pub const CHAIN_SEPARATOR: &'static str = " | ";

    /// The single anchor synthesized for definitions declaring none
    pub fn mirror_of(definition: &Definition) -> Self {
        Self {
            name: definition.name.clone(),
            label: definition.label.clone(),
            base_classes: definition.base_classes.clone(),
            description: None,
            hidden: false,
            is_anchor: false,
        }
    }

    pub fn type_chain(&self) -> String {
        self.base_classes.join(Self::CHAIN_SEPARATOR)
    }
}

/// Credential requirement of a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSpec {
    pub label: String,
    pub name: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub credential_names: Vec<String>,
    #[serde(default)]
    pub optional: bool,
}

/// Which canvas a definition belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Chatflow,
    Agentflow,
}

impl FlowKind {
    pub const AGENTFLOW_CATEGORY: &'static str = "Agent Flows";

    pub fn classify(name: &str, category: &str) -> Self {
        if category == Self::AGENTFLOW_CATEGORY || name.ends_with("Agentflow") {
            Self::Agentflow
        } else {
            Self::Chatflow
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chatflow" => Some(Self::Chatflow),
            "agentflow" => Some(Self::Agentflow),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chatflow => "chatflow",
            Self::Agentflow => "agentflow",
        }
    }

    /// Edge type tag expected between nodes of this kind
    pub fn edge_tag(&self) -> &'static str {
        match self {
            Self::Chatflow => "buttonedge",
            Self::Agentflow => "agentFlow",
        }
    }

    /// Canvas node type for instances of this kind
    pub fn node_tag(&self) -> &'static str {
        match self {
            Self::Chatflow => "customNode",
            Self::Agentflow => "agentFlow",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, versioned component declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub name: String,
    pub label: String,
    pub version: f64,
    #[serde(rename = "type")]
    pub node_type: String,
    pub category: String,
    pub description: String,
    pub base_classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecate_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default)]
    pub inputs: InputArena,
    #[serde(default)]
    pub outputs: Vec<OutputAnchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<CredentialSpec>,
}

impl Definition {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            version: 1.0,
            node_type: String::new(),
            category: String::new(),
            description: String::new(),
            base_classes: Vec::new(),
            color: None,
            icon: None,
            hint: None,
            badge: None,
            deprecate_message: None,
            author: None,
            tags: Vec::new(),
            file_path: None,
            inputs: InputArena::new(),
            outputs: Vec::new(),
            credential: None,
        }
    }

    pub fn flow_kind(&self) -> FlowKind {
        FlowKind::classify(&self.name, &self.category)
    }

    /// Top-level connector inputs (typed references to other outputs)
    pub fn connector_inputs(&self) -> impl Iterator<Item = &InputField> + '_ {
        self.inputs.roots().filter(|f| f.input_type.is_connector())
    }

    /// Declared outputs, or the synthesized mirror anchor when none exist
    pub fn effective_outputs(&self) -> Vec<OutputAnchor> {
        if self.outputs.is_empty() {
            vec![OutputAnchor::mirror_of(self)]
        } else {
            self.outputs.clone()
        }
    }
}

/// Distinct definition category with member count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub count: usize,
}

/// An opaque pre-built example graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowTemplate {
    pub name: String,
    pub description: String,
    pub kind: String,
    pub nodes: Value,
    pub edges: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub use_cases: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_type_round_trip_names() {
        for name in ["string", "asyncOptions", "array", "tabs", "credential", "BaseChatModel"] {
            assert_eq!(InputType::parse(name).as_str(), name);
        }
        assert!(InputType::parse("BaseCache").is_connector());
        assert!(InputType::Array.is_structural());
        assert!(!InputType::Datagrid.is_structural());
        assert!(InputType::MultiOptions.is_selection());
    }

    #[test]
    fn test_arena_sort_order_restarts_per_parent() {
        let mut arena = InputArena::new();
        let a = arena.push(None, InputField::new("a", "A", InputType::String));
        let list = arena.push(None, InputField::new("list", "List", InputType::Array));
        let c0 = arena.push(Some(list), InputField::new("c0", "C0", InputType::String));
        let c1 = arena.push(Some(list), InputField::new("c1", "C1", InputType::Number));

        assert_eq!(arena.get(a).unwrap().sort_order, 0);
        assert_eq!(arena.get(list).unwrap().sort_order, 1);
        assert_eq!(arena.get(c0).unwrap().sort_order, 0);
        assert_eq!(arena.get(c1).unwrap().sort_order, 1);
        assert_eq!(arena.children(Some(list)).collect::<Vec<_>>(), vec![c0, c1]);
        assert_eq!(arena.depth(c1), 1);

        let tree = arena.to_tree();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[1]["array"].as_array().unwrap().len(), 2);
    }

    #[test]
    #[should_panic(expected = "only array/tabs")]
    fn test_arena_rejects_leaf_parent() {
        let mut arena = InputArena::new();
        let leaf = arena.push(None, InputField::new("a", "A", InputType::String));
        arena.push(Some(leaf), InputField::new("b", "B", InputType::String));
    }

    #[test]
    fn test_flow_kind_classification() {
        assert_eq!(FlowKind::classify("llmAgentflow", "Agent Flows"), FlowKind::Agentflow);
        assert_eq!(FlowKind::classify("startAgentflow", ""), FlowKind::Agentflow);
        assert_eq!(FlowKind::classify("chatOpenAI", "Chat Models"), FlowKind::Chatflow);
    }

    #[test]
    fn test_mirror_output_anchor() {
        let mut def = Definition::new("bufferMemory", "Buffer Memory");
        def.base_classes = vec!["BufferMemory".into(), "BaseMemory".into()];
        let outputs = def.effective_outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].type_chain(), "BufferMemory | BaseMemory");
    }
}
