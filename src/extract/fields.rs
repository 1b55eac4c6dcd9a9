//! Field extraction
//!
//! Refines a parsed object literal into typed [`FieldValue`]s, then into
//! schema types. Lookups only see the literal's own top-level keys.

use serde_json::Value;
use tracing::debug;

use super::literal::{Literal, ObjectLiteral};
use crate::schema::{
    Condition, ConditionValue, CredentialSpec, FieldIdx, InputArena, InputField, InputOption,
    InputType, OutputAnchor,
};

/// A scalar field value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Bool(bool),
}

/// One extracted field, refined from an untyped literal
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Scalar),
    StringList(Vec<String>),
    /// `show` / `hide` visibility predicates
    ConditionalMap(Condition),
    /// Nested object literals (structural children, options, anchors)
    ChildList(Vec<ObjectLiteral>),
    /// Any other literal container, kept as JSON (object defaults, mixed arrays)
    Structured(Value),
}

impl FieldValue {
    /// Refine a literal under `key`. Opaque expressions and nulls yield `None`.
    pub fn refine(key: &str, literal: &Literal) -> Option<Self> {
        match literal {
            Literal::Str(s) => Some(Self::Scalar(Scalar::Text(s.clone()))),
            Literal::Num(n) => Some(Self::Scalar(Scalar::Number(*n))),
            Literal::Bool(b) => Some(Self::Scalar(Scalar::Bool(*b))),
            Literal::Null | Literal::Expr(_) => None,
            Literal::Object(obj) if key == "show" || key == "hide" => {
                Some(Self::ConditionalMap(condition_from(obj)))
            }
            Literal::Array(items) => {
                if items.iter().all(|i| matches!(i, Literal::Str(_))) {
                    Some(Self::StringList(literal.string_items()))
                } else if items.iter().all(|i| matches!(i, Literal::Object(_))) {
                    Some(Self::ChildList(
                        items.iter().filter_map(|i| i.as_object().cloned()).collect(),
                    ))
                } else {
                    literal.to_json().map(Self::Structured)
                }
            }
            Literal::Object(_) => literal.to_json().map(Self::Structured),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(Scalar::Text(s)) => Value::String(s.clone()),
            Self::Scalar(Scalar::Number(n)) => Literal::Num(*n).to_json().unwrap_or(Value::Null),
            Self::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            Self::StringList(items) => Value::from(items.clone()),
            Self::ConditionalMap(cond) => serde_json::to_value(cond).unwrap_or(Value::Null),
            Self::ChildList(children) => Value::Array(
                children
                    .iter()
                    .filter_map(|c| Literal::Object(c.clone()).to_json())
                    .collect(),
            ),
            Self::Structured(v) => v.clone(),
        }
    }
}

fn condition_from(obj: &ObjectLiteral) -> Condition {
    let mut cond = Condition::new();
    for (key, value) in &obj.entries {
        let rhs = match value {
            Literal::Str(s) => ConditionValue::Text(s.clone()),
            Literal::Bool(b) => ConditionValue::Flag(*b),
            Literal::Num(n) => ConditionValue::Text(n.to_string()),
            Literal::Array(_) => ConditionValue::List(value.string_items()),
            _ => continue,
        };
        cond.insert(key.clone(), rhs);
    }
    cond
}

/// Refined fields of one object literal, in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    entries: Vec<(String, FieldValue)>,
}

impl FieldSet {
    pub fn from_object(obj: &ObjectLiteral) -> Self {
        let entries = obj
            .entries
            .iter()
            .filter_map(|(k, v)| FieldValue::refine(k, v).map(|fv| (k.clone(), fv)))
            .collect();
        Self { entries }
    }

    /// First value under `key`
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            FieldValue::Scalar(Scalar::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            FieldValue::Scalar(Scalar::Number(n)) => Some(*n),
            FieldValue::Scalar(Scalar::Text(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(FieldValue::Scalar(Scalar::Bool(true))))
    }

    pub fn strings(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(FieldValue::StringList(items)) => items.clone(),
            Some(FieldValue::Scalar(Scalar::Text(s))) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn condition(&self, key: &str) -> Option<Condition> {
        match self.get(key)? {
            FieldValue::ConditionalMap(c) if !c.is_empty() => Some(c.clone()),
            _ => None,
        }
    }

    pub fn children(&self, key: &str) -> &[ObjectLiteral] {
        match self.get(key) {
            Some(FieldValue::ChildList(children)) => children.as_slice(),
            _ => &[],
        }
    }

    pub fn json(&self, key: &str) -> Option<Value> {
        match self.get(key)? {
            // An empty array literal refines to an empty string list
            FieldValue::StringList(items) if items.is_empty() => Some(Value::Array(Vec::new())),
            other => Some(other.to_json()),
        }
    }
}

/// Build one input field from its object literal and append it (with its
/// descendants) to `arena`. Returns `None` when the literal has no name.
pub fn extract_input(
    obj: &ObjectLiteral,
    arena: &mut InputArena,
    parent: Option<FieldIdx>,
) -> Option<FieldIdx> {
    let fields = FieldSet::from_object(obj);
    let Some(name) = fields.text("name") else {
        debug!(keys = ?obj.keys().collect::<Vec<_>>(), "skipping input without a name");
        return None;
    };
    let label = fields.text("label").unwrap_or_else(|| name.clone());
    let input_type = fields
        .text("type")
        .map(|t| InputType::parse(&t))
        .unwrap_or(InputType::String);

    let mut field = InputField::new(name, label, input_type);
    field.description = fields.text("description");
    field.placeholder = fields.text("placeholder");
    field.default_value = fields.json("default");
    field.optional = fields.flag("optional");
    field.hidden = fields.flag("hidden");
    field.additional_params = fields.flag("additionalParams");
    field.free_solo = fields.flag("freeSolo");
    field.list = fields.flag("list");
    field.refresh = fields.flag("refresh");
    field.rows = fields.number("rows").filter(|n| *n >= 0.0).map(|n| n as u32);
    field.step = fields.number("step");
    field.warning = fields.text("warning");
    field.load_method = fields.text("loadMethod");
    field.accept_variable = fields.flag("acceptVariable");
    field.file_type = fields.text("fileType");
    field.tab_identifier = fields.text("tabIdentifier");
    field.generate_instruction = fields.flag("generateInstruction");
    field.generate_doc_store_description = fields.flag("generateDocStoreDescription");
    field.hide_code_execute = fields.flag("hideCodeExecute");
    field.show = fields.condition("show");
    field.hide = fields.condition("hide");

    if field.input_type.is_structural() {
        // Structural fields never carry leaf-only attributes.
        field.clear_leaf_only();
    } else if field.input_type.is_selection() {
        field.options = fields.children("options").iter().filter_map(extract_option).collect();
    }

    let child_key = field.input_type.child_key();
    let idx = arena.push(parent, field);

    if let Some(key) = child_key {
        for child in fields.children(key) {
            extract_input(child, arena, Some(idx));
        }
    }

    Some(idx)
}

fn extract_option(obj: &ObjectLiteral) -> Option<InputOption> {
    let fields = FieldSet::from_object(obj);
    let name = fields.text("name")?;
    Some(InputOption {
        label: fields.text("label").unwrap_or_else(|| name.clone()),
        name,
        description: fields.text("description"),
        icon: fields.text("icon").or_else(|| fields.text("imageSrc")),
    })
}

/// Resolve a base-class array. `this.type` stands for the definition's own
/// type tag; spreads and other expressions contribute nothing.
pub fn resolve_class_list(items: &[Literal], type_tag: &str) -> Vec<String> {
    let mut classes: Vec<String> = Vec::new();
    for item in items {
        let class = match item {
            Literal::Str(s) => s.clone(),
            Literal::Expr(e) if e == "this.type" && !type_tag.is_empty() => type_tag.to_string(),
            _ => continue,
        };
        if !classes.contains(&class) {
            classes.push(class);
        }
    }
    classes
}

/// Build an output anchor. A missing `baseClasses` falls back to
/// `default_chain`.
pub fn extract_output(obj: &ObjectLiteral, type_tag: &str, default_chain: &[String]) -> Option<OutputAnchor> {
    let fields = FieldSet::from_object(obj);
    let name = fields.text("name")?;
    let base_classes = match obj.array("baseClasses") {
        Some(items) => {
            let resolved = resolve_class_list(items, type_tag);
            if resolved.is_empty() {
                default_chain.to_vec()
            } else {
                resolved
            }
        }
        None => default_chain.to_vec(),
    };
    Some(OutputAnchor {
        label: fields.text("label").unwrap_or_else(|| name.clone()),
        name,
        base_classes,
        description: fields.text("description"),
        hidden: fields.flag("hidden"),
        is_anchor: fields.flag("isAnchor"),
    })
}

/// Build the credential requirement from `this.credential = { ... }`.
pub fn extract_credential(obj: &ObjectLiteral) -> Option<CredentialSpec> {
    let fields = FieldSet::from_object(obj);
    let credential_names = fields.strings("credentialNames");
    let name = fields.text("name").unwrap_or_else(|| "credential".to_string());
    if credential_names.is_empty() && fields.text("label").is_none() {
        return None;
    }
    Some(CredentialSpec {
        label: fields.text("label").unwrap_or_else(|| "Connect Credential".to_string()),
        name,
        credential_type: fields.text("type").unwrap_or_else(|| "credential".to_string()),
        credential_names,
        optional: fields.flag("optional"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::literal::parse_object;

    fn build(src: &str) -> InputArena {
        let obj = parse_object(src).unwrap();
        let mut arena = InputArena::new();
        extract_input(&obj, &mut arena, None).unwrap();
        arena
    }

    #[test]
    fn test_scalar_fields() {
        let arena = build(
            "{ label: 'Temperature', name: 'temperature', type: 'number', step: 0.1, default: 0.9, optional: true, additionalParams: true }",
        );
        let field = &arena.get(0).unwrap().field;
        assert_eq!(field.name, "temperature");
        assert_eq!(field.input_type, InputType::Number);
        assert_eq!(field.step, Some(0.1));
        assert_eq!(field.default_value, Some(serde_json::json!(0.9)));
        assert!(field.optional);
        assert!(field.additional_params);
        assert!(!field.hidden);
    }

    #[test]
    fn test_structural_parent_does_not_take_child_rows() {
        let arena = build("{ name: 'x', type: 'array', array: [ { name:'c1', type:'string', rows: 4 } ] }");
        assert_eq!(arena.len(), 2);
        let parent = &arena.get(0).unwrap().field;
        assert_eq!(parent.input_type, InputType::Array);
        assert_eq!(parent.rows, None);
        let child = arena.get(1).unwrap();
        assert_eq!(child.parent, Some(0));
        assert_eq!(child.field.rows, Some(4));
    }

    #[test]
    fn test_structural_field_drops_own_leaf_only_attributes() {
        let arena = build(
            "{ name: 'x', type: 'array', rows: 2, placeholder: 'p', generateInstruction: true, hideCodeExecute: true, array: [] }",
        );
        let parent = &arena.get(0).unwrap().field;
        assert_eq!(parent.rows, None);
        assert_eq!(parent.placeholder, None);
        assert!(!parent.generate_instruction);
        assert!(!parent.hide_code_execute);
    }

    #[test]
    fn test_options_only_for_selection_kinds() {
        let arena = build(
            "{ name: 'model', type: 'options', options: [ { label: 'A', name: 'a', description: 'first' }, { name: 'b' } ], default: 'a' }",
        );
        let field = &arena.get(0).unwrap().field;
        assert_eq!(field.options.len(), 2);
        assert_eq!(field.options[0].description.as_deref(), Some("first"));
        assert_eq!(field.options[1].label, "b");

        let arena = build("{ name: 'rows', type: 'array', options: [ { name: 'no' } ], array: [] }");
        assert!(arena.get(0).unwrap().field.options.is_empty());
    }

    #[test]
    fn test_conditions() {
        let arena = build(
            "{ name: 'k', type: 'string', show: { mode: ['a', 'b'], enabled: true, 'nested.key': 'x' }, hide: { } }",
        );
        let field = &arena.get(0).unwrap().field;
        let show = field.show.as_ref().unwrap();
        assert_eq!(show["mode"], ConditionValue::List(vec!["a".into(), "b".into()]));
        assert_eq!(show["enabled"], ConditionValue::Flag(true));
        assert_eq!(show["nested.key"], ConditionValue::Text("x".into()));
        assert!(field.hide.is_none());
    }

    #[test]
    fn test_nested_tabs() {
        let arena = build(
            "{ name: 't', type: 'tabs', tabs: [ { name: 'one', type: 'array', array: [ { name: 'deep', type: 'code' } ] }, { name: 'two', type: 'string' } ] }",
        );
        assert_eq!(arena.len(), 4);
        assert_eq!(arena.get(1).unwrap().parent, Some(0));
        assert_eq!(arena.get(2).unwrap().parent, Some(1));
        assert_eq!(arena.get(3).unwrap().parent, Some(0));
        assert_eq!(arena.get(3).unwrap().sort_order, 1);
        assert_eq!(arena.depth(2), 2);
    }

    #[test]
    fn test_class_list_resolution() {
        let obj = parse_object("{ b: [this.type, 'BaseChatModel', ...getBaseClasses(X), 'BaseChatModel'] }").unwrap();
        let classes = resolve_class_list(obj.array("b").unwrap(), "ChatOpenAI");
        assert_eq!(classes, vec!["ChatOpenAI", "BaseChatModel"]);
    }

    #[test]
    fn test_credential() {
        let obj = parse_object(
            "{ label: 'Connect Credential', name: 'credential', type: 'credential', credentialNames: ['openAIApi', 'azureOpenAIApi'] }",
        )
        .unwrap();
        let cred = extract_credential(&obj).unwrap();
        assert_eq!(cred.credential_names, vec!["openAIApi", "azureOpenAIApi"]);
        assert_eq!(cred.credential_type, "credential");
    }

    #[test]
    fn test_output_defaults_to_definition_chain() {
        let obj = parse_object("{ label: 'Output', name: 'output' }").unwrap();
        let chain = vec!["A".to_string(), "B".to_string()];
        let anchor = extract_output(&obj, "A", &chain).unwrap();
        assert_eq!(anchor.base_classes, chain);
    }
}
