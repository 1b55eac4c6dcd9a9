//! Ready-to-instantiate node objects
//!
//! Rebuilds a canvas node from a stored definition: value parameters,
//! connector anchors, output anchors and default input values, with every
//! anchor carrying its handle id.

use serde_json::{json, Map, Value};

use super::handle::Handle;
use crate::schema::{Definition, InputField, InputType, OutputAnchor};

/// Default canvas width of a node
pub const NODE_WIDTH: u32 = 300;

/// `{name}_{n}`, the conventional id of the n-th instance of a definition
pub fn instance_id(definition: &Definition, n: usize) -> String {
    format!("{}_{}", definition.name, n)
}

/// Build the node object for `definition` placed at `position`.
pub fn instantiate(definition: &Definition, id: &str, position: (f64, f64)) -> Value {
    let kind = definition.flow_kind();

    let mut params = Vec::new();
    let mut anchors = Vec::new();
    let mut inputs = Map::new();

    if let Some(credential) = &definition.credential {
        params.push(json!({
            "label": credential.label,
            "name": credential.name,
            "type": "credential",
            "credentialNames": credential.credential_names,
            "optional": credential.optional,
            "id": Handle::input(id, &credential.name, "credential"),
        }));
    }

    let roots: Vec<&InputField> = definition.inputs.roots().collect();
    for (field, mut tree) in roots.into_iter().zip(definition.inputs.to_tree()) {
        let handle = Handle::input(id, &field.name, field.input_type.as_str());
        if field.input_type.is_connector() {
            anchors.push(json!({
                "label": field.label,
                "name": field.name,
                "type": field.input_type.as_str(),
                "optional": field.optional,
                "list": field.list,
                "description": field.description,
                "id": handle,
            }));
            inputs.insert(field.name.clone(), Value::String(String::new()));
        } else {
            if let Value::Object(map) = &mut tree {
                map.insert("id".to_string(), Value::String(handle));
            }
            params.push(tree);
            inputs.insert(field.name.clone(), initial_value(field));
        }
    }

    let (output_anchors, outputs) = output_anchors(definition, id);

    json!({
        "id": id,
        "position": { "x": position.0, "y": position.1 },
        "type": kind.node_tag(),
        "data": {
            "id": id,
            "label": definition.label,
            "version": definition.version,
            "name": definition.name,
            "type": definition.node_type,
            "baseClasses": definition.base_classes,
            "category": definition.category,
            "description": definition.description,
            "inputParams": params,
            "inputAnchors": anchors,
            "inputs": inputs,
            "outputAnchors": output_anchors,
            "outputs": outputs,
            "selected": false,
        },
        "width": NODE_WIDTH,
        "selected": false,
        "dragging": false,
    })
}

/// Declared default, or the empty value for the field's kind
fn initial_value(field: &InputField) -> Value {
    if let Some(default) = &field.default_value {
        return default.clone();
    }
    match field.input_type {
        InputType::Array | InputType::MultiOptions | InputType::AsyncMultiOptions => Value::Array(Vec::new()),
        _ => Value::String(String::new()),
    }
}

fn anchor_json(id: &str, anchor: &OutputAnchor) -> Value {
    json!({
        "id": Handle::output(id, &anchor.name, &anchor.base_classes),
        "name": anchor.name,
        "label": anchor.label,
        "description": anchor.description,
        "type": anchor.type_chain(),
    })
}

/// A single anchor is exposed directly; several are wrapped in one
/// selectable `output` anchor whose default is the first.
fn output_anchors(definition: &Definition, id: &str) -> (Value, Value) {
    let declared = definition.effective_outputs();
    let visible: Vec<&OutputAnchor> = declared.iter().filter(|a| !a.hidden).collect();

    match visible.as_slice() {
        [] => (Value::Array(Vec::new()), json!({})),
        [only] => (Value::Array(vec![anchor_json(id, only)]), json!({})),
        [first, ..] => {
            let options: Vec<Value> = visible.iter().map(|a| anchor_json(id, a)).collect();
            (
                json!([{
                    "name": "output",
                    "label": "Output",
                    "type": "options",
                    "options": options,
                    "default": first.name,
                }]),
                json!({ "output": first.name }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CredentialSpec, InputArena};

    fn chain_definition() -> Definition {
        let mut def = Definition::new("conversationChain", "Conversation Chain");
        def.node_type = "ConversationChain".into();
        def.category = "Chains".into();
        def.base_classes = vec!["ConversationChain".into(), "LLMChain".into(), "BaseChain".into()];
        let mut arena = InputArena::new();
        arena.push(None, InputField::new("model", "Chat Model", InputType::parse("BaseChatModel")));
        arena.push(None, InputField::new("memory", "Memory", InputType::parse("BaseMemory")));
        let mut prompt = InputField::new("systemMessagePrompt", "System Message", InputType::String);
        prompt.default_value = Some(json!("You are helpful"));
        arena.push(None, prompt);
        def.inputs = arena;
        def
    }

    #[test]
    fn test_instantiate_handles() {
        let def = chain_definition();
        let node = instantiate(&def, "conversationChain_0", (10.0, 20.0));
        let data = &node["data"];

        assert_eq!(node["type"], "customNode");
        assert_eq!(data["inputAnchors"].as_array().unwrap().len(), 2);
        assert_eq!(
            data["inputAnchors"][0]["id"],
            "conversationChain_0-input-model-BaseChatModel"
        );
        assert_eq!(
            data["inputParams"][0]["id"],
            "conversationChain_0-input-systemMessagePrompt-string"
        );
        assert_eq!(data["inputs"]["systemMessagePrompt"], "You are helpful");
        assert_eq!(
            data["outputAnchors"][0]["id"],
            "conversationChain_0-output-conversationChain-ConversationChain|LLMChain|BaseChain"
        );
        assert_eq!(data["outputAnchors"][0]["type"], "ConversationChain | LLMChain | BaseChain");
    }

    #[test]
    fn test_credential_param_first() {
        let mut def = chain_definition();
        def.credential = Some(CredentialSpec {
            label: "Connect Credential".into(),
            name: "credential".into(),
            credential_type: "credential".into(),
            credential_names: vec!["openAIApi".into()],
            optional: false,
        });
        let node = instantiate(&def, "n", (0.0, 0.0));
        assert_eq!(node["data"]["inputParams"][0]["name"], "credential");
        assert_eq!(node["data"]["inputParams"][0]["id"], "n-input-credential-credential");
    }

    #[test]
    fn test_multiple_outputs_wrapped() {
        let mut def = chain_definition();
        def.outputs = vec![
            OutputAnchor::mirror_of(&def),
            OutputAnchor {
                name: "text".into(),
                label: "Text".into(),
                base_classes: vec!["string".into(), "json".into()],
                description: None,
                hidden: false,
                is_anchor: false,
            },
        ];
        let node = instantiate(&def, "n", (0.0, 0.0));
        let anchors = node["data"]["outputAnchors"].as_array().unwrap();
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0]["type"], "options");
        assert_eq!(anchors[0]["options"].as_array().unwrap().len(), 2);
        assert_eq!(node["data"]["outputs"]["output"], "conversationChain");
    }
}
