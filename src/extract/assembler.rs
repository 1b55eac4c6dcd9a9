//! Schema Assembler
//!
//! Drives comment stripping, bracket scanning, segmentation and field
//! extraction over one source unit and produces a [`Definition`].
//!
//! Definition-level values are `this.<key> = <value>` assignments. The first
//! assignment of each key wins.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use super::comments::{skip_quoted, strip_comments, QUOTES};
use super::fields::{extract_credential, extract_input, extract_output, resolve_class_list};
use super::literal::{parse_literal, parse_object, Literal, ObjectLiteral};
use super::scanner::{find_closing, segment_objects};
use crate::error::{Result, SchemaError};
use crate::schema::{Definition, InputArena, OutputAnchor};

/// Substring marking a unit that declares a component
pub const DEFAULT_SENTINEL: &str = "implements INode";

/// Builds definitions from component source text
pub struct Assembler {
    sentinel: String,
    assignment: Regex,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new(DEFAULT_SENTINEL)
    }
}

/// Raw text of one assignment's right-hand side, with its position
struct Assignment<'a> {
    start: usize,
    text: &'a str,
}

impl Assembler {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
            assignment: Regex::new(r"this\.([A-Za-z_$][\w$]*)\s*=").expect("assignment pattern is valid"),
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Whether the unit declares a component at all
    pub fn is_component(&self, source: &str) -> bool {
        source.contains(&self.sentinel)
    }

    /// Assemble one definition from a source unit.
    ///
    /// Fails only when the unit is not a component or lacks `name`/`label`.
    /// Malformed optional values are omitted.
    pub fn assemble(&self, source: &str) -> Result<Definition> {
        let text = strip_comments(source);
        if !self.is_component(&text) {
            return Err(SchemaError::NotAComponent);
        }

        let assignments = self.assignments(&text);
        let scalar = |key: &str| -> Option<Literal> {
            let a = assignments.get(key)?;
            parse_literal(a.text).ok()
        };
        let text_of = |key: &str| scalar(key).and_then(|l| l.as_str().map(str::to_string));

        let name = text_of("name").ok_or(SchemaError::MissingIdentity("name"))?;
        let label = text_of("label").ok_or(SchemaError::MissingIdentity("label"))?;

        let mut def = Definition::new(name, label);
        def.version = match scalar("version") {
            Some(Literal::Num(n)) if n >= 0.0 => n,
            Some(Literal::Str(s)) => s.trim().parse().ok().filter(|n: &f64| *n >= 0.0).unwrap_or(1.0),
            _ => 1.0,
        };
        def.node_type = text_of("type").unwrap_or_else(|| def.name.clone());
        def.category = text_of("category").unwrap_or_default();
        def.description = text_of("description").unwrap_or_default();
        def.color = text_of("color");
        def.icon = text_of("icon");
        def.hint = text_of("hint");
        def.badge = text_of("badge");
        def.deprecate_message = text_of("deprecateMessage");
        def.author = text_of("author");
        def.tags = scalar("tags").map(|l| l.string_items()).unwrap_or_default();

        def.base_classes = match scalar("baseClasses") {
            Some(Literal::Array(items)) => resolve_class_list(&items, &def.node_type),
            _ => Vec::new(),
        };
        if def.base_classes.is_empty() {
            def.base_classes.push(def.node_type.clone());
        }

        if let Some(Literal::Object(obj)) = scalar("credential") {
            def.credential = extract_credential(&obj);
        }

        if let Some(a) = assignments.get("inputs") {
            def.inputs = self.inputs(a);
        }

        if let Some(a) = assignments.get("outputs") {
            def.outputs = object_items(a)
                .iter()
                .filter_map(|obj| extract_output(obj, &def.node_type, &def.base_classes))
                .collect();
        }
        if def.outputs.is_empty() {
            def.outputs.push(OutputAnchor::mirror_of(&def));
        }

        debug!(
            name = %def.name,
            inputs = def.inputs.len(),
            outputs = def.outputs.len(),
            "assembled definition"
        );
        Ok(def)
    }

    fn inputs(&self, assignment: &Assignment<'_>) -> InputArena {
        let mut arena = InputArena::new();
        for obj in object_items(assignment) {
            extract_input(&obj, &mut arena, None);
        }
        arena
    }

    /// First right-hand side of every `this.<key> =` assignment
    fn assignments<'a>(&self, text: &'a str) -> HashMap<String, Assignment<'a>> {
        let mut found = HashMap::new();
        for caps in self.assignment.captures_iter(text) {
            let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            // `this.x == y` / `this.x => ...` are not assignments
            if matches!(text.as_bytes().get(whole.end()), Some(b'=') | Some(b'>')) {
                continue;
            }
            if found.contains_key(key.as_str()) {
                continue;
            }
            if let Some(a) = value_extent(text, whole.end()) {
                found.insert(key.as_str().to_string(), a);
            }
        }
        found
    }
}

/// Object literals inside an array assignment, located with the segmenter.
/// Unparseable objects are skipped.
fn object_items(assignment: &Assignment<'_>) -> Vec<ObjectLiteral> {
    let text = assignment.text;
    if !text.starts_with('[') || text.len() < 2 {
        return Vec::new();
    }
    let body = &text[1..text.len() - 1];
    segment_objects(body)
        .into_iter()
        .filter_map(|span| match parse_object(span) {
            Ok(obj) => Some(obj),
            Err(e) => {
                debug!(offset = assignment.start, error = %e, "skipping malformed object literal");
                None
            }
        })
        .collect()
}

/// Extent of the value starting at (or after whitespace from) `start`.
fn value_extent(text: &str, start: usize) -> Option<Assignment<'_>> {
    let bytes = text.as_bytes();
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let first = *bytes.get(i)?;
    let end = match first {
        b'[' | b'{' | b'(' => find_closing(text, i + 1)? + 1,
        b if QUOTES.contains(&b) => skip_quoted(bytes, i),
        _ => {
            let mut j = i;
            while j < bytes.len() && !matches!(bytes[j], b';' | b'\n' | b'}') {
                if QUOTES.contains(&bytes[j]) {
                    j = skip_quoted(bytes, j);
                } else {
                    j += 1;
                }
            }
            j
        }
    };
    Some(Assignment {
        start: i,
        text: text[i..end.min(bytes.len())].trim_end(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::InputType;

    const CHAT_MODEL: &str = r#"
import { INode, INodeParams } from '../../../src/Interface'

class ChatExample_ChatModels implements INode {
    label: string
    name: string

    constructor() {
        this.label = 'Chat Example'
        this.name = 'chatExample'
        this.version = 3.2
        this.type = 'ChatExample'
        this.icon = 'example.svg'
        this.category = 'Chat Models'
        this.description = 'Wrapper around an example chat endpoint'
        this.baseClasses = [this.type, ...getBaseClasses(ChatExample)]
        this.credential = {
            label: 'Connect Credential',
            name: 'credential',
            type: 'credential',
            credentialNames: ['exampleApi']
        }
        this.inputs = [
            {
                label: 'Cache',
                name: 'cache',
                type: 'BaseCache',
                optional: true
            },
            // { label: 'Removed', name: 'removed', type: 'string' },
            {
                label: 'Model Name',
                name: 'modelName',
                type: 'asyncOptions',
                loadMethod: 'listModels',
                default: 'example-large'
            }
        ]
    }

    async init(nodeData: INodeData): Promise<any> {
        if (this.name === 'x') return null
        return new ChatExample({ temperature: 0.1 })
    }
}
"#;

    #[test]
    fn test_assemble_chat_model() {
        let def = Assembler::default().assemble(CHAT_MODEL).unwrap();
        assert_eq!(def.name, "chatExample");
        assert_eq!(def.label, "Chat Example");
        assert_eq!(def.version, 3.2);
        assert_eq!(def.node_type, "ChatExample");
        assert_eq!(def.base_classes, vec!["ChatExample"]);
        assert_eq!(def.credential.as_ref().unwrap().credential_names, vec!["exampleApi"]);
        assert_eq!(def.inputs.len(), 2);
        let roots: Vec<_> = def.inputs.roots().map(|f| f.name.as_str()).collect();
        assert_eq!(roots, vec!["cache", "modelName"]);
        assert_eq!(def.inputs.find_root("cache").unwrap().input_type, InputType::Reference("BaseCache".into()));
        assert_eq!(def.inputs.find_root("modelName").unwrap().load_method.as_deref(), Some("listModels"));
        assert_eq!(def.outputs.len(), 1);
        assert_eq!(def.outputs[0].name, "chatExample");
    }

    #[test]
    fn test_missing_identity() {
        let src = "class X implements INode { constructor() { this.label = 'X' } }";
        assert!(matches!(
            Assembler::default().assemble(src),
            Err(SchemaError::MissingIdentity("name"))
        ));
    }

    #[test]
    fn test_not_a_component() {
        let src = "export const helper = () => 1";
        assert!(matches!(Assembler::default().assemble(src), Err(SchemaError::NotAComponent)));
    }

    #[test]
    fn test_commented_sentinel_is_not_a_component() {
        let src = "// class X implements INode\nclass X {}";
        assert!(matches!(Assembler::default().assemble(src), Err(SchemaError::NotAComponent)));
    }

    #[test]
    fn test_declared_outputs() {
        let src = r#"
class Retriever implements INode {
    constructor() {
        this.label = 'Retriever'
        this.name = 'retriever'
        this.type = 'Retriever'
        this.baseClasses = [this.type, 'BaseRetriever']
        this.outputs = [
            { label: 'Retriever', name: 'retriever', baseClasses: this.baseClasses },
            { label: 'Document', name: 'document', description: 'Array of documents', baseClasses: ['Document', 'json'] },
            { label: 'Text', name: 'text', baseClasses: ['string', 'json'], hidden: true }
        ]
    }
}
"#;
        let def = Assembler::default().assemble(src).unwrap();
        assert_eq!(def.outputs.len(), 3);
        assert_eq!(def.outputs[0].base_classes, vec!["Retriever", "BaseRetriever"]);
        assert_eq!(def.outputs[1].type_chain(), "Document | json");
        assert!(def.outputs[2].hidden);
    }

    #[test]
    fn test_version_defaults() {
        let src = "class X implements INode { constructor() { this.label = 'X'; this.name = 'x'; this.version = '2.5' } }";
        let def = Assembler::default().assemble(src).unwrap();
        assert_eq!(def.version, 2.5);
        assert_eq!(def.node_type, "x");
        assert_eq!(def.base_classes, vec!["x"]);
    }
}
