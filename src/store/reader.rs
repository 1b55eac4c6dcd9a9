//! Wholesale load of a store into memory

use std::collections::HashMap;

use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use super::{meta_keys, Store};
use crate::error::Result;
use crate::schema::{
    Category, Definition, FieldIdx, FlowTemplate, InputArena, InputField, InputOption, InputType,
    OutputAnchor,
};

/// Everything a store holds, in memory
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub definitions: Vec<Definition>,
    pub categories: Vec<Category>,
    pub templates: Vec<FlowTemplate>,
    pub generated_at: Option<String>,
    pub checksum: Option<String>,
}

fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_opt<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// One `input_fields` row: (id, definition, parent id, field)
type FieldRow = (i64, String, Option<i64>, InputField);

fn field_from_row(row: &Row<'_>) -> rusqlite::Result<FieldRow> {
    let type_name: String = row.get(5)?;
    let mut field = InputField::new(row.get::<_, String>(3)?, row.get::<_, String>(4)?, InputType::parse(&type_name));
    field.description = row.get(6)?;
    field.placeholder = row.get(7)?;
    field.default_value = json_opt::<Value>(row, 8)?;
    field.optional = row.get(9)?;
    field.hidden = row.get(10)?;
    field.additional_params = row.get(11)?;
    field.free_solo = row.get(12)?;
    field.list = row.get(13)?;
    field.refresh = row.get(14)?;
    field.rows = row.get(15)?;
    field.show = json_opt(row, 16)?;
    field.hide = json_opt(row, 17)?;
    field.generate_instruction = row.get(18)?;
    field.generate_doc_store_description = row.get(19)?;
    field.hide_code_execute = row.get(20)?;
    field.load_method = row.get(21)?;
    field.accept_variable = row.get(22)?;
    field.file_type = row.get(23)?;
    field.warning = row.get(24)?;
    field.step = row.get(25)?;
    field.tab_identifier = row.get(26)?;
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, field))
}

impl Store {
    /// Load every table. Rows come back in write order, so rebuilt arenas
    /// match the ones that were stored.
    pub fn load(&self) -> Result<Snapshot> {
        let mut options: HashMap<i64, Vec<InputOption>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT input_field_id, label, name, description, icon FROM input_options
                 ORDER BY input_field_id, sort_order",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    InputOption {
                        label: row.get(1)?,
                        name: row.get(2)?,
                        description: row.get(3)?,
                        icon: row.get(4)?,
                    },
                ))
            })?;
            for row in rows {
                let (field_id, option) = row?;
                options.entry(field_id).or_default().push(option);
            }
        }

        let mut fields: HashMap<String, Vec<FieldRow>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                r#"SELECT id, definition_name, parent_id, name, label, type, description, placeholder,
                     default_value, optional, hidden, additional_params, free_solo, "list", refresh,
                     "rows", show_condition, hide_condition, generate_instruction,
                     generate_doc_store_description, hide_code_execute, load_method, accept_variable,
                     file_type, warning, step, tab_identifier
                   FROM input_fields ORDER BY id"#,
            )?;
            let rows = stmt.query_map([], field_from_row)?;
            for row in rows {
                let row = row?;
                fields.entry(row.1.clone()).or_default().push(row);
            }
        }

        let mut outputs: HashMap<String, Vec<OutputAnchor>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT definition_name, name, label, base_classes, description, hidden, is_anchor
                 FROM output_anchors ORDER BY definition_name, sort_order",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    OutputAnchor {
                        name: row.get(1)?,
                        label: row.get(2)?,
                        base_classes: json_col(row, 3)?,
                        description: row.get(4)?,
                        hidden: row.get(5)?,
                        is_anchor: row.get(6)?,
                    },
                ))
            })?;
            for row in rows {
                let (definition, anchor) = row?;
                outputs.entry(definition).or_default().push(anchor);
            }
        }

        let mut definitions = Vec::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT name, label, version, type, category, description, base_classes, credential,
                     color, icon, hint, badge, deprecate_message, author, tags, file_path
                 FROM definitions ORDER BY name",
            )?;
            let rows = stmt.query_map([], |row| {
                let mut def = Definition::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
                def.version = row.get(2)?;
                def.node_type = row.get(3)?;
                def.category = row.get(4)?;
                def.description = row.get(5)?;
                def.base_classes = json_col(row, 6)?;
                def.credential = json_opt(row, 7)?;
                def.color = row.get(8)?;
                def.icon = row.get(9)?;
                def.hint = row.get(10)?;
                def.badge = row.get(11)?;
                def.deprecate_message = row.get(12)?;
                def.author = row.get(13)?;
                def.tags = json_col(row, 14)?;
                def.file_path = row.get(15)?;
                Ok(def)
            })?;
            for row in rows {
                let mut def = row?;
                def.inputs = rebuild_arena(fields.remove(&def.name).unwrap_or_default(), &mut options);
                def.outputs = outputs.remove(&def.name).unwrap_or_default();
                definitions.push(def);
            }
        }

        let mut categories = Vec::new();
        {
            let mut stmt = self.conn.prepare("SELECT name, count FROM categories ORDER BY name")?;
            let rows = stmt.query_map([], |row| {
                Ok(Category {
                    name: row.get(0)?,
                    count: row.get::<_, i64>(1)? as usize,
                })
            })?;
            for row in rows {
                categories.push(row?);
            }
        }

        let mut templates = Vec::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT name, description, kind, nodes, edges, use_cases FROM flow_templates ORDER BY kind, name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(FlowTemplate {
                    name: row.get(0)?,
                    description: row.get(1)?,
                    kind: row.get(2)?,
                    nodes: json_col(row, 3)?,
                    edges: json_col(row, 4)?,
                    use_cases: json_col(row, 5)?,
                })
            })?;
            for row in rows {
                templates.push(row?);
            }
        }

        let snapshot = Snapshot {
            definitions,
            categories,
            templates,
            generated_at: self.meta(meta_keys::GENERATED_AT)?,
            checksum: self.meta(meta_keys::CORPUS_CHECKSUM)?,
        };
        info!(
            definitions = snapshot.definitions.len(),
            templates = snapshot.templates.len(),
            "store loaded"
        );
        Ok(snapshot)
    }
}

/// Rebuild an arena from rows ordered by id. Parent rows precede children,
/// so every parent reference resolves to a slot already pushed.
fn rebuild_arena(rows: Vec<FieldRow>, options: &mut HashMap<i64, Vec<InputOption>>) -> InputArena {
    let mut arena = InputArena::new();
    let mut slots: HashMap<i64, FieldIdx> = HashMap::new();
    for (id, definition, parent_id, mut field) in rows {
        field.options = options.remove(&id).unwrap_or_default();
        let parent = parent_id.and_then(|p| {
            let idx = slots.get(&p).copied();
            let structural = idx
                .and_then(|i| arena.get(i))
                .map(|s| s.field.input_type.is_structural())
                .unwrap_or(false);
            if !structural {
                warn!(%definition, field = %field.name, parent = p, "orphaned input field loaded at top level");
            }
            idx.filter(|_| structural)
        });
        slots.insert(id, arena.push(parent, field));
    }
    arena
}
