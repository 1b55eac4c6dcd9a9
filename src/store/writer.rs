//! Hierarchical normalizer
//!
//! Flattens assembled definitions into the relational tables. Input field ids
//! are projected from arena indices (`base + index`), so parent references
//! are known before any row is written and children never need a read-back.

use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{meta_keys, Store, CLEAR};
use crate::checksum::Checksum;
use crate::error::Result;
use crate::schema::{Definition, FlowTemplate};

/// Everything one replace-all pass writes
#[derive(Debug, Clone, Copy, Default)]
pub struct Batch<'a> {
    pub definitions: &'a [Definition],
    pub templates: &'a [FlowTemplate],
    pub checksum: Option<&'a Checksum>,
}

/// A definition whose rows were rolled back
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteFailure {
    pub definition: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteReport {
    pub written: usize,
    pub templates: usize,
    pub failures: Vec<WriteFailure>,
}

impl Store {
    /// Replace the whole store with `batch`.
    ///
    /// Each definition is written inside its own savepoint; a failing one is
    /// rolled back, logged and reported while the batch carries on.
    pub fn replace_all(&mut self, batch: Batch<'_>) -> Result<WriteReport> {
        let mut report = WriteReport::default();
        let mut tx = self.conn.transaction()?;
        tx.execute_batch(CLEAR)?;

        let mut next_field_id: i64 = 1;
        for def in batch.definitions {
            let sp = tx.savepoint()?;
            match write_definition(&sp, def, next_field_id) {
                Ok(()) => {
                    sp.commit()?;
                    next_field_id += def.inputs.len() as i64;
                    report.written += 1;
                }
                Err(e) => {
                    // dropping the savepoint rolls it back
                    drop(sp);
                    warn!(definition = %def.name, error = %e, "failed to write definition");
                    report.failures.push(WriteFailure {
                        definition: def.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tx.execute(
            "INSERT INTO categories(name, count)
             SELECT category, COUNT(*) FROM definitions WHERE category != '' GROUP BY category",
            [],
        )?;

        for template in batch.templates {
            tx.execute(
                "INSERT INTO flow_templates(name, description, kind, nodes, edges, use_cases) VALUES(?1,?2,?3,?4,?5,?6)",
                params![
                    template.name,
                    template.description,
                    template.kind,
                    template.nodes.to_string(),
                    template.edges.to_string(),
                    serde_json::to_string(&template.use_cases)?,
                ],
            )?;
            report.templates += 1;
        }

        let generated_at = chrono::Utc::now().to_rfc3339();
        let mut meta = vec![
            (meta_keys::GENERATED_AT, generated_at),
            (meta_keys::DEFINITION_COUNT, report.written.to_string()),
            (meta_keys::CRATE_VERSION, env!("CARGO_PKG_VERSION").to_string()),
        ];
        if let Some(checksum) = batch.checksum {
            meta.push((meta_keys::CORPUS_CHECKSUM, checksum.to_string()));
        }
        for (key, value) in meta {
            tx.execute("INSERT INTO meta(key, value) VALUES(?1, ?2)", params![key, value])?;
        }

        tx.commit()?;
        info!(
            written = report.written,
            failed = report.failures.len(),
            templates = report.templates,
            "store replaced"
        );
        Ok(report)
    }
}

fn write_definition(conn: &Connection, def: &Definition, base_id: i64) -> Result<()> {
    let credential = def.credential.as_ref().map(serde_json::to_string).transpose()?;
    conn.execute(
        "INSERT INTO definitions(name, label, version, type, category, description, base_classes,
             credential, color, icon, hint, badge, deprecate_message, author, tags, file_path, flow_kind)
         VALUES(?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)",
        params![
            def.name,
            def.label,
            def.version,
            def.node_type,
            def.category,
            def.description,
            serde_json::to_string(&def.base_classes)?,
            credential,
            def.color,
            def.icon,
            def.hint,
            def.badge,
            def.deprecate_message,
            def.author,
            serde_json::to_string(&def.tags)?,
            def.file_path,
            def.flow_kind().as_str(),
        ],
    )?;

    // Arena order is pre-order: every parent row lands before its children.
    for (idx, slot) in def.inputs.slots().iter().enumerate() {
        let id = base_id + idx as i64;
        let parent_id = slot.parent.map(|p| base_id + p as i64);
        let f = &slot.field;
        let default_value = f.default_value.as_ref().map(|v| v.to_string());
        let show = f.show.as_ref().map(serde_json::to_string).transpose()?;
        let hide = f.hide.as_ref().map(serde_json::to_string).transpose()?;

        conn.execute(
            r#"INSERT INTO input_fields(id, definition_name, parent_id, name, label, type, description,
                 placeholder, default_value, optional, hidden, additional_params, free_solo, "list",
                 refresh, "rows", show_condition, hide_condition, sort_order, generate_instruction,
                 generate_doc_store_description, hide_code_execute, load_method, accept_variable,
                 file_type, warning, step, tab_identifier)
             VALUES(?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24,?25,?26,?27,?28)"#,
            params![
                id,
                def.name,
                parent_id,
                f.name,
                f.label,
                f.input_type.as_str(),
                f.description,
                f.placeholder,
                default_value,
                f.optional,
                f.hidden,
                f.additional_params,
                f.free_solo,
                f.list,
                f.refresh,
                f.rows,
                show,
                hide,
                slot.sort_order,
                f.generate_instruction,
                f.generate_doc_store_description,
                f.hide_code_execute,
                f.load_method,
                f.accept_variable,
                f.file_type,
                f.warning,
                f.step,
                f.tab_identifier,
            ],
        )?;

        for (order, option) in f.options.iter().enumerate() {
            conn.execute(
                "INSERT INTO input_options(input_field_id, label, name, description, sort_order, icon)
                 VALUES(?1,?2,?3,?4,?5,?6)",
                params![id, option.label, option.name, option.description, order as i64, option.icon],
            )?;
        }
    }

    for (order, anchor) in def.outputs.iter().enumerate() {
        conn.execute(
            "INSERT INTO output_anchors(definition_name, name, label, type_chain, base_classes,
                 sort_order, description, hidden, is_anchor)
             VALUES(?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                def.name,
                anchor.name,
                anchor.label,
                anchor.type_chain(),
                serde_json::to_string(&anchor.base_classes)?,
                order as i64,
                anchor.description,
                anchor.hidden,
                anchor.is_anchor,
            ],
        )?;
    }

    if let Some(cred) = &def.credential {
        conn.execute(
            "INSERT INTO credential_specs(definition_name, label, name, type, credential_names)
             VALUES(?1,?2,?3,?4,?5)",
            params![
                def.name,
                cred.label,
                cred.name,
                cred.credential_type,
                serde_json::to_string(&cred.credential_names)?,
            ],
        )?;
    }

    debug!(definition = %def.name, fields = def.inputs.len(), "definition written");
    Ok(())
}
