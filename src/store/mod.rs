//! Relational store
//!
//! One SQLite file per processed corpus. The batch job is the only writer
//! and always replaces everything ([`Store::replace_all`]); readers load the
//! whole snapshot into memory once ([`Store::load`]).

mod reader;
mod writer;

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use crate::error::{Result, SchemaError};

pub use reader::Snapshot;
pub use writer::{Batch, WriteFailure, WriteReport};

/// Metadata keys in the `meta` table
pub mod meta_keys {
    pub const GENERATED_AT: &str = "generated_at";
    pub const CORPUS_CHECKSUM: &str = "corpus_checksum";
    pub const DEFINITION_COUNT: &str = "definition_count";
    pub const CRATE_VERSION: &str = "crate_version";
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS definitions (
    name TEXT NOT NULL UNIQUE,
    label TEXT NOT NULL,
    version REAL NOT NULL,
    type TEXT NOT NULL,
    category TEXT NOT NULL,
    description TEXT NOT NULL,
    base_classes TEXT NOT NULL,
    credential TEXT,
    color TEXT,
    icon TEXT,
    hint TEXT,
    badge TEXT,
    deprecate_message TEXT,
    author TEXT,
    tags TEXT NOT NULL,
    file_path TEXT,
    flow_kind TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS input_fields (
    id INTEGER PRIMARY KEY,
    definition_name TEXT NOT NULL REFERENCES definitions(name) ON DELETE CASCADE,
    parent_id INTEGER REFERENCES input_fields(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    label TEXT NOT NULL,
    type TEXT NOT NULL,
    description TEXT,
    placeholder TEXT,
    default_value TEXT,
    optional INTEGER NOT NULL,
    hidden INTEGER NOT NULL,
    additional_params INTEGER NOT NULL,
    free_solo INTEGER NOT NULL,
    "list" INTEGER NOT NULL,
    refresh INTEGER NOT NULL,
    "rows" INTEGER,
    show_condition TEXT,
    hide_condition TEXT,
    sort_order INTEGER NOT NULL,
    generate_instruction INTEGER NOT NULL,
    generate_doc_store_description INTEGER NOT NULL,
    hide_code_execute INTEGER NOT NULL,
    load_method TEXT,
    accept_variable INTEGER NOT NULL,
    file_type TEXT,
    warning TEXT,
    step REAL,
    tab_identifier TEXT
);
CREATE TABLE IF NOT EXISTS input_options (
    id INTEGER PRIMARY KEY,
    input_field_id INTEGER NOT NULL REFERENCES input_fields(id) ON DELETE CASCADE,
    label TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    sort_order INTEGER NOT NULL,
    icon TEXT
);
CREATE TABLE IF NOT EXISTS output_anchors (
    id INTEGER PRIMARY KEY,
    definition_name TEXT NOT NULL REFERENCES definitions(name) ON DELETE CASCADE,
    name TEXT NOT NULL,
    label TEXT NOT NULL,
    type_chain TEXT NOT NULL,
    base_classes TEXT NOT NULL,
    sort_order INTEGER NOT NULL,
    description TEXT,
    hidden INTEGER NOT NULL,
    is_anchor INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS credential_specs (
    definition_name TEXT NOT NULL UNIQUE REFERENCES definitions(name) ON DELETE CASCADE,
    label TEXT NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    credential_names TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS categories (
    name TEXT NOT NULL UNIQUE,
    count INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS flow_templates (
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    kind TEXT NOT NULL,
    nodes TEXT NOT NULL,
    edges TEXT NOT NULL,
    use_cases TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_input_fields_definition ON input_fields(definition_name);
CREATE INDEX IF NOT EXISTS idx_input_fields_parent ON input_fields(parent_id);
CREATE INDEX IF NOT EXISTS idx_input_options_field ON input_options(input_field_id);
CREATE INDEX IF NOT EXISTS idx_output_anchors_definition ON output_anchors(definition_name);
CREATE INDEX IF NOT EXISTS idx_definitions_category ON definitions(category);
"#;

/// Children first, so the deletes never trip a foreign key
const CLEAR: &str = r#"
DELETE FROM input_options;
DELETE FROM input_fields;
DELETE FROM output_anchors;
DELETE FROM credential_specs;
DELETE FROM definitions;
DELETE FROM categories;
DELETE FROM flow_templates;
DELETE FROM meta;
"#;

/// Handle on a store file
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open for writing, creating the file and tables if needed
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open an existing store read-only; a missing file is `StoreMissing`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SchemaError::StoreMissing(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Scratch store, used by tests and dry runs
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw connection for ad-hoc inspection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Value of a `meta` key, if recorded
    pub fn meta(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM meta WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}
