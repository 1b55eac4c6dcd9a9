//! Batch ingest
//!
//! Enumerates source units under a root, assembles each into a definition,
//! optionally enriches chains from templates, and replaces the store.
//! Single pass, single thread; a bad unit is skipped, never fatal.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::checksum::{Checksum, CorpusHasher};
use crate::config::FlowSchemasConfig;
use crate::error::{Result, SchemaError};
use crate::extract::Assembler;
use crate::schema::Definition;
use crate::store::{Batch, Store, WriteReport};
use crate::templates;

/// A unit that produced no definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedUnit {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of extraction over a source tree
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Units read
    pub scanned: usize,
    pub definitions: Vec<Definition>,
    /// Component units that failed assembly
    pub skipped: Vec<SkippedUnit>,
    pub checksum: Checksum,
}

/// Outcome of a full ingest run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub scanned: usize,
    pub extracted: usize,
    pub skipped: Vec<SkippedUnit>,
    pub templates: usize,
    pub enriched: usize,
    pub checksum: Checksum,
    pub write: WriteReport,
}

/// Extracts definitions from a source tree
pub struct Ingestor {
    assembler: Assembler,
    extensions: Vec<String>,
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new(Assembler::default(), vec!["ts".to_string(), "js".to_string()])
    }
}

impl Ingestor {
    pub fn new(assembler: Assembler, extensions: Vec<String>) -> Self {
        Self { assembler, extensions }
    }

    pub fn from_config(config: &FlowSchemasConfig) -> Self {
        Self::new(
            Assembler::new(config.source.sentinel.clone()),
            config.source.extensions.clone(),
        )
    }

    /// Source units under `root`, in a stable order
    pub fn units(&self, root: &Path) -> Vec<PathBuf> {
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        walker
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| self.extensions.iter().any(|x| x == e))
                    .unwrap_or(false)
            })
            .filter(|p| !is_declaration_file(p))
            .collect()
    }

    /// Extract every component unit under `root`.
    pub fn ingest(&self, root: &Path) -> Result<IngestReport> {
        if !root.is_dir() {
            return Err(SchemaError::not_found("source directory", root.display().to_string()));
        }

        let mut hasher = CorpusHasher::new();
        let mut definitions = Vec::new();
        let mut skipped = Vec::new();

        for path in self.units(root) {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable source unit");
                    skipped.push(SkippedUnit {
                        path: relative,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            hasher.update(&relative.to_string_lossy(), content.as_bytes());

            match self.assembler.assemble(&content) {
                Ok(mut def) => {
                    def.file_path = Some(relative.to_string_lossy().replace('\\', "/"));
                    definitions.push(def);
                }
                Err(SchemaError::NotAComponent) => {
                    debug!(path = %relative.display(), "not a component");
                }
                Err(e) => {
                    warn!(path = %relative.display(), error = %e, "skipping source unit");
                    skipped.push(SkippedUnit {
                        path: relative,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let scanned = hasher.units();
        info!(
            scanned,
            extracted = definitions.len(),
            skipped = skipped.len(),
            "extraction finished"
        );
        Ok(IngestReport {
            scanned,
            definitions,
            skipped,
            checksum: hasher.finish(),
        })
    }
}

/// `.d.ts` files only carry type declarations
fn is_declaration_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(".d.ts"))
        .unwrap_or(false)
}

/// Run the whole batch: extract, load templates, enrich, replace the store.
pub fn run_pipeline(config: &FlowSchemasConfig, store: &mut Store) -> Result<PipelineReport> {
    let root = config
        .source_root()
        .ok_or_else(|| SchemaError::InvalidFormat("source.root is not configured".to_string()))?;

    let report = Ingestor::from_config(config).ingest(&root)?;
    let mut definitions = report.definitions;

    let templates = match config.templates_root() {
        Some(dir) => templates::load_templates(&dir)?,
        None => Vec::new(),
    };
    let enriched = if config.templates.enrich_base_classes {
        templates::enrich_base_classes(&mut definitions, &templates)
    } else {
        0
    };

    let write = store.replace_all(Batch {
        definitions: &definitions,
        templates: &templates,
        checksum: Some(&report.checksum),
    })?;

    Ok(PipelineReport {
        scanned: report.scanned,
        extracted: definitions.len(),
        skipped: report.skipped,
        templates: templates.len(),
        enriched,
        checksum: report.checksum,
        write,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: &str = "class A implements INode { constructor() { this.label = 'A'; this.name = 'a' } }";

    #[test]
    fn test_ingest_skips_non_components_and_bad_units() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), UNIT).unwrap();
        fs::write(dir.path().join("helper.ts"), "export const x = 1").unwrap();
        fs::write(dir.path().join("broken.ts"), "class B implements INode { constructor() { this.label = 'B' } }").unwrap();
        fs::write(dir.path().join("types.d.ts"), "declare class C implements INode {}").unwrap();
        fs::write(dir.path().join("notes.md"), "implements INode").unwrap();

        let report = Ingestor::default().ingest(dir.path()).unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.definitions.len(), 1);
        assert_eq!(report.definitions[0].file_path.as_deref(), Some("a.ts"));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, PathBuf::from("broken.ts"));
    }

    #[test]
    fn test_checksum_stable_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), UNIT).unwrap();
        let first = Ingestor::default().ingest(dir.path()).unwrap();
        let second = Ingestor::default().ingest(dir.path()).unwrap();
        assert_eq!(first.checksum, second.checksum);
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            Ingestor::default().ingest(&missing),
            Err(SchemaError::NotFound { .. })
        ));
    }
}
