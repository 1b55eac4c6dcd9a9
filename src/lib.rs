//! Flow Schemas
//!
//! Recovers node schemas from component source text, normalizes them into a
//! relational store, and validates candidate flows built from them.
//!
//! ## Features
//!
//! - **Structural Extraction**: balanced-bracket scanning and a scoped literal
//!   parser, no language grammar required
//! - **Hierarchical Normalization**: nested input fields flattened into
//!   self-referencing rows with stable sibling order
//! - **Type Compatibility**: ancestor-chain lookups in both directions
//! - **Flow Validation**: existence, handle typing, and canvas-kind checks
//!
//! ## Pipeline
//!
//! ```text
//! source units ──► extract ──► Definition (arena of InputFields)
//!                                   │
//!                      templates ──►│ enrich base classes
//!                                   ▼
//!                               store (SQLite, replace-all)
//!                                   │ load once
//!                                   ▼
//!                               Catalog ──► search / instance / compatible / validate / skeleton
//! ```

pub mod catalog;
pub mod checksum;
pub mod compat;
pub mod config;
pub mod error;
pub mod extract;
pub mod flow;
pub mod ingest;
pub mod schema;
pub mod store;
pub mod templates;

pub use catalog::{Catalog, CompatibleLink, DefinitionSummary, TemplateSummary};
pub use checksum::{Checksum, CorpusHasher};
pub use compat::{ChainAuthority, TypeResolver};
pub use config::FlowSchemasConfig;
pub use error::{Result, SchemaError};
pub use extract::Assembler;
pub use flow::{CandidateEdge, CandidateFlow, CandidateNode, FlowValidator, ValidationResult};
pub use ingest::{IngestReport, Ingestor, PipelineReport};
pub use schema::{
    Category, CredentialSpec, Definition, FlowKind, FlowTemplate, InputArena, InputField, InputOption,
    InputType, OutputAnchor,
};
pub use store::{Batch, Snapshot, Store};
