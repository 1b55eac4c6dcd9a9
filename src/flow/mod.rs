//! Flow assembly and validation
//!
//! Everything that works on instantiated definitions rather than on the
//! definitions themselves:
//!
//! - [`handle`]: edge endpoint identifiers
//! - [`instance`]: canvas node objects rebuilt from definitions
//! - [`validate`]: candidate graph checks
//! - [`diagnostics`]: error/warning collection
//! - [`skeleton`]: fixed example compositions

pub mod diagnostics;
pub mod handle;
pub mod instance;
pub mod skeleton;
pub mod validate;

pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use handle::{Direction, Handle, HANDLE_TYPE_SEPARATOR};
pub use instance::{instance_id, instantiate};
pub use skeleton::{Skeleton, SkeletonKind};
pub use validate::{
    CandidateEdge, CandidateFlow, CandidateNode, CandidateNodeData, DefinitionLookup, FlowValidator,
    ValidationResult,
};
