//! Structural Extraction
//!
//! Recovers node schemas from component source without a language grammar:
//!
//! - [`comments`]: strip comments, keep string contents
//! - [`scanner`]: balanced-bracket matching and array segmentation
//! - [`literal`]: scoped recursive-descent literal tree
//! - [`fields`]: refine literals into typed fields
//! - [`assembler`]: drive all of the above over one source unit

pub mod assembler;
pub mod comments;
pub mod fields;
pub mod literal;
pub mod scanner;

pub use assembler::{Assembler, DEFAULT_SENTINEL};
pub use comments::strip_comments;
pub use fields::{FieldSet, FieldValue, Scalar};
pub use literal::{parse_literal, parse_object, Literal, ObjectLiteral};
pub use scanner::{find_closing, find_matching, object_spans, segment_objects, ObjectSpan};
