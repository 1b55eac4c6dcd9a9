//! Diagnostics
//!
//! Collects hard errors and soft warnings found while validating a candidate
//! flow. Problems are data, never panics or `Err`s.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing flow problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Existence ===
    /// Node references a definition that is not in the catalog
    MissingDefinition,
    /// Edge endpoint names a node that was not accepted
    UnknownEndpoint,
    /// Two nodes share an id
    DuplicateNodeId,
    /// Node has no id or no definition reference
    MalformedNode,

    // === Typing ===
    /// Source output type does not satisfy the target input type
    TypeMismatch,

    // === Classification ===
    /// Edge joins a chatflow node and an agentflow node
    FlowKindMismatch,
    /// Edge type tag differs from the one implied by its endpoints
    EdgeTagMismatch,
    /// Chatflow graph contains a cycle
    Cycle,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingDefinition => "E001",
            Self::UnknownEndpoint => "E002",
            Self::DuplicateNodeId => "E003",
            Self::MalformedNode => "E004",
            Self::TypeMismatch => "E005",
            Self::FlowKindMismatch => "W001",
            Self::EdgeTagMismatch => "W002",
            Self::Cycle => "W003",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingDefinition
            | Self::UnknownEndpoint
            | Self::DuplicateNodeId
            | Self::MalformedNode
            | Self::TypeMismatch => Severity::Error,

            Self::FlowKindMismatch | Self::EdgeTagMismatch | Self::Cycle => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single flow problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Node or edge id the problem is attached to
    pub subject: String,
    pub code: DiagnosticCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(subject: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.subject
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of flow problems in discovery order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    /// Record a problem; severity follows from the code
    pub fn report(&mut self, subject: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) {
        self.push(DiagnosticItem::new(subject, code, message));
    }

    pub fn missing_definition(&mut self, node_id: &str, definition: &str) {
        self.report(
            node_id,
            DiagnosticCode::MissingDefinition,
            format!("Node definition '{}' does not exist", definition),
        );
    }

    pub fn unknown_endpoint(&mut self, edge_id: &str, side: &str, node_id: &str) {
        self.report(
            edge_id,
            DiagnosticCode::UnknownEndpoint,
            format!("Edge {} node '{}' is not in the flow", side, node_id),
        );
    }

    pub fn type_mismatch(&mut self, edge_id: &str, source_type: &str, target_type: &str, chain: &[String]) {
        self.push(
            DiagnosticItem::new(
                edge_id,
                DiagnosticCode::TypeMismatch,
                format!("Output type '{}' is not compatible with input type '{}'", source_type, target_type),
            )
            .with_context(format!("Source chain: {}", chain.join(" -> "))),
        );
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if !self.is_empty() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for Diagnostics {
    type Item = DiagnosticItem;
    type IntoIter = std::vec::IntoIter<DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_severity() {
        assert_eq!(DiagnosticCode::MissingDefinition.severity(), Severity::Error);
        assert_eq!(DiagnosticCode::TypeMismatch.severity(), Severity::Error);
        assert_eq!(DiagnosticCode::FlowKindMismatch.severity(), Severity::Warning);
        assert_eq!(DiagnosticCode::Cycle.severity(), Severity::Warning);
    }

    #[test]
    fn test_diagnostics_collection() {
        let mut diags = Diagnostics::new();
        diags.missing_definition("n1", "Missing");
        diags.report("e1", DiagnosticCode::EdgeTagMismatch, "expected 'buttonedge'");

        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
        assert!(diags.has_errors());
        assert!(diags.format_all().contains("[E001] error"));
    }
}
