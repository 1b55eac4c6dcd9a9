//! Edge endpoint handles
//!
//! `{nodeId}-input-{fieldName}-{fieldType}` and
//! `{nodeId}-output-{anchorName}-{T1|T2|...}`. The type part is always the
//! rightmost `-` segment.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between types inside a handle's type segment
pub const HANDLE_TYPE_SEPARATOR: char = '|';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded handle string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub node_id: String,
    pub direction: Direction,
    pub name: String,
    /// Claimed types, most specific first
    pub types: Vec<String>,
}

impl Handle {
    pub fn input(node_id: &str, field: &str, field_type: &str) -> String {
        format!("{}-input-{}-{}", node_id, field, field_type)
    }

    pub fn output(node_id: &str, anchor: &str, chain: &[String]) -> String {
        let sep = HANDLE_TYPE_SEPARATOR.to_string();
        format!("{}-output-{}-{}", node_id, anchor, chain.join(&sep))
    }

    /// Agentflow form, no type segment
    pub fn untyped_output(node_id: &str, anchor: &str) -> String {
        format!("{}-output-{}", node_id, anchor)
    }

    /// Decode a handle; `None` when it has no direction marker or no type part.
    pub fn parse(handle: &str) -> Option<Self> {
        let (node_id, direction, rest) = [Direction::Input, Direction::Output]
            .into_iter()
            .filter_map(|d| {
                let marker = format!("-{}-", d);
                handle
                    .find(&marker)
                    .map(|at| (at, d, at + marker.len()))
            })
            .min_by_key(|(at, _, _)| *at)
            .map(|(at, d, after)| (&handle[..at], d, &handle[after..]))?;

        let (name, type_part) = rest.rsplit_once('-')?;
        let types: Vec<String> = type_part
            .split(HANDLE_TYPE_SEPARATOR)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        if node_id.is_empty() || name.is_empty() || types.is_empty() {
            return None;
        }

        Some(Self {
            node_id: node_id.to_string(),
            direction,
            name: name.to_string(),
            types,
        })
    }

    /// Most specific claimed type
    pub fn primary_type(&self) -> &str {
        self.types.first().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Input => f.write_str(&Self::input(&self.node_id, &self.name, self.primary_type())),
            Direction::Output => f.write_str(&Self::output(&self.node_id, &self.name, &self.types)),
        }
    }
}
