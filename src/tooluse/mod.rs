//! Tool use: definitions surfaced to the model, the decoding constraint
//! built from them, and the call parser.

pub mod parser;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use parser::{parse_calls, strip_quotes, ArgValue, Call, Diagnostic, ParseFailure};

/// Scalar parameter types a tool can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Integer,
    Boolean,
    Float,
}

/// Items description for a list-of-scalar parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarItems {
    #[serde(rename = "type")]
    pub item_type: ScalarKind,
}

/// Parameter type: a scalar, or a list of scalars encoded as
/// `{"type": "array", "items": {"type": <scalar>}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
    Boolean,
    Float,
    Array { items: ScalarItems },
}

/// Schema of one tool parameter as surfaced to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(flatten)]
    pub param_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

impl ParameterSchema {
    /// Schema with just a type, no description or nullability.
    pub fn of(param_type: ParameterType) -> Self {
        Self {
            param_type,
            description: None,
            nullable: None,
        }
    }
}

/// Marker for the object wrapper around tool parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    #[default]
    #[serde(rename = "object")]
    Object,
}

/// Parameter block of a tool description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub properties: BTreeMap<String, ParameterSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

/// One tool/function description surfaced to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ObjectSchema,
}

/// Sampling constraint built once from the preface tool definitions.
///
/// The constraint watches the text accumulated during decoding; once a
/// complete top-level call span has been emitted it reports zero surviving
/// candidates, which the decode loop maps to
/// [`FinishReason::ConstraintExhausted`](crate::engine::FinishReason).
/// Token-level grammar masking, if any, lives behind the engine seam.
#[derive(Debug, Clone)]
pub struct ToolConstraint {
    tool_names: Vec<String>,
}

impl ToolConstraint {
    /// Build the constraint from preface tools; `None` when no tools are
    /// defined.
    pub fn from_tools(tools: &[ToolDefinition]) -> Option<Self> {
        if tools.is_empty() {
            return None;
        }
        Some(Self {
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        })
    }

    /// Names of the tools this constraint admits.
    pub fn tool_names(&self) -> &[String] {
        &self.tool_names
    }

    /// Number of candidates still admissible given the text generated so
    /// far. Zero once a complete call span has been emitted.
    pub fn remaining_candidates(&self, generated: &str, vocab_size: usize) -> usize {
        if call_span_complete(generated) {
            0
        } else {
            vocab_size
        }
    }
}

/// Whether `text` ends a balanced call expression: at least one argument
/// list was opened, every parenthesis and bracket is closed again, and only
/// whitespace or a closing fence follows.
fn call_span_complete(text: &str) -> bool {
    let mut depth = 0usize;
    let mut opened = false;
    let mut in_string: Option<u8> = None;
    let bytes = text.as_bytes();
    let mut i = 0;
    let mut end = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(quote) = in_string {
            if b == b'\\' {
                i += 1;
            } else if b == quote {
                in_string = None;
            }
        } else {
            match b {
                b'"' | b'\'' => in_string = Some(b),
                b'(' | b'[' => {
                    depth += 1;
                    opened = true;
                }
                b')' | b']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        end = i + 1;
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    if !opened || depth != 0 || in_string.is_some() || end == 0 {
        return false;
    }
    let trailing = text[end..].trim();
    trailing.is_empty() || trailing == "```"
}
