//! Declared parameter schemas, validated before every invocation.
//!
//! A tool declares named, typed parameters; the invoker checks the step's
//! arguments against the declaration and refuses invocation on mismatch so
//! malformed requests surface immediately instead of inside the tool.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primitive type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// UTF-8 text.
    String,
    /// Integer or float.
    Number,
    /// True or false.
    Boolean,
    /// Explicit null.
    Null,
    /// Ordered list of values.
    Array,
    /// String-keyed map of values.
    Object,
}

impl ParamKind {
    /// Whether the given JSON value inhabits this kind.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Null => value.is_null(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    /// Kind of the given JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Array => "array",
            Self::Object => "object",
        };
        write!(formatter, "{label}")
    }
}

/// One declared parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Expected primitive type.
    pub kind: ParamKind,
    /// Whether the parameter must be present.
    pub required: bool,
}

impl ParamSpec {
    /// Declares a required parameter.
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    /// Declares an optional parameter.
    pub fn optional(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// Full declared schema for a tool's arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Declared parameters, validated by name.
    pub params: Vec<ParamSpec>,
}

impl ToolSchema {
    /// Schema for a tool taking no arguments.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a schema from a parameter list.
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    /// Validates arguments against this schema.
    ///
    /// Arguments must be a JSON object (or null, when nothing is required);
    /// required parameters must be present, every present parameter must be
    /// declared, and every value must inhabit its declared kind.
    ///
    /// # Errors
    /// Returns a description of the first violation found.
    pub fn validate(&self, arguments: &Value) -> Result<(), String> {
        let map = match arguments {
            Value::Object(map) => map,
            Value::Null => {
                return if self.params.iter().any(|param| param.required) {
                    Err("arguments missing but parameters are required".to_owned())
                } else {
                    Ok(())
                };
            }
            other => {
                return Err(format!(
                    "arguments must be an object, got {}",
                    ParamKind::of(other)
                ));
            }
        };

        for param in &self.params {
            match map.get(&param.name) {
                Some(value) => {
                    if !param.kind.matches(value) {
                        return Err(format!(
                            "parameter '{}' expects {}, got {}",
                            param.name,
                            param.kind,
                            ParamKind::of(value)
                        ));
                    }
                }
                None if param.required => {
                    return Err(format!("missing required parameter '{}'", param.name));
                }
                None => {}
            }
        }

        for name in map.keys() {
            if !self.params.iter().any(|param| &param.name == name) {
                return Err(format!("unknown parameter '{name}'"));
            }
        }

        Ok(())
    }
}
