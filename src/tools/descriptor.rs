//! Tool descriptors and argument binding
//!
//! A [`ToolDescriptor`] names a tool, describes it for the system prompt, and
//! declares its parameters in order. Model-supplied arguments are bound against
//! the declared parameters before the executable runs: defaults are filled in,
//! unknown or missing names are rejected, and values are checked against the
//! declared type.

use super::trait_def::Arguments;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

/// JSON type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    /// Accepts any JSON value
    Any,
}

impl ParamType {
    fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Any => "any",
        }
    }

    /// Checks `value` against this type, converting numeric and boolean strings
    /// the way small models tend to send them (`"5"` for `5`).
    fn coerce(&self, value: Value) -> Result<Value, Value> {
        match (self, value) {
            (ParamType::Any, v) => Ok(v),
            (ParamType::String, v @ Value::String(_)) => Ok(v),
            (ParamType::Boolean, v @ Value::Bool(_)) => Ok(v),
            (ParamType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(Value::String(s)),
            },
            (ParamType::Number, v @ Value::Number(_)) => Ok(v),
            (ParamType::Number, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(json!(n)),
                _ => Err(Value::String(s)),
            },
            (ParamType::Integer, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Ok(Value::Number(n))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                            Ok(json!(f as i64))
                        }
                        _ => Err(Value::Number(n)),
                    }
                }
            }
            (ParamType::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(n) => Ok(json!(n)),
                Err(_) => Err(Value::String(s)),
            },
            (ParamType::Object, v @ Value::Object(_)) => Ok(v),
            (ParamType::Array, v @ Value::Array(_)) => Ok(v),
            (_, v) => Err(v),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of a single named parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type", default)]
    pub param_type: ParamType,

    #[serde(default)]
    pub description: String,

    /// Value used when the model omits the argument
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Explicit required flag; when absent a parameter is required unless it
    /// has a default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl ParamSpec {
    pub fn required(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
            default: None,
            required: Some(true),
        }
    }

    pub fn with_default(
        param_type: ParamType,
        description: impl Into<String>,
        default: Value,
    ) -> Self {
        Self {
            param_type,
            description: description.into(),
            default: Some(default),
            required: Some(false),
        }
    }

    pub fn optional(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
            default: None,
            required: Some(false),
        }
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(self.default.is_none())
    }
}

/// Reasons a model-supplied argument map does not fit a descriptor
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("missing required argument '{param}' for tool '{tool}'")]
    MissingArgument { tool: String, param: String },

    #[error("unexpected argument '{param}' for tool '{tool}'")]
    UnexpectedArgument { tool: String, param: String },

    #[error("argument '{param}' for tool '{tool}' must be {expected}, got {found}")]
    TypeMismatch {
        tool: String,
        param: String,
        expected: ParamType,
        found: String,
    },
}

/// Metadata for one registered tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: IndexMap<String, ParamSpec>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: IndexMap::new(),
        }
    }

    /// Appends a parameter declaration, keeping declaration order
    pub fn param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }

    /// Binds model-supplied arguments to the declared parameters
    ///
    /// Explicit `null` counts as omitted. The returned map holds every supplied
    /// or defaulted parameter in declaration order.
    pub fn bind(&self, mut arguments: Arguments) -> Result<Arguments, BindError> {
        if let Some(unexpected) = arguments
            .keys()
            .find(|key| !self.parameters.contains_key(key.as_str()))
        {
            return Err(BindError::UnexpectedArgument {
                tool: self.name.clone(),
                param: unexpected.clone(),
            });
        }

        let mut bound = Map::new();
        for (param, spec) in &self.parameters {
            let supplied = arguments.remove(param).filter(|v| !v.is_null());

            let value = match (supplied, &spec.default) {
                (Some(value), _) => {
                    spec.param_type
                        .coerce(value)
                        .map_err(|found| BindError::TypeMismatch {
                            tool: self.name.clone(),
                            param: param.clone(),
                            expected: spec.param_type,
                            found: json_type_name(&found).to_string(),
                        })?
                }
                (None, Some(default)) => default.clone(),
                (None, None) if spec.is_required() => {
                    return Err(BindError::MissingArgument {
                        tool: self.name.clone(),
                        param: param.clone(),
                    })
                }
                (None, None) => continue,
            };

            bound.insert(param.clone(), value);
        }

        Ok(bound)
    }

    /// Renders the parameters as a JSON-schema object
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for (name, spec) in &self.parameters {
            let mut property = Map::new();
            if spec.param_type != ParamType::Any {
                property.insert("type".to_string(), json!(spec.param_type.as_str()));
            }
            if !spec.description.is_empty() {
                property.insert("description".to_string(), json!(spec.description));
            }
            if let Some(default) = &spec.default {
                property.insert("default".to_string(), default.clone());
            }
            properties.insert(name.clone(), Value::Object(property));

            if spec.is_required() {
                required.push(json!(name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
