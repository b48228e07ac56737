//! Parameter schemas and typed parameter values.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::filter;

/// A body parameter with this name is merged into the request body rather
/// than nested under its own key.
pub const MERGED_BODY: &str = "body";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Enum,
    /// A DCT filter expression string.
    Filter,
    /// Free-form JSON object or array passed through to the body.
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Body,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, rename = "in", skip_serializing_if = "Option::is_none")]
    pub location: Option<ParamLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(default)]
    pub description: String,
}

/// A parameter after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Json(Value),
}

impl ParamValue {
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Text(s) => Value::String(s.clone()),
            ParamValue::Integer(n) => json!(n),
            ParamValue::Boolean(b) => Value::Bool(*b),
            ParamValue::Json(v) => v.clone(),
        }
    }

    /// Rendering used for query strings and path segments.
    pub fn to_query(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            ParamValue::Integer(n) => n.to_string(),
            ParamValue::Boolean(b) => b.to_string(),
            ParamValue::Json(v) => v.to_string(),
        }
    }
}

impl ParamSpec {
    pub fn location(&self) -> ParamLocation {
        self.location.unwrap_or(ParamLocation::Query)
    }

    pub fn merges_into_body(&self) -> bool {
        self.location() == ParamLocation::Body && self.name == MERGED_BODY
    }

    /// Checks `raw` against this parameter and converts it.
    pub fn coerce(&self, raw: &Value) -> Result<ParamValue, String> {
        let value = match self.kind {
            ParamType::String => match raw {
                Value::String(s) => ParamValue::Text(s.clone()),
                Value::Number(n) => ParamValue::Text(n.to_string()),
                other => return Err(format!("expected a string, got {}", type_name(other))),
            },
            ParamType::Integer => {
                let n = match raw {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                }
                .ok_or_else(|| format!("expected an integer, got {}", raw))?;
                if let Some(min) = self.min {
                    if n < min {
                        return Err(format!("must be at least {}, got {}", min, n));
                    }
                }
                if let Some(max) = self.max {
                    if n > max {
                        return Err(format!("must be at most {}, got {}", max, n));
                    }
                }
                ParamValue::Integer(n)
            }
            ParamType::Boolean => match raw {
                Value::Bool(b) => ParamValue::Boolean(*b),
                Value::String(s) if s.eq_ignore_ascii_case("true") => ParamValue::Boolean(true),
                Value::String(s) if s.eq_ignore_ascii_case("false") => ParamValue::Boolean(false),
                other => return Err(format!("expected a boolean, got {}", other)),
            },
            ParamType::Enum => {
                let given = raw
                    .as_str()
                    .ok_or_else(|| format!("expected one of {}", self.values.join(", ")))?;
                let canonical = self
                    .values
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(given))
                    .ok_or_else(|| {
                        format!(
                            "'{}' is not one of {}",
                            given,
                            self.values.join(", ")
                        )
                    })?;
                ParamValue::Text(canonical.clone())
            }
            ParamType::Filter => {
                let expr = raw
                    .as_str()
                    .ok_or_else(|| format!("expected a filter string, got {}", type_name(raw)))?;
                filter::validate(expr)?;
                ParamValue::Text(expr.to_string())
            }
            ParamType::Object => match raw {
                Value::Object(_) | Value::Array(_) => ParamValue::Json(raw.clone()),
                Value::String(s) => match serde_json::from_str::<Value>(s) {
                    Ok(parsed @ (Value::Object(_) | Value::Array(_))) => ParamValue::Json(parsed),
                    _ => return Err("expected a JSON object or array".to_string()),
                },
                other => {
                    return Err(format!(
                        "expected a JSON object or array, got {}",
                        type_name(other)
                    ))
                }
            },
        };

        if self.merges_into_body() && !matches!(value, ParamValue::Json(Value::Object(_))) {
            return Err("expected a JSON object for the request body".to_string());
        }

        if self.location() == ParamLocation::Path {
            if let ParamValue::Text(s) = &value {
                if s.trim().is_empty() {
                    return Err("must not be empty".to_string());
                }
            }
        }
        Ok(value)
    }

    /// JSON-schema fragment for tool listings.
    pub fn json_schema(&self) -> Value {
        let mut schema = match self.kind {
            ParamType::String | ParamType::Filter => json!({ "type": "string" }),
            ParamType::Integer => json!({ "type": "integer" }),
            ParamType::Boolean => json!({ "type": "boolean" }),
            ParamType::Enum => json!({ "type": "string", "enum": self.values }),
            ParamType::Object => json!({ "type": ["object", "array"] }),
        };
        if let Some(min) = self.min {
            schema["minimum"] = json!(min);
        }
        if let Some(max) = self.max {
            schema["maximum"] = json!(max);
        }
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        if self.kind == ParamType::Filter {
            schema["description"] = json!(format!(
                "{} Operators: {}; combine with AND/OR.",
                self.description,
                filter::OPERATORS.join(", ")
            )
            .trim()
            .to_string());
        } else if !self.description.is_empty() {
            schema["description"] = json!(self.description);
        }
        schema
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
