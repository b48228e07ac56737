use serde_json::{Map, Value};

use dct_mcp_tools::FieldError;

/// One call as delivered by the protocol layer. Consumed once.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub tool: String,
    pub action: Option<String>,
    pub params: Map<String, Value>,
    pub confirmed: bool,
}

impl InvocationRequest {
    pub fn new(tool: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            action: Some(action.into()),
            params: Map::new(),
            confirmed: false,
        }
    }

    /// A call with no `action` discriminator, as used by the meta-tools.
    pub fn bare(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            action: None,
            params: Map::new(),
            confirmed: false,
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn confirmed(mut self, confirmed: bool) -> Self {
        self.confirmed = confirmed;
        self
    }

    /// Splits raw tool arguments into the `action`, `confirmed` and parameter bag.
    pub fn from_arguments(tool: &str, arguments: Value) -> Result<Self, Vec<FieldError>> {
        let mut params = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(vec![FieldError::new(
                    "arguments",
                    format!("expected an object, got {}", other),
                )])
            }
        };

        let mut errors = Vec::new();
        let action = match params.remove("action") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                errors.push(FieldError::new(
                    "action",
                    format!("expected a string, got {}", other),
                ));
                None
            }
        };
        let confirmed = match params.remove("confirmed") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
            Some(other) => {
                errors.push(FieldError::new(
                    "confirmed",
                    format!("expected a boolean, got {}", other),
                ));
                false
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            tool: tool.to_string(),
            action,
            params,
            confirmed,
        })
    }

    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }
}
