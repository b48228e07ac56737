//! Action specs and the tool definitions that group them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use dct_mcp_client::{ApiCall, HttpMethod};

use crate::error::FieldError;
use crate::schema::{ParamLocation, ParamSpec, ParamType, ParamValue};

/// Argument names every grouped tool reserves for itself.
pub const RESERVED_PARAMS: [&str; 2] = ["action", "confirmed"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub method: HttpMethod,
    /// Path template, e.g. `/vdbs/{vdbId}/delete`.
    pub path: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub destructive: bool,
    /// Marks POST searches that never change remote state.
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

/// Placeholder names in a path template, in order.
pub fn placeholders(template: &str) -> Vec<&str> {
    template
        .split('/')
        .filter_map(|seg| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .collect()
}

impl ActionSpec {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn is_idempotent(&self) -> bool {
        self.method.is_safe() || self.read_only
    }

    /// Fills in parameter locations left implicit in the catalog.
    pub(crate) fn settle_locations(&mut self) {
        let holes: Vec<String> = placeholders(&self.path)
            .into_iter()
            .map(str::to_string)
            .collect();
        for param in &mut self.params {
            if param.location.is_some() {
                continue;
            }
            param.location = Some(if holes.contains(&param.name) {
                ParamLocation::Path
            } else if matches!(param.kind, ParamType::Filter | ParamType::Object) {
                ParamLocation::Body
            } else {
                ParamLocation::Query
            });
        }
    }

    /// Validates `args` and builds the HTTP call. Arguments this action does
    /// not declare are ignored. Every bad field is reported, not just the first.
    pub fn prepare(&self, args: &Map<String, Value>) -> Result<ApiCall, Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut values: BTreeMap<&str, ParamValue> = BTreeMap::new();

        for param in &self.params {
            match args.get(&param.name).filter(|v| !v.is_null()) {
                Some(raw) => match param.coerce(raw) {
                    Ok(value) => {
                        values.insert(param.name.as_str(), value);
                    }
                    Err(problem) => errors.push(FieldError::new(&param.name, problem)),
                },
                None => match &param.default {
                    Some(default) => match param.coerce(default) {
                        Ok(value) => {
                            values.insert(param.name.as_str(), value);
                        }
                        Err(problem) => errors.push(FieldError::new(&param.name, problem)),
                    },
                    None if param.required => errors.push(FieldError::new(
                        &param.name,
                        format!("missing required parameter for action {}", self.name),
                    )),
                    None => {}
                },
            }
        }

        let path = match self.render_path(&values) {
            Ok(path) => Some(path),
            Err(missing) => {
                for field in missing {
                    if !errors.iter().any(|e| e.field == field) {
                        errors.push(FieldError::new(field, "missing path parameter"));
                    }
                }
                None
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        let path = path.unwrap_or_default();

        let mut query = Vec::new();
        let mut body = Map::new();
        for param in &self.params {
            let Some(value) = values.get(param.name.as_str()) else {
                continue;
            };
            match param.location() {
                ParamLocation::Path => {}
                ParamLocation::Query => query.push((param.name.clone(), value.to_query())),
                ParamLocation::Body if param.merges_into_body() => {
                    if let Value::Object(fields) = value.to_json() {
                        body.extend(fields);
                    }
                }
                ParamLocation::Body => {
                    body.insert(param.name.clone(), value.to_json());
                }
            }
        }

        let body = if self.method.carries_body() {
            Some(Value::Object(body))
        } else {
            None
        };

        Ok(ApiCall::new(self.method, path)
            .with_query(query)
            .with_body(body)
            .idempotent(self.is_idempotent()))
    }

    fn render_path(&self, values: &BTreeMap<&str, ParamValue>) -> Result<String, Vec<String>> {
        let mut missing = Vec::new();
        let rendered: Vec<String> = self
            .path
            .split('/')
            .map(|seg| match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => match values.get(name) {
                    Some(value) => urlencoding::encode(&value.to_query()).into_owned(),
                    None => {
                        missing.push(name.to_string());
                        String::new()
                    }
                },
                None => seg.to_string(),
            })
            .collect();
        if missing.is_empty() {
            Ok(rendered.join("/"))
        } else {
            Err(missing)
        }
    }

    /// Problems with this action as declared; empty when sound.
    pub(crate) fn self_check(&self, tool: &str) -> Vec<String> {
        let mut issues = Vec::new();
        let at = format!("{}.{}", tool, self.name);
        let holes = placeholders(&self.path);

        if !self.path.starts_with('/') {
            issues.push(format!("{}: path '{}' must start with '/'", at, self.path));
        }

        for hole in &holes {
            match self.param(hole) {
                Some(p) if p.location() == ParamLocation::Path && p.required => {}
                Some(p) if p.location() == ParamLocation::Path => {
                    issues.push(format!("{}: path parameter '{}' must be required", at, p.name))
                }
                _ => issues.push(format!(
                    "{}: placeholder '{{{}}}' has no matching path parameter",
                    at, hole
                )),
            }
        }

        let mut seen = Vec::new();
        for param in &self.params {
            if seen.contains(&param.name.as_str()) {
                issues.push(format!("{}: duplicate parameter '{}'", at, param.name));
            }
            seen.push(param.name.as_str());

            if RESERVED_PARAMS.contains(&param.name.as_str()) {
                issues.push(format!("{}: parameter name '{}' is reserved", at, param.name));
            }
            if param.location() == ParamLocation::Path && !holes.contains(&param.name.as_str()) {
                issues.push(format!(
                    "{}: path parameter '{}' does not appear in '{}'",
                    at, param.name, self.path
                ));
            }
            if param.location() == ParamLocation::Body && !self.method.carries_body() {
                issues.push(format!(
                    "{}: body parameter '{}' on a {} action",
                    at, param.name, self.method
                ));
            }
            if param.kind == ParamType::Enum && param.values.is_empty() {
                issues.push(format!("{}: enum parameter '{}' has no values", at, param.name));
            }
            if let (Some(min), Some(max)) = (param.min, param.max) {
                if min > max {
                    issues.push(format!("{}: parameter '{}' has min > max", at, param.name));
                }
            }
            if let Some(default) = &param.default {
                if let Err(problem) = param.coerce(default) {
                    issues.push(format!(
                        "{}: default for '{}' is invalid: {}",
                        at, param.name, problem
                    ));
                }
            }
        }

        issues
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub actions: Vec<ActionSpec>,
}

impl ToolDefinition {
    pub fn action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn action_names(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.name.clone()).collect()
    }

    /// Long-form description listing every action.
    pub fn render_description(&self) -> String {
        let mut text = self.description.trim().to_string();
        text.push_str("\n\nActions:");
        for action in &self.actions {
            text.push_str(&format!(
                "\n- {} ({} {}){}",
                action.name,
                action.method,
                action.path,
                if action.destructive {
                    " [destructive: requires confirmed=true]"
                } else {
                    ""
                }
            ));
            if !action.summary.is_empty() {
                text.push_str(&format!(": {}", action.summary));
            }
        }
        text
    }

    /// Input schema: `action`, `confirmed`, and the union of every action's
    /// parameters. Requiredness is per action, so only `action` is required.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        properties.insert(
            "action".to_string(),
            json!({
                "type": "string",
                "enum": self.action_names(),
                "description": "The operation to perform",
            }),
        );
        properties.insert(
            "confirmed".to_string(),
            json!({
                "type": "boolean",
                "default": false,
                "description": "Set to true to execute an operation that requires confirmation",
            }),
        );

        for action in &self.actions {
            for param in &action.params {
                if properties.contains_key(&param.name) {
                    continue;
                }
                let mut schema = param.json_schema();
                let required_for: Vec<&str> = self
                    .actions
                    .iter()
                    .filter(|a| a.param(&param.name).map(|p| p.required).unwrap_or(false))
                    .map(|a| a.name.as_str())
                    .collect();
                if !required_for.is_empty() {
                    let base = schema["description"].as_str().unwrap_or_default().to_string();
                    schema["description"] = json!(format!(
                        "{} [Required for: {}]",
                        base,
                        required_for.join(", ")
                    )
                    .trim()
                    .to_string());
                }
                properties.insert(param.name.clone(), schema);
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": ["action"],
        })
    }
}
