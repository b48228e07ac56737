use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use dct_mcp_client::ApiCall;

use crate::action::{ActionSpec, ToolDefinition};
use crate::error::{ActionError, CatalogError};

#[derive(Debug, Deserialize)]
struct ActionsFile {
    #[serde(default)]
    tools: Vec<ToolDefinition>,
}

/// Every tool definition the process knows about, keyed by tool name.
/// Immutable once built.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    tools: Vec<Arc<ToolDefinition>>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn new(definitions: Vec<ToolDefinition>) -> Self {
        let mut tools = Vec::with_capacity(definitions.len());
        let mut index = HashMap::new();
        for mut definition in definitions {
            for action in &mut definition.actions {
                action.settle_locations();
            }
            index.entry(definition.name.clone()).or_insert(tools.len());
            tools.push(Arc::new(definition));
        }
        Self { tools, index }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, CatalogError> {
        let file: ActionsFile = serde_yaml::from_str(content)
            .map_err(|e| CatalogError::ConfigError(format!("Invalid actions YAML: {}", e)))?;
        Ok(Self::new(file.tools))
    }

    pub fn get(&self, tool: &str) -> Option<Arc<ToolDefinition>> {
        self.index.get(tool).map(|&i| self.tools[i].clone())
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.index.contains_key(tool)
    }

    pub fn tools(&self) -> impl Iterator<Item = &Arc<ToolDefinition>> {
        self.index.values().map(|&i| &self.tools[i])
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.index.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn resolve(&self, tool: &str, action: &str) -> Result<&ActionSpec, ActionError> {
        let definition = self
            .index
            .get(tool)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ActionError::UnknownTool(tool.to_string()))?;
        definition
            .action(action)
            .ok_or_else(|| ActionError::UnknownAction {
                tool: tool.to_string(),
                action: action.to_string(),
                available: definition.action_names(),
            })
    }

    /// Resolves and validates in one step.
    pub fn prepare(
        &self,
        tool: &str,
        action: &str,
        args: &Map<String, Value>,
    ) -> Result<ApiCall, ActionError> {
        self.resolve(tool, action)?
            .prepare(args)
            .map_err(|fields| ActionError::Validation {
                tool: tool.to_string(),
                action: action.to_string(),
                fields,
            })
    }

    /// Structural problems across every registered action.
    pub fn self_check(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut seen_tools: Vec<&str> = Vec::new();

        for tool in &self.tools {
            if seen_tools.contains(&tool.name.as_str()) {
                issues.push(format!("duplicate tool '{}'", tool.name));
            }
            seen_tools.push(tool.name.as_str());

            if tool.actions.is_empty() {
                issues.push(format!("tool '{}' declares no actions", tool.name));
            }

            let mut seen_actions: Vec<&str> = Vec::new();
            for action in &tool.actions {
                if seen_actions.contains(&action.name.as_str()) {
                    issues.push(format!("{}: duplicate action '{}'", tool.name, action.name));
                }
                seen_actions.push(action.name.as_str());
                issues.extend(action.self_check(&tool.name));
            }
        }

        issues
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    const YAML: &str = r#"
tools:
  - name: job_tool
    description: Job operations
    actions:
      - name: get_job
        method: GET
        path: /jobs/{jobId}
        params:
          - name: jobId
            type: string
            required: true
      - name: abandon_job
        method: POST
        path: /jobs/{jobId}/abandon
        destructive: true
        params:
          - name: jobId
            type: string
            required: true
"#;

    #[test]
    fn test_resolve_known_action() {
        let registry = ActionRegistry::from_yaml_str(YAML).unwrap();
        let spec = registry.resolve("job_tool", "abandon_job").unwrap();
        assert!(spec.destructive);
        assert!(registry.self_check().is_empty());
    }

    #[test]
    fn test_resolve_unknown_action_lists_available() {
        let registry = ActionRegistry::from_yaml_str(YAML).unwrap();
        match registry.resolve("job_tool", "delete_job").unwrap_err() {
            ActionError::UnknownAction { available, .. } => {
                assert_eq!(available, vec!["get_job", "abandon_job"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_unknown_tool() {
        let registry = ActionRegistry::from_yaml_str(YAML).unwrap();
        let err = registry.resolve("vdb_tool", "get_vdb").unwrap_err();
        assert_eq!(err.kind(), "UnknownToolError");
    }

    #[test]
    fn test_prepare_validation_names_field() {
        let registry = ActionRegistry::from_yaml_str(YAML).unwrap();
        let err = registry
            .prepare("job_tool", "get_job", &Map::new())
            .unwrap_err();
        assert_eq!(err.kind(), "ParameterValidationError");
        assert!(err.to_string().contains("jobId"));
    }

    #[test]
    fn test_prepare_builds_call() {
        let registry = ActionRegistry::from_yaml_str(YAML).unwrap();
        let args = json!({"jobId": "job-9"});
        let call = registry
            .prepare("job_tool", "get_job", args.as_object().unwrap())
            .unwrap();
        assert_eq!(call.path, "/jobs/job-9");
        assert!(call.body.is_none());
    }

    #[test]
    fn test_self_check_duplicates() {
        let doubled = format!("{}{}", YAML, YAML.replace("tools:\n", ""));
        let registry = ActionRegistry::from_yaml_str(&doubled).unwrap();
        let issues = registry.self_check();
        assert!(issues.iter().any(|i| i.contains("duplicate tool 'job_tool'")));
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = ActionRegistry::from_yaml_str("tools: [").unwrap_err();
        assert!(matches!(err, CatalogError::ConfigError(_)));
    }
}
