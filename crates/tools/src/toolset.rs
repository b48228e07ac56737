//! Persona toolsets and inheritance.

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// A persona as declared in `toolsets.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaToolset {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_users: Option<String>,
    #[serde(default)]
    pub inherit: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// A persona with inheritance flattened: parents first, duplicates dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedToolset {
    pub name: String,
    pub description: String,
    pub target_users: Option<String>,
    pub tools: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ToolsetsFile {
    #[serde(default)]
    toolsets: Vec<PersonaToolset>,
}

pub fn parse_toolsets(content: &str) -> Result<Vec<PersonaToolset>, CatalogError> {
    let file: ToolsetsFile = serde_yaml::from_str(content)
        .map_err(|e| CatalogError::ConfigError(format!("Invalid toolsets YAML: {}", e)))?;
    Ok(file.toolsets)
}

/// Flattens every persona. Dangling parents, cycles and duplicate names are
/// all reported together.
pub fn resolve_all(
    personas: &[PersonaToolset],
    reserved: &[&str],
) -> Result<Vec<ResolvedToolset>, Vec<String>> {
    let mut issues = Vec::new();
    let mut names: Vec<&str> = Vec::new();
    for persona in personas {
        if names.contains(&persona.name.as_str()) {
            issues.push(format!("duplicate toolset '{}'", persona.name));
        }
        if reserved.contains(&persona.name.as_str()) {
            issues.push(format!("toolset name '{}' is reserved", persona.name));
        }
        names.push(persona.name.as_str());
    }

    let mut resolved = Vec::with_capacity(personas.len());
    for persona in personas {
        let mut tools = Vec::new();
        let mut stack = Vec::new();
        match collect(persona, personas, &mut stack, &mut tools) {
            Ok(()) => resolved.push(ResolvedToolset {
                name: persona.name.clone(),
                description: persona.description.clone(),
                target_users: persona.target_users.clone(),
                tools,
            }),
            Err(issue) => {
                if !issues.contains(&issue) {
                    issues.push(issue);
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(resolved)
    } else {
        Err(issues)
    }
}

fn collect<'a>(
    persona: &'a PersonaToolset,
    all: &'a [PersonaToolset],
    stack: &mut Vec<&'a str>,
    out: &mut Vec<String>,
) -> Result<(), String> {
    if stack.contains(&persona.name.as_str()) {
        stack.push(persona.name.as_str());
        return Err(format!("toolset inheritance cycle: {}", stack.join(" -> ")));
    }
    stack.push(persona.name.as_str());

    for parent_name in &persona.inherit {
        let parent = all
            .iter()
            .find(|p| &p.name == parent_name)
            .ok_or_else(|| {
                format!(
                    "toolset '{}' inherits unknown toolset '{}'",
                    persona.name, parent_name
                )
            })?;
        collect(parent, all, stack, out)?;
    }
    for tool in &persona.tools {
        if !out.contains(tool) {
            out.push(tool.clone());
        }
    }

    stack.pop();
    Ok(())
}
