//! Toolset loader.
//!
//! Parses the three catalog documents once, flattens persona inheritance, and
//! validates the whole graph before anything is served: every tool a persona
//! names must exist, every path placeholder must bind, and every destructive
//! action must resolve to manual confirmation. Validation covers every
//! persona, not just the active one, so a later `enable_toolset` cannot trip
//! over a broken catalog.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use dct_mcp_policy::{ConfirmationLevel, ConfirmationPolicy, OperationRef};

use crate::action::ToolDefinition;
use crate::error::CatalogError;
use crate::registry::ActionRegistry;
use crate::toolset::{parse_toolsets, resolve_all, ResolvedToolset};

/// Selecting this name starts with meta-tools only.
pub const AUTO_TOOLSET: &str = "auto";

pub const ACTIONS_FILE: &str = "actions.yaml";
pub const TOOLSETS_FILE: &str = "toolsets.yaml";
pub const CONFIRMATION_FILE: &str = "confirmation.yaml";

const BUNDLED_ACTIONS: &str = include_str!("../catalog/actions.yaml");
const BUNDLED_TOOLSETS: &str = include_str!("../catalog/toolsets.yaml");
const BUNDLED_CONFIRMATION: &str = include_str!("../catalog/confirmation.yaml");

#[derive(Debug, Clone)]
pub enum LoadedToolset {
    /// No domain tools yet; the meta-tool controller drives activation.
    Auto,
    Persona {
        name: String,
        tools: Vec<Arc<ToolDefinition>>,
    },
}

#[derive(Debug)]
pub struct ToolsetLoader {
    registry: ActionRegistry,
    toolsets: Vec<ResolvedToolset>,
    policy: ConfirmationPolicy,
}

impl ToolsetLoader {
    /// The catalog compiled into the binary.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_yaml(BUNDLED_ACTIONS, BUNDLED_TOOLSETS, BUNDLED_CONFIRMATION)
    }

    /// Reads catalog files from `dir`. Missing files fall back to the bundled copy.
    pub fn from_dir(dir: &Path) -> Result<Self, CatalogError> {
        if !dir.is_dir() {
            return Err(CatalogError::ConfigError(format!(
                "Catalog directory not found: {}",
                dir.display()
            )));
        }
        let read = |file: &str, bundled: &'static str| -> Result<String, CatalogError> {
            let path = dir.join(file);
            if path.exists() {
                debug!("Loading catalog file {}", path.display());
                Ok(std::fs::read_to_string(&path)?)
            } else {
                Ok(bundled.to_string())
            }
        };
        let actions = read(ACTIONS_FILE, BUNDLED_ACTIONS)?;
        let toolsets = read(TOOLSETS_FILE, BUNDLED_TOOLSETS)?;
        let confirmation = read(CONFIRMATION_FILE, BUNDLED_CONFIRMATION)?;
        Self::from_yaml(&actions, &toolsets, &confirmation)
    }

    pub fn from_yaml(
        actions: &str,
        toolsets: &str,
        confirmation: &str,
    ) -> Result<Self, CatalogError> {
        let registry = ActionRegistry::from_yaml_str(actions)?;
        let personas = parse_toolsets(toolsets)?;
        let policy = ConfirmationPolicy::from_yaml_str(confirmation)?;

        let mut issues = registry.self_check();
        let toolsets = match resolve_all(&personas, &[AUTO_TOOLSET]) {
            Ok(resolved) => resolved,
            Err(found) => {
                issues.extend(found);
                Vec::new()
            }
        };

        for toolset in &toolsets {
            if toolset.tools.is_empty() {
                issues.push(format!("toolset '{}' contains no tools", toolset.name));
            }
            for tool in &toolset.tools {
                if !registry.contains(tool) {
                    issues.push(format!(
                        "toolset '{}' references unknown tool '{}'",
                        toolset.name, tool
                    ));
                }
            }
        }

        for tool in registry.tools() {
            for action in tool.actions.iter().filter(|a| a.destructive) {
                let requirement = policy.requires_confirmation(&OperationRef {
                    tool: &tool.name,
                    action: &action.name,
                    method: action.method.as_str(),
                    path: &action.path,
                });
                if requirement.level < ConfirmationLevel::Manual {
                    issues.push(format!(
                        "{}.{} is destructive but no confirmation rule requires manual approval",
                        tool.name, action.name
                    ));
                }
            }
        }

        if !issues.is_empty() {
            issues.sort();
            return Err(CatalogError::Invalid(issues));
        }

        info!(
            "Catalog loaded: {} tools, {} toolsets, {} confirmation rules",
            registry.tool_names().len(),
            toolsets.len(),
            policy.rules().len()
        );

        Ok(Self {
            registry,
            toolsets,
            policy,
        })
    }

    /// Resolves `selection` to a toolset, or the `auto` pseudo-persona.
    /// Names match after trimming, ignoring ASCII case.
    pub fn load(&self, selection: &str) -> Result<LoadedToolset, CatalogError> {
        let selection = selection.trim();
        if selection.eq_ignore_ascii_case(AUTO_TOOLSET) {
            return Ok(LoadedToolset::Auto);
        }
        let toolset = self.toolset(selection).ok_or_else(|| self.unknown(selection))?;
        Ok(LoadedToolset::Persona {
            name: toolset.name.clone(),
            tools: self.tools_for(&toolset.name)?,
        })
    }

    /// Tool definitions of one persona, in declaration order.
    pub fn tools_for(&self, persona: &str) -> Result<Vec<Arc<ToolDefinition>>, CatalogError> {
        let toolset = self.toolset(persona).ok_or_else(|| self.unknown(persona))?;
        Ok(toolset
            .tools
            .iter()
            .filter_map(|name| self.registry.get(name))
            .collect())
    }

    pub fn toolset(&self, name: &str) -> Option<&ResolvedToolset> {
        let name = name.trim();
        self.toolsets
            .iter()
            .find(|t| t.name == name)
            .or_else(|| self.toolsets.iter().find(|t| t.name.eq_ignore_ascii_case(name)))
    }

    pub fn toolsets(&self) -> &[ResolvedToolset] {
        &self.toolsets
    }

    pub fn toolset_names(&self) -> Vec<String> {
        self.toolsets.iter().map(|t| t.name.clone()).collect()
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &ConfirmationPolicy {
        &self.policy
    }

    pub fn unknown(&self, name: &str) -> CatalogError {
        CatalogError::UnknownPersona {
            name: name.to_string(),
            available: self.toolset_names(),
        }
    }
}
