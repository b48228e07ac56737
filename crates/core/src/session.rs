//! The active tool set for one protocol session.
//!
//! [`RegisteredToolSet`] is owned by the server and handed to the meta-tool
//! controller by reference. Reads are public; the mutators are crate-private
//! and only the controller calls them.

use parking_lot::RwLock;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationMode {
    /// One persona for the life of the process; meta-tools are not offered.
    Fixed(String),
    /// Personas are enabled and disabled at runtime through meta-tools.
    Auto,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolSetSnapshot {
    pub tools: Vec<String>,
    pub toolsets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EnableOutcome {
    pub added: Vec<String>,
    pub already_enabled: bool,
}

#[derive(Debug)]
pub struct RegisteredToolSet {
    mode: ActivationMode,
    state: RwLock<ToolSetSnapshot>,
}

impl RegisteredToolSet {
    pub fn fixed(persona: &str, tools: Vec<String>) -> Self {
        Self {
            mode: ActivationMode::Fixed(persona.to_string()),
            state: RwLock::new(ToolSetSnapshot {
                tools,
                toolsets: vec![persona.to_string()],
            }),
        }
    }

    pub fn auto() -> Self {
        Self {
            mode: ActivationMode::Auto,
            state: RwLock::new(ToolSetSnapshot::default()),
        }
    }

    pub fn mode(&self) -> &ActivationMode {
        &self.mode
    }

    pub fn is_auto(&self) -> bool {
        self.mode == ActivationMode::Auto
    }

    pub fn snapshot(&self) -> ToolSetSnapshot {
        self.state.read().clone()
    }

    pub fn is_active(&self, tool: &str) -> bool {
        self.state.read().tools.iter().any(|t| t == tool)
    }

    pub fn active_tools(&self) -> Vec<String> {
        self.state.read().tools.clone()
    }

    pub fn enabled_toolsets(&self) -> Vec<String> {
        self.state.read().toolsets.clone()
    }

    /// Unions `tools` into the active set under one write lock.
    pub(crate) fn enable(&self, toolset: &str, tools: &[String]) -> EnableOutcome {
        let mut state = self.state.write();
        let already_enabled = state.toolsets.iter().any(|t| t == toolset);
        if !already_enabled {
            state.toolsets.push(toolset.to_string());
        }
        let mut added = Vec::new();
        for tool in tools {
            if !state.tools.contains(tool) {
                state.tools.push(tool.clone());
                added.push(tool.clone());
            }
        }
        EnableOutcome {
            added,
            already_enabled,
        }
    }

    /// Drops every domain tool. Returns how many were active.
    pub(crate) fn clear(&self) -> usize {
        let mut state = self.state.write();
        let removed = state.tools.len();
        state.tools.clear();
        state.toolsets.clear();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_auto_starts_empty() {
        let set = RegisteredToolSet::auto();
        assert!(set.is_auto());
        assert_eq!(set.snapshot(), ToolSetSnapshot::default());
    }

    #[test]
    fn test_fixed_starts_with_persona() {
        let set = RegisteredToolSet::fixed("self_service", names(&["vdb_tool"]));
        assert!(!set.is_auto());
        assert!(set.is_active("vdb_tool"));
        assert_eq!(set.enabled_toolsets(), vec!["self_service"]);
    }

    #[test]
    fn test_enable_unions_and_is_idempotent() {
        let set = RegisteredToolSet::auto();
        let first = set.enable("a", &names(&["vdb_tool", "job_tool"]));
        assert_eq!(first.added, names(&["vdb_tool", "job_tool"]));
        assert!(!first.already_enabled);

        let second = set.enable("b", &names(&["job_tool", "engine_tool"]));
        assert_eq!(second.added, names(&["engine_tool"]));

        let again = set.enable("a", &names(&["vdb_tool", "job_tool"]));
        assert!(again.already_enabled);
        assert!(again.added.is_empty());
        assert_eq!(set.active_tools(), names(&["vdb_tool", "job_tool", "engine_tool"]));
        assert_eq!(set.enabled_toolsets(), names(&["a", "b"]));
    }

    #[test]
    fn test_clear_twice_is_stable() {
        let set = RegisteredToolSet::auto();
        set.enable("a", &names(&["vdb_tool"]));
        assert_eq!(set.clear(), 1);
        let after_first = set.snapshot();
        assert_eq!(set.clear(), 0);
        assert_eq!(set.snapshot(), after_first);
        assert_eq!(after_first, ToolSetSnapshot::default());
    }
}
