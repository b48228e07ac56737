//! Which DCT operations need a human to sign off before they run.
//!
//! Rules select operations either by `tool`/`action` name or by HTTP
//! `method` plus a `path` pattern in which `{...}` segments match any single
//! path segment. `*` matches any tool, action or method. The first matching
//! rule wins; operations no rule selects need no confirmation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Invalid confirmation rule #{index}: {reason}")]
    InvalidRule { index: usize, reason: String },
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationLevel {
    #[default]
    None,
    Manual,
}

impl ConfirmationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationLevel::None => "none",
            ConfirmationLevel::Manual => "manual",
        }
    }

    /// Advice shown to an agent that pre-flights an operation.
    pub fn guidance(&self) -> &'static str {
        match self {
            ConfirmationLevel::None => "No confirmation required. Operation can proceed.",
            ConfirmationLevel::Manual => {
                "Manual confirmation required. This is a destructive operation. \
                 The user must explicitly confirm before it is re-invoked with confirmed=true."
            }
        }
    }
}

impl fmt::Display for ConfirmationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operation being checked.
#[derive(Debug, Clone, Copy)]
pub struct OperationRef<'a> {
    pub tool: &'a str,
    pub action: &'a str,
    pub method: &'a str,
    /// Path template as declared, e.g. `/vdbs/{vdbId}/delete`.
    pub path: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub level: ConfirmationLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConfirmationRule {
    pub fn for_action(tool: &str, action: &str, level: ConfirmationLevel) -> Self {
        Self {
            tool: Some(tool.to_string()),
            action: Some(action.to_string()),
            method: None,
            path: None,
            level,
            message: None,
        }
    }

    pub fn for_route(method: &str, path: &str, level: ConfirmationLevel) -> Self {
        Self {
            tool: None,
            action: None,
            method: Some(method.to_string()),
            path: Some(path.to_string()),
            level,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn check(&self) -> Result<(), String> {
        let by_name = self.tool.is_some() || self.action.is_some();
        let by_route = self.method.is_some() || self.path.is_some();
        match (by_name, by_route) {
            (false, false) => Err("rule selects nothing; set tool/action or method/path".into()),
            (true, true) => Err("rule mixes tool/action with method/path selectors".into()),
            (false, true) if self.path.is_none() => Err("method rule needs a path".into()),
            _ => Ok(()),
        }
    }

    pub fn matches(&self, op: &OperationRef<'_>) -> bool {
        if self.tool.is_some() || self.action.is_some() {
            return name_matches(self.tool.as_deref(), op.tool)
                && name_matches(self.action.as_deref(), op.action);
        }
        let method_ok = match self.method.as_deref() {
            None | Some("*") => true,
            Some(m) => m.eq_ignore_ascii_case(op.method),
        };
        method_ok
            && self
                .path
                .as_deref()
                .map(|pattern| path_matches(pattern, op.path))
                .unwrap_or(false)
    }
}

fn name_matches(selector: Option<&str>, value: &str) -> bool {
    match selector {
        None | Some("*") => true,
        Some(name) => name == value,
    }
}

fn is_placeholder(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

fn path_matches(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = pattern.trim_matches('/').split('/').collect();
    let path: Vec<&str> = path.trim_matches('/').split('/').collect();
    pattern.len() == path.len()
        && pattern.iter().zip(&path).all(|(want, got)| {
            if is_placeholder(want) || *want == "*" {
                !got.is_empty()
            } else {
                want == got || (is_placeholder(got) && is_placeholder(want))
            }
        })
}

/// Outcome of a policy lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationRequirement {
    pub level: ConfirmationLevel,
    pub message: String,
}

impl ConfirmationRequirement {
    pub fn is_required(&self) -> bool {
        self.level != ConfirmationLevel::None
    }
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<ConfirmationRule>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfirmationPolicy {
    rules: Vec<ConfirmationRule>,
}

impl ConfirmationPolicy {
    pub fn new(rules: Vec<ConfirmationRule>) -> Result<Self, PolicyError> {
        for (index, rule) in rules.iter().enumerate() {
            rule.check()
                .map_err(|reason| PolicyError::InvalidRule { index, reason })?;
        }
        Ok(Self { rules })
    }

    /// Parses a `rules:` document.
    pub fn from_yaml_str(content: &str) -> Result<Self, PolicyError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: RuleFile = serde_yaml::from_str(content)?;
        Self::new(file.rules)
    }

    pub fn rules(&self) -> &[ConfirmationRule] {
        &self.rules
    }

    pub fn requires_confirmation(&self, op: &OperationRef<'_>) -> ConfirmationRequirement {
        let matched = self
            .rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(op));
        match matched {
            Some((index, rule)) => {
                debug!(
                    "{}.{} matched confirmation rule {} ({})",
                    op.tool, op.action, index, rule.level
                );
                ConfirmationRequirement {
                    level: rule.level,
                    message: rule
                        .message
                        .clone()
                        .unwrap_or_else(|| default_message(rule.level, op)),
                }
            }
            None => ConfirmationRequirement {
                level: ConfirmationLevel::None,
                message: default_message(ConfirmationLevel::None, op),
            },
        }
    }
}

fn default_message(level: ConfirmationLevel, op: &OperationRef<'_>) -> String {
    match level {
        ConfirmationLevel::None => format!("{}.{} runs without confirmation.", op.tool, op.action),
        ConfirmationLevel::Manual => format!(
            "{}.{} ({} {}) is destructive and cannot be undone. Please confirm.",
            op.tool, op.action, op.method, op.path
        ),
    }
}
