use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use dct_mcp_client::{ClientConfig, RetryPolicy};

/// Tool server exposing Delphix DCT operations to agents.
#[derive(Debug, Clone, Parser)]
#[command(name = "dct-mcp", version)]
pub struct AppConfig {
    /// DCT API key.
    #[arg(long, env = "DCT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// DCT host, e.g. https://dct.example.com
    #[arg(long, env = "DCT_BASE_URL")]
    pub base_url: Option<String>,

    /// Verify TLS certificates.
    #[arg(long, env = "DCT_VERIFY_SSL", default_value_t = false, action = ArgAction::Set)]
    pub verify_ssl: bool,

    /// Per-attempt request timeout in seconds.
    #[arg(long, env = "DCT_TIMEOUT", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Retries after the first attempt.
    #[arg(long, env = "DCT_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Persona toolset to expose, or `auto`.
    #[arg(long, env = "DCT_TOOLSET", default_value = "self_service")]
    pub toolset: String,

    /// Directory with actions.yaml, toolsets.yaml and confirmation.yaml.
    #[arg(long, env = "DCT_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Record local usage telemetry.
    #[arg(long, env = "DCT_TELEMETRY", default_value_t = false, action = ArgAction::Set)]
    pub telemetry: bool,

    #[arg(long, env = "DCT_TELEMETRY_PATH", default_value = "./logs/sessions.jsonl")]
    pub telemetry_path: PathBuf,

    /// tracing filter directive.
    #[arg(long, env = "DCT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Serve tool calls over stdin/stdout (default).
    Serve,
    /// Load and cross-check the catalog, then exit.
    Validate,
    /// Print the toolset catalogue as JSON.
    Toolsets,
}

impl AppConfig {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    /// Client settings; only `serve` needs them.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let Some(base_url) = self.base_url.as_deref().filter(|s| !s.trim().is_empty()) else {
            bail!("DCT_BASE_URL is required");
        };
        let Some(api_key) = self.api_key.as_deref().filter(|s| !s.trim().is_empty()) else {
            bail!("DCT_API_KEY is required");
        };
        if self.timeout_secs == 0 {
            bail!("DCT_TIMEOUT must be at least 1 second");
        }

        let mut config = ClientConfig::new(base_url, api_key);
        config.verify_ssl = self.verify_ssl;
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.retry = RetryPolicy::with_retries(self.max_retries);
        Ok(config)
    }
}
