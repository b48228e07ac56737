use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use dct_mcp_client::ApiClient;
use dct_mcp_core::{TelemetryHook, ToolListListener, ToolServer};
use dct_mcp_tools::ToolsetLoader;

use crate::config::AppConfig;
use crate::telemetry::JsonlTelemetrySink;

/// Loads the catalog from `--config-dir`, or the bundled copy.
pub fn load_catalog(config: &AppConfig) -> Result<ToolsetLoader> {
    match &config.config_dir {
        Some(dir) => ToolsetLoader::from_dir(dir)
            .with_context(|| format!("Failed to load catalog from {}", dir.display())),
        None => ToolsetLoader::bundled().context("Bundled catalog is invalid"),
    }
}

pub fn build_server(
    config: &AppConfig,
    listener: Option<Arc<dyn ToolListListener>>,
) -> Result<ToolServer> {
    let loader = Arc::new(load_catalog(config)?);
    let client_config = config.client_config()?;
    let client = Arc::new(ApiClient::new(client_config).context("Failed to create DCT client")?);

    let telemetry = if config.telemetry {
        info!("Telemetry enabled: {}", config.telemetry_path.display());
        TelemetryHook::new(Arc::new(JsonlTelemetrySink::new(
            config.telemetry_path.clone(),
        )))
    } else {
        TelemetryHook::disabled()
    };

    let mut builder = ToolServer::builder(loader, client)
        .with_toolset(config.toolset.clone())
        .with_telemetry(telemetry);
    if let Some(listener) = listener {
        builder = builder.with_listener(listener);
    }
    builder
        .build()
        .with_context(|| format!("Failed to activate toolset '{}'", config.toolset))
}
