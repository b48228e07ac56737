use anyhow::Result;
use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dct_mcp_app::bootstrap::{build_server, load_catalog};
use dct_mcp_app::bridge;
use dct_mcp_app::{AppConfig, Command, ListChangedFlag};
use dct_mcp_core::ToolListListener;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::parse();

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match config.command() {
        Command::Validate => validate(&config),
        Command::Toolsets => print_toolsets(&config),
        Command::Serve => serve(&config).await,
    }
}

fn validate(config: &AppConfig) -> Result<()> {
    let loader = load_catalog(config)?;
    loader.load(&config.toolset)?;
    println!(
        "Catalog OK: {} tools, {} toolsets",
        loader.registry().tool_names().len(),
        loader.toolsets().len()
    );
    Ok(())
}

fn print_toolsets(config: &AppConfig) -> Result<()> {
    let loader = load_catalog(config)?;
    let toolsets: Vec<_> = loader
        .toolsets()
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "target_users": t.target_users,
                "tools": t.tools,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&toolsets)?);
    Ok(())
}

async fn serve(config: &AppConfig) -> Result<()> {
    let flag = Arc::new(ListChangedFlag::default());
    let listener: Arc<dyn ToolListListener> = flag.clone();
    let server = build_server(config, Some(listener))?;
    info!("Serving DCT tools on stdio (toolset: {})", config.toolset);

    let stdin = BufReader::new(tokio::io::stdin());
    let served = bridge::run(&server, &flag, stdin, tokio::io::stdout()).await;
    server.flush_telemetry().await;
    served?;

    let stats = server.metrics();
    info!(
        "Session closed: {} invocations, {:.0}% success",
        stats.invocations,
        stats.success_rate() * 100.0
    );
    Ok(())
}
