//! JSON-lines request loop between an agent and the [`ToolServer`].

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use dct_mcp_core::{ToolListListener, ToolServer};

pub const LIST_CHANGED: &str = "notifications/tools/list_changed";

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

/// Set by the meta-tool controller, drained by the bridge after each request.
#[derive(Debug, Default)]
pub struct ListChangedFlag {
    changed: AtomicBool,
}

impl ListChangedFlag {
    pub fn take(&self) -> bool {
        self.changed.swap(false, Ordering::SeqCst)
    }
}

impl ToolListListener for ListChangedFlag {
    fn tool_list_changed(&self, active: &[String]) {
        debug!("Tool list changed: {} domain tools active", active.len());
        self.changed.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Serves requests until the reader is exhausted.
pub async fn run<R, W>(
    server: &ToolServer,
    flag: &ListChangedFlag,
    reader: R,
    mut writer: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(server, &line).await;
        write_line(&mut writer, &response).await?;
        if flag.take() {
            write_line(&mut writer, &json!({ "method": LIST_CHANGED })).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

async fn handle_line(server: &ToolServer, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!("Malformed request line: {}", e);
            return error_response(Value::Null, PARSE_ERROR, format!("Parse error: {}", e));
        }
    };

    match request.method.as_str() {
        "tools/list" => json!({
            "id": request.id,
            "result": { "tools": server.list_tools() },
        }),
        "tools/call" => match serde_json::from_value::<CallParams>(request.params) {
            Ok(call) => {
                let envelope = server.invoke(&call.name, call.arguments).await;
                json!({ "id": request.id, "result": envelope.to_json() })
            }
            Err(e) => error_response(request.id, INVALID_PARAMS, format!("Invalid params: {}", e)),
        },
        other => error_response(request.id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
    }
}

fn error_response(id: Value, code: i64, message: String) -> Value {
    json!({ "id": id, "error": { "code": code, "message": message } })
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, value: &Value) -> Result<()> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
