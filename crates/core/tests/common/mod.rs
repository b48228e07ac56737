#![allow(dead_code)]

use async_trait::async_trait;
use dct_mcp_client::*;
use dct_mcp_core::*;
use dct_mcp_tools::ToolsetLoader;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Counts every request and answers from a script, then with `200 {}`.
pub struct FakeTransport {
    script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    pub seen: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new(script: Vec<Result<RawResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        self.seen.lock().push(request);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(RawResponse::new(200, "{}")))
    }
}

pub fn status(code: u16, body: &str) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::new(code, body))
}

pub fn loader() -> Arc<ToolsetLoader> {
    Arc::new(ToolsetLoader::bundled().unwrap())
}

pub fn client(transport: Arc<FakeTransport>) -> Arc<ApiClient> {
    let config = ClientConfig::new("https://dct.example.com", "apikey-123");
    Arc::new(ApiClient::with_transport(config, transport).unwrap())
}

pub fn server(toolset: &str, transport: Arc<FakeTransport>) -> ToolServer {
    ToolServer::builder(loader(), client(transport))
        .with_toolset(toolset)
        .build()
        .unwrap()
}

/// Records every tool-list notification.
#[derive(Default)]
pub struct RecordingListener {
    pub changes: Mutex<Vec<Vec<String>>>,
}

impl ToolListListener for RecordingListener {
    fn tool_list_changed(&self, active: &[String]) {
        self.changes.lock().push(active.to_vec());
    }
}
