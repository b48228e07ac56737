#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use async_trait::async_trait;
use common::*;
use dct_mcp_core::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn auto_server(listener: Arc<RecordingListener>) -> (ToolServer, Arc<FakeTransport>) {
    let transport = FakeTransport::new(vec![]);
    let server = ToolServer::builder(loader(), client(transport.clone()))
        .with_toolset("auto")
        .with_listener(listener)
        .build()
        .unwrap();
    (server, transport)
}

fn names(server: &ToolServer) -> Vec<String> {
    server.list_tools().into_iter().map(|t| t.name).collect()
}

#[tokio::test]
async fn test_auto_mode_starts_with_meta_tools_only() {
    let (server, _) = auto_server(Arc::new(RecordingListener::default()));
    let mut expected = vec!["health_ping".to_string()];
    expected.extend(META_TOOL_NAMES.iter().map(|s| s.to_string()));
    assert_eq!(names(&server), expected);
}

#[tokio::test]
async fn test_domain_tool_inactive_before_enable() {
    let (server, transport) = auto_server(Arc::new(RecordingListener::default()));
    let envelope = server
        .invoke("vdb_tool", json!({"action": "get_vdb", "vdbId": "vdb-1"}))
        .await;
    assert_eq!(envelope.error_kind(), Some(ErrorKind::ToolsetNotActiveError));
    let providers = envelope.to_json()["details"]["toolsets"].clone();
    assert!(providers
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t == "self_service"));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_enabled_tools_match_persona_definition() {
    let listener = Arc::new(RecordingListener::default());
    let (server, _) = auto_server(listener.clone());

    let described = server
        .invoke("get_toolset_tools", json!({"toolset_name": "self_service"}))
        .await;
    let described_names: Vec<String> = described.to_json()["data"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();

    let enabled = server
        .invoke("enable_toolset", json!({"toolset_name": "self_service"}))
        .await;
    assert_eq!(enabled.to_json()["data"]["status"], "enabled");

    let expected: Vec<String> = server
        .loader()
        .tools_for("self_service")
        .unwrap()
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(described_names, expected);
    assert_eq!(server.session().active_tools(), expected);
    assert_eq!(listener.changes.lock().len(), 1);
    assert!(names(&server).contains(&"vdb_tool".to_string()));
}

#[tokio::test]
async fn test_enable_is_a_union_and_idempotent() {
    let listener = Arc::new(RecordingListener::default());
    let (server, _) = auto_server(listener.clone());

    server
        .invoke("enable_toolset", json!({"toolset_name": "self_service"}))
        .await;
    let second = server
        .invoke("enable_toolset", json!({"toolset_name": "reporting_insights"}))
        .await;
    assert_eq!(second.to_json()["data"]["tools_added"], json!(["reporting_tool"]));

    let again = server
        .invoke("enable_toolset", json!({"toolset_name": "self_service"}))
        .await;
    let value = again.to_json();
    assert_eq!(value["data"]["status"], "already_enabled");
    assert_eq!(value["data"]["tools_added"], json!([]));
    assert_eq!(
        server.session().enabled_toolsets(),
        vec!["self_service", "reporting_insights"]
    );
    assert_eq!(listener.changes.lock().len(), 2);
}

#[tokio::test]
async fn test_disable_twice_leaves_same_state() {
    let listener = Arc::new(RecordingListener::default());
    let (server, _) = auto_server(listener.clone());

    server
        .invoke("enable_toolset", json!({"toolset_name": "platform_admin"}))
        .await;
    let first = server.invoke("disable_toolset", json!({})).await;
    assert_eq!(first.to_json()["data"]["status"], "disabled");
    let after_first = server.session().snapshot();

    let second = server.invoke("disable_toolset", json!({})).await;
    assert_eq!(second.to_json()["data"]["status"], "already_minimal");
    assert_eq!(server.session().snapshot(), after_first);
    assert!(after_first.tools.is_empty());
    assert_eq!(listener.changes.lock().len(), 2);
}

#[tokio::test]
async fn test_every_persona_can_be_enabled() {
    let (server, _) = auto_server(Arc::new(RecordingListener::default()));
    for toolset in server.loader().toolset_names() {
        server.invoke("disable_toolset", json!({})).await;
        let envelope = server
            .invoke("enable_toolset", json!({"toolset_name": toolset}))
            .await;
        assert!(envelope.is_success(), "{} failed: {:?}", toolset, envelope);
    }
}

#[tokio::test]
async fn test_enable_unknown_persona_is_an_envelope() {
    let (server, _) = auto_server(Arc::new(RecordingListener::default()));
    let envelope = server
        .invoke("enable_toolset", json!({"toolset_name": "nobody"}))
        .await;
    assert_eq!(envelope.error_kind(), Some(ErrorKind::UnknownPersonaError));
    let value = envelope.to_json();
    assert_eq!(value["tool"], "enable_toolset");
    assert!(value.get("action").is_none());
    assert_eq!(value["details"]["toolset"], "nobody");
    assert!(value["details"]["available_toolsets"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t == "platform_admin"));
}

#[tokio::test]
async fn test_toolset_names_ignore_case() {
    let (server, _) = auto_server(Arc::new(RecordingListener::default()));
    let described = server
        .invoke("get_toolset_tools", json!({"toolset_name": "Reporting_Insights"}))
        .await;
    assert!(described.is_success(), "{:?}", described);

    let enabled = server
        .invoke("enable_toolset", json!({"toolset_name": " SELF_SERVICE "}))
        .await;
    assert!(enabled.is_success(), "{:?}", enabled);
    assert_eq!(server.session().enabled_toolsets(), vec!["self_service"]);
}

#[tokio::test]
async fn test_list_available_toolsets_marks_enabled() {
    let (server, _) = auto_server(Arc::new(RecordingListener::default()));
    server
        .invoke("enable_toolset", json!({"toolset_name": "reporting_insights"}))
        .await;
    let value = server.invoke("list_available_toolsets", json!({})).await.to_json();
    let toolsets = value["data"]["toolsets"].as_array().unwrap();
    let reporting = toolsets
        .iter()
        .find(|t| t["name"] == "reporting_insights")
        .unwrap();
    assert_eq!(reporting["enabled"], true);
    assert_eq!(reporting["tool_count"], 2);
}

#[tokio::test]
async fn test_check_operation_confirmation_is_read_only() {
    let (server, transport) = auto_server(Arc::new(RecordingListener::default()));
    let value = server
        .invoke(
            "check_operation_confirmation",
            json!({"tool_name": "vdb_tool", "action_name": "delete_vdb"}),
        )
        .await
        .to_json();
    assert_eq!(value["data"]["confirmation_level"], "manual");
    assert_eq!(value["data"]["requires_confirmation"], true);

    let safe = server
        .invoke(
            "check_operation_confirmation",
            json!({"tool_name": "vdb_tool", "action_name": "get_vdb"}),
        )
        .await
        .to_json();
    assert_eq!(safe["data"]["confirmation_level"], "none");
    assert!(server.session().active_tools().is_empty());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_fixed_mode_does_not_offer_meta_tools() {
    let transport = FakeTransport::new(vec![]);
    let server = server("self_service", transport);
    let envelope = server
        .invoke("enable_toolset", json!({"toolset_name": "platform_admin"}))
        .await;
    assert_eq!(envelope.error_kind(), Some(ErrorKind::UnknownToolError));
    assert_eq!(server.session().enabled_toolsets(), vec!["self_service"]);
}

struct ChannelSink(mpsc::UnboundedSender<TelemetryEvent>);

#[async_trait]
impl TelemetrySink for ChannelSink {
    async fn record(&self, event: TelemetryEvent) -> Result<(), TelemetryError> {
        self.0
            .send(event)
            .map_err(|e| TelemetryError::Sink(e.to_string()))
    }
}

struct BrokenSink;

#[async_trait]
impl TelemetrySink for BrokenSink {
    async fn record(&self, _event: TelemetryEvent) -> Result<(), TelemetryError> {
        Err(TelemetryError::Sink("disk full".into()))
    }
}

#[tokio::test]
async fn test_telemetry_receives_invocation_event() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let transport = FakeTransport::new(vec![]);
    let server = ToolServer::builder(loader(), client(transport))
        .with_telemetry(TelemetryHook::new(Arc::new(ChannelSink(tx))))
        .build()
        .unwrap();

    server
        .invoke("vdb_tool", json!({"action": "delete_vdb", "vdbId": "vdb-1"}))
        .await;

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.tool, "vdb_tool");
    assert_eq!(event.action.as_deref(), Some("delete_vdb"));
    assert_eq!(event.status, "confirmation_required");
}

#[tokio::test]
async fn test_failing_telemetry_does_not_change_result() {
    let transport = FakeTransport::new(vec![status(200, r#"{"id": "vdb-1"}"#)]);
    let server = ToolServer::builder(loader(), client(transport))
        .with_telemetry(TelemetryHook::new(Arc::new(BrokenSink)))
        .build()
        .unwrap();

    let envelope = server
        .invoke("vdb_tool", json!({"action": "get_vdb", "vdbId": "vdb-1"}))
        .await;
    assert!(envelope.is_success());
    tokio::task::yield_now().await;
}

#[tokio::test]
async fn test_malformed_arguments_still_emit_telemetry() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let transport = FakeTransport::new(vec![]);
    let server = ToolServer::builder(loader(), client(transport.clone()))
        .with_telemetry(TelemetryHook::new(Arc::new(ChannelSink(tx))))
        .build()
        .unwrap();

    let envelope = server
        .invoke(
            "vdb_tool",
            json!({"action": "get_vdb", "vdbId": "vdb-1", "confirmed": "maybe"}),
        )
        .await;
    assert_eq!(envelope.error_kind(), Some(ErrorKind::ParameterValidationError));

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.tool, "vdb_tool");
    assert_eq!(event.status, "error");
    assert_eq!(server.metrics().invocations, 1);
    assert_eq!(transport.calls(), 0);
}

struct SlowSink(Arc<AtomicUsize>);

#[async_trait]
impl TelemetrySink for SlowSink {
    async fn record(&self, _event: TelemetryEvent) -> Result<(), TelemetryError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_flush_waits_for_in_flight_telemetry() {
    let recorded = Arc::new(AtomicUsize::new(0));
    let hook = TelemetryHook::new(Arc::new(SlowSink(recorded.clone())));
    let transport = FakeTransport::new(vec![]);
    let server = ToolServer::builder(loader(), client(transport))
        .with_telemetry(hook.clone())
        .build()
        .unwrap();

    server.invoke("health_ping", json!({})).await;
    server
        .invoke("vdb_tool", json!({"action": "delete_vdb", "vdbId": "vdb-1"}))
        .await;
    assert_eq!(recorded.load(Ordering::SeqCst), 0);

    server.flush_telemetry().await;
    assert_eq!(recorded.load(Ordering::SeqCst), 2);
    assert_eq!(hook.pending(), 0);
}
