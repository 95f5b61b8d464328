//! Integration tests for inbound control-message routing and tool dispatch.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::Stream;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voicelink::{
    ClientEvent, ControlHandler, MessageRole, RenderSink, Result, SEARCH_FALLBACK, SearchTool,
    ServerEvent, ToolDispatcher, Transport, TransportEvent,
};

/// Transport double that records every outbound message.
#[derive(Debug, Default)]
struct RecordingTransport {
    sent: Mutex<Vec<ClientEvent>>,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<serde_json::Value> {
        self.sent.lock().unwrap().iter().map(|e| serde_json::to_value(e).unwrap()).collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn transport_id(&self) -> &str {
        "recording"
    }

    fn is_open(&self) -> bool {
        true
    }

    async fn send(&self, event: ClientEvent) -> Result<()> {
        self.sent.lock().unwrap().push(event);
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        None
    }

    fn events(&self) -> std::pin::Pin<Box<dyn Stream<Item = TransportEvent> + Send + '_>> {
        Box::pin(futures::stream::empty())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Sink double that records everything pushed at it.
#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<(&'static str, String)>>,
    errors: Mutex<Vec<String>>,
}

impl RenderSink for RecordingSink {
    fn show_message(&self, text: &str, role: MessageRole) {
        self.messages.lock().unwrap().push((role.as_str(), text.to_string()));
    }

    fn show_error(&self, text: &str) {
        self.errors.lock().unwrap().push(text.to_string());
    }

    fn set_status(&self, _text: &str) {}
    fn set_connected(&self, _connected: bool) {}
}

fn response_done(response: serde_json::Value) -> ServerEvent {
    serde_json::from_value(json!({ "type": "response.done", "response": response })).unwrap()
}

fn search_tool_handler(
    server: &MockServer,
    sink: Arc<RecordingSink>,
) -> (Arc<RecordingTransport>, ControlHandler) {
    let endpoint = Url::parse(&format!("{}/search", server.uri())).unwrap();
    let mut dispatcher = ToolDispatcher::new();
    dispatcher
        .register(SearchTool::definition(), Arc::new(SearchTool::new(endpoint, sink.clone())));

    let transport = Arc::new(RecordingTransport::default());
    let handler = ControlHandler::new(transport.clone(), Arc::new(dispatcher), sink);
    (transport, handler)
}

#[tokio::test]
async fn transcripts_render_in_delivery_order() {
    let sink = Arc::new(RecordingSink::default());
    let transport = Arc::new(RecordingTransport::default());
    let handler = ControlHandler::new(transport.clone(), Arc::new(ToolDispatcher::new()), sink.clone());

    for text in ["first reply", "second reply", "third reply"] {
        handler
            .handle(response_done(json!({
                "output": [{ "content": [{ "transcript": text }] }]
            })))
            .await;
    }

    let messages = sink.messages.lock().unwrap().clone();
    assert_eq!(
        messages,
        vec![
            ("assistant", "first reply".to_string()),
            ("assistant", "second reply".to_string()),
            ("assistant", "third reply".to_string()),
        ]
    );
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn search_call_round_trips_result_and_requests_next_turn() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/rust"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "The Rust Language",
            "snippet": "A systems programming language.",
            "source": "https://example.com/rust"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let (transport, handler) = search_tool_handler(&server, sink.clone());

    handler
        .handle(response_done(json!({
            "output": [{
                "type": "function_call",
                "call_id": "call_1",
                "name": "search_web",
                "arguments": "{\"query\":\"rust\"}"
            }]
        })))
        .await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 2, "expected tool result then next-turn request: {sent:?}");

    assert_eq!(sent[0]["type"], "conversation.item.create");
    assert_eq!(sent[0]["item"]["type"], "function_call_output");
    assert_eq!(sent[0]["item"]["call_id"], "call_1");
    let output: serde_json::Value =
        serde_json::from_str(sent[0]["item"]["output"].as_str().unwrap()).unwrap();
    assert_eq!(
        output,
        json!({
            "title": "The Rust Language",
            "snippet": "A systems programming language.",
            "source": "https://example.com/rust"
        })
    );

    assert_eq!(sent[1]["type"], "response.create");

    // The result card is rendered with the tool role.
    let messages = sink.messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "tool");
    assert!(messages[0].1.contains("The Rust Language"));
    assert!(messages[0].1.contains("https://example.com/rust"));
}

#[tokio::test]
async fn failed_search_degrades_to_fallback_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let (transport, handler) = search_tool_handler(&server, sink.clone());

    handler
        .handle(response_done(json!({
            "output": [{
                "type": "function_call",
                "call_id": "call_2",
                "name": "search_web",
                "arguments": "{\"query\":\"rust\"}"
            }]
        })))
        .await;

    // The conversation still advances, with the fallback string as output.
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["item"]["output"], SEARCH_FALLBACK);
    assert_eq!(sent[1]["type"], "response.create");

    // The failure is user-visible exactly once.
    assert_eq!(sink.errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_tool_arguments_degrade_to_fallback_text() {
    let server = MockServer::start().await;

    let sink = Arc::new(RecordingSink::default());
    let (transport, handler) = search_tool_handler(&server, sink.clone());

    handler
        .handle(response_done(json!({
            "output": [{
                "type": "function_call",
                "call_id": "call_3",
                "name": "search_web",
                "arguments": "this is not json"
            }]
        })))
        .await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["item"]["output"], SEARCH_FALLBACK);
}

#[tokio::test]
async fn unregistered_tool_name_produces_no_outbound_messages() {
    let sink = Arc::new(RecordingSink::default());
    let transport = Arc::new(RecordingTransport::default());
    let handler =
        ControlHandler::new(transport.clone(), Arc::new(ToolDispatcher::new()), sink.clone());

    handler
        .handle(response_done(json!({
            "output": [{
                "type": "function_call",
                "call_id": "call_4",
                "name": "no_such_tool",
                "arguments": "{}"
            }]
        })))
        .await;

    assert!(transport.sent().is_empty());
    assert!(sink.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_message_types_are_dropped_silently() {
    let sink = Arc::new(RecordingSink::default());
    let transport = Arc::new(RecordingTransport::default());
    let handler =
        ControlHandler::new(transport.clone(), Arc::new(ToolDispatcher::new()), sink.clone());

    let event: ServerEvent =
        serde_json::from_value(json!({ "type": "input_audio_buffer.speech_started" })).unwrap();
    handler.handle(event).await;

    assert!(transport.sent().is_empty());
    assert!(sink.messages.lock().unwrap().is_empty());
    assert!(sink.errors.lock().unwrap().is_empty());
}
