//! Inbound control-message routing.

use std::sync::Arc;

use crate::events::{
    ClientEvent, ConversationItem, ServerEvent, response_tool_call, response_transcript,
};
use crate::session::SharedTransport;
use crate::sink::{MessageRole, RenderSink};
use crate::tools::ToolDispatcher;

/// Routes inbound control messages to the render sink and tool dispatcher.
///
/// `handle` is invoked once per inbound message, in delivery order, and
/// completes before the next message is dequeued. Only `response.done`
/// triggers any action; every other message type is dropped silently for
/// forward compatibility. Nothing here ever aborts message processing:
/// malformed payloads are logged and skipped.
pub struct ControlHandler {
    outbound: SharedTransport,
    dispatcher: Arc<ToolDispatcher>,
    sink: Arc<dyn RenderSink>,
}

impl ControlHandler {
    /// Create a handler writing results back through `outbound`.
    pub fn new(
        outbound: SharedTransport,
        dispatcher: Arc<ToolDispatcher>,
        sink: Arc<dyn RenderSink>,
    ) -> Self {
        Self { outbound, dispatcher, sink }
    }

    /// Process one inbound control message.
    pub async fn handle(&self, event: ServerEvent) {
        match event {
            ServerEvent::ResponseDone { response, .. } => {
                if let Some(transcript) = response_transcript(&response) {
                    self.sink.show_message(transcript, MessageRole::Assistant);
                }

                if let Some(call) = response_tool_call(&response) {
                    let call_id = call.call_id.clone();
                    if let Some(result) = self.dispatcher.dispatch(&call).await {
                        self.send_tool_result(&call_id, &result).await;
                    }
                }
            }
            other => {
                tracing::debug!(event = ?other, "ignoring unhandled control message");
            }
        }
    }

    /// Emit the tool result followed by a request for the next turn.
    ///
    /// The result must be acknowledged before the new turn is requested, or
    /// the remote endpoint has nothing to reason over.
    async fn send_tool_result(&self, call_id: &str, result: &serde_json::Value) {
        let output = match result {
            serde_json::Value::String(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        };

        let item = ConversationItem::tool_response(call_id, output);
        let item = match serde_json::to_value(&item) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize tool result item");
                return;
            }
        };

        if let Err(e) = self.outbound.send(ClientEvent::ConversationItemCreate { item }).await {
            tracing::warn!(error = %e, call_id, "failed to send tool result");
            return;
        }
        if let Err(e) = self.outbound.send(ClientEvent::ResponseCreate { config: None }).await {
            tracing::warn!(error = %e, call_id, "failed to request next turn");
        }
    }
}
