//! Tool dispatch and the built-in web search tool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::config::ToolDefinition;
use crate::error::{Result, SessionError};
use crate::events::ToolCall;
use crate::sink::{MessageRole, RenderSink};

/// Fallback result returned when the search tool cannot complete.
pub const SEARCH_FALLBACK: &str = "Could not perform search";

/// Handler for tool/function calls from the remote endpoint.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute a tool call and return a serializable result.
    async fn execute(&self, call: &ToolCall) -> Result<Value>;
}

/// Maps tool names to handlers.
///
/// Adding a tool is one `register` call; nothing else changes.
#[derive(Default)]
pub struct ToolDispatcher {
    tools: HashMap<String, (ToolDefinition, Arc<dyn ToolHandler>)>,
}

impl ToolDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with its manifest entry and handler.
    pub fn register(&mut self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) {
        self.tools.insert(definition.name.clone(), (definition, handler));
    }

    /// Manifest entries for all registered tools.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|(def, _)| def.clone()).collect()
    }

    /// Dispatch a call to its registered handler.
    ///
    /// Returns `None` for an unregistered tool name — the call is ignored
    /// and no output is produced. Handler failures degrade to an error
    /// object so the conversation continues.
    pub async fn dispatch(&self, call: &ToolCall) -> Option<Value> {
        let handler = match self.tools.get(&call.name) {
            Some((_, handler)) => handler.clone(),
            None => {
                tracing::debug!(tool = %call.name, "no handler registered for tool call");
                return None;
            }
        };

        match handler.execute(call).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool handler failed");
                Some(serde_json::json!({ "error": e.to_string() }))
            }
        }
    }
}

/// Result triple returned by the search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title.
    pub title: String,
    /// Result snippet text.
    pub snippet: String,
    /// Source URL.
    pub source: String,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

/// Built-in web search tool backed by the search endpoint.
///
/// Failures never propagate: a parse error, network failure, or malformed
/// response is reported through the render sink and degrades to the
/// [`SEARCH_FALLBACK`] string, so the conversation continues.
pub struct SearchTool {
    http: reqwest::Client,
    endpoint: Url,
    sink: Arc<dyn RenderSink>,
}

impl SearchTool {
    /// Create a search tool against the given search endpoint.
    pub fn new(endpoint: Url, sink: Arc<dyn RenderSink>) -> Self {
        Self { http: reqwest::Client::new(), endpoint, sink }
    }

    /// Manifest entry for this tool.
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new("search_web")
            .with_description("Search the web for current information about any topic")
            .with_parameters(serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" }
                },
                "required": ["query"]
            }))
    }

    async fn lookup(&self, call: &ToolCall) -> Result<SearchResult> {
        let args: SearchArgs = serde_json::from_str(&call.arguments)
            .map_err(|e| SessionError::tool(format!("bad search arguments: {e}")))?;

        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| SessionError::tool("search endpoint cannot take a path"))?
            .push(&args.query);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SessionError::tool(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::tool(format!("search endpoint returned status {status}")));
        }

        response
            .json::<SearchResult>()
            .await
            .map_err(|e| SessionError::tool(format!("malformed search response: {e}")))
    }
}

#[async_trait]
impl ToolHandler for SearchTool {
    async fn execute(&self, call: &ToolCall) -> Result<Value> {
        match self.lookup(call).await {
            Ok(result) => {
                let card = format!("{}\n{}\n{}", result.title, result.snippet, result.source);
                self.sink.show_message(&card, MessageRole::Tool);
                Ok(serde_json::to_value(&result)?)
            }
            Err(e) => {
                tracing::warn!(error = %e, "search tool degraded to fallback");
                self.sink.show_error(&e.to_string());
                Ok(Value::String(SEARCH_FALLBACK.to_string()))
            }
        }
    }
}
