//! Configuration types for voice sessions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{Result, SessionError};

/// Default realtime model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview-2025-06-03";

/// Default voice for audio output.
pub const DEFAULT_VOICE: &str = "echo";

/// Default label of the control data channel.
pub const DEFAULT_CHANNEL_LABEL: &str = "oai-events";

/// Tool/function definition for the session tool manifest.
///
/// Wire shape: `{type:"function", name, description, parameters}`. Adding a
/// tool means adding one more entry; the manifest format never changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Manifest entry type, always "function".
    #[serde(rename = "type")]
    pub kind: String,
    /// Tool name.
    pub name: String,
    /// Tool description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolDefinition {
    /// Create a new function tool definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self { kind: "function".to_string(), name: name.into(), description: None, parameters: None }
    }

    /// Set the tool description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Set the parameters schema.
    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters = Some(schema);
        self
    }
}

/// The three HTTP endpoints the session talks to.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Credential-issuing endpoint (`GET /session?voice=…&question=…`).
    pub session: Url,
    /// Search endpoint (`GET /search/{query}`).
    pub search: Url,
    /// Remote realtime endpoint for the SDP exchange (`POST ?model=…`).
    pub realtime: Url,
}

impl Endpoints {
    /// Parse the three endpoint URLs.
    pub fn new(session: &str, search: &str, realtime: &str) -> Result<Self> {
        Ok(Self {
            session: Url::parse(session).map_err(|e| SessionError::config(format!("session endpoint: {e}")))?,
            search: Url::parse(search).map_err(|e| SessionError::config(format!("search endpoint: {e}")))?,
            realtime: Url::parse(realtime).map_err(|e| SessionError::config(format!("realtime endpoint: {e}")))?,
        })
    }
}

/// Configuration for a voice session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Model identifier passed to the realtime endpoint.
    pub model: String,
    /// Voice for audio output.
    pub voice: String,
    /// Scripted opening line, sent as the first conversation item once the
    /// control channel opens. Also the negotiation cache key.
    pub opening_line: String,
    /// Label of the control data channel.
    pub channel_label: String,
    /// Endpoint URLs.
    pub endpoints: Endpoints,
    /// Tool manifest advertised in `session.update`.
    pub tools: Vec<ToolDefinition>,
}

impl SessionConfig {
    /// Create a configuration with defaults for everything but the endpoints.
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            opening_line: String::new(),
            channel_label: DEFAULT_CHANNEL_LABEL.to_string(),
            endpoints,
            tools: Vec::new(),
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the voice.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Set the scripted opening line.
    pub fn with_opening_line(mut self, line: impl Into<String>) -> Self {
        self.opening_line = line.into();
        self
    }

    /// Add a tool to the manifest.
    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    /// The `session.update` payload: voice, tool manifest, tool-choice "auto".
    pub fn session_update_payload(&self) -> Value {
        serde_json::json!({
            "voice": self.voice,
            "tools": self.tools,
            "tool_choice": "auto",
        })
    }
}
