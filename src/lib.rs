//! # voicelink
//!
//! Client-side session layer for realtime voice conversations with tool
//! calling over WebRTC.
//!
//! The crate drives a complete session lifecycle: negotiate a short-lived
//! credential from a session endpoint, establish a WebRTC peer transport
//! carrying bidirectional audio plus a JSON control data channel, script the
//! opening of the conversation, route inbound control messages to a render
//! surface, and execute tool calls (such as web search) requested by the
//! remote endpoint.
//!
//! ## Architecture
//!
//! ```text
//!  ┌─────────────────────────────────────────────────┐
//!  │              ConnectionController               │
//!  │     Idle → Negotiating → Connected → Idle       │
//!  └──────┬──────────────┬───────────────┬───────────┘
//!         │              │               │
//!  ┌──────▼──────┐ ┌─────▼───────┐ ┌─────▼─────────┐
//!  │ Negotiator  │ │  Transport  │ │ControlHandler │
//!  │ (credential │ │  (WebRTC +  │ │ (transcripts, │
//!  │  + cache)   │ │  data chan) │ │  tool calls)  │
//!  └─────────────┘ └─────────────┘ └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use voicelink::{
//!     ConnectionController, Endpoints, LogSink, NullMediaGateway, SearchTool,
//!     SessionConfig, ToolDispatcher, WebRtcConnector,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoints = Endpoints::new(
//!         "http://localhost:5000/session",
//!         "http://localhost:5000/search",
//!         "https://api.openai.com/v1/realtime",
//!     )?;
//!     let config = SessionConfig::new(endpoints.clone())
//!         .with_opening_line("What's new in the world today?");
//!
//!     let sink = Arc::new(LogSink);
//!     let mut dispatcher = ToolDispatcher::new();
//!     dispatcher.register(
//!         SearchTool::definition(),
//!         Arc::new(SearchTool::new(endpoints.search.clone(), sink.clone())),
//!     );
//!
//!     let connector = Arc::new(WebRtcConnector::new(Arc::new(NullMediaGateway)));
//!     let controller =
//!         ConnectionController::new(config, connector, Arc::new(dispatcher), sink);
//!
//!     controller.start().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod media;
pub mod negotiate;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod tools;
pub mod webrtc;

// Re-exports
pub use config::{
    DEFAULT_CHANNEL_LABEL, DEFAULT_MODEL, DEFAULT_VOICE, Endpoints, SessionConfig, ToolDefinition,
};
pub use controller::{ConnectionController, ConnectionState};
pub use error::{Result, SessionError};
pub use events::{ClientEvent, ConversationItem, ServerEvent, ToolCall};
pub use media::{
    CaptureStream, MediaGateway, NullCapture, NullMediaGateway, NullPlayback, PlaybackSink,
};
pub use negotiate::{Credential, SessionNegotiator};
pub use protocol::ControlHandler;
pub use session::{SharedTransport, Transport, TransportConnector, TransportEvent};
pub use sink::{LogSink, MessageRole, NoopSink, RenderSink};
pub use tools::{SEARCH_FALLBACK, SearchResult, SearchTool, ToolDispatcher, ToolHandler};
pub use webrtc::{WebRtcConnector, WebRtcTransport};
