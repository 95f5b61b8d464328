//! Presentation sink consumed by the session.
//!
//! The crate never renders anything itself; transcripts, error text, and
//! status changes are pushed through [`RenderSink`] to whatever surface the
//! embedding application provides.

/// Role attached to a rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    /// Message typed or spoken by the user.
    User,
    /// Message produced by the remote assistant.
    Assistant,
    /// Result card produced by a tool.
    Tool,
}

impl MessageRole {
    /// Lowercase name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// Render surface for transcripts and session state.
pub trait RenderSink: Send + Sync {
    /// Show a conversation message.
    fn show_message(&self, text: &str, role: MessageRole);

    /// Show a user-visible error.
    fn show_error(&self, text: &str);

    /// Update the status line.
    fn set_status(&self, text: &str);

    /// Reflect the connected/disconnected state.
    fn set_connected(&self, connected: bool);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl RenderSink for NoopSink {
    fn show_message(&self, _text: &str, _role: MessageRole) {}
    fn show_error(&self, _text: &str) {}
    fn set_status(&self, _text: &str) {}
    fn set_connected(&self, _connected: bool) {}
}

/// Sink that forwards everything to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl RenderSink for LogSink {
    fn show_message(&self, text: &str, role: MessageRole) {
        tracing::info!(role = role.as_str(), "{text}");
    }

    fn show_error(&self, text: &str) {
        tracing::error!("{text}");
    }

    fn set_status(&self, text: &str) {
        tracing::info!(status = text, "status changed");
    }

    fn set_connected(&self, connected: bool) {
        tracing::info!(connected, "connection state changed");
    }
}
