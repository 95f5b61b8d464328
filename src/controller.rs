//! Session lifecycle: the connection state machine.
//!
//! [`ConnectionController`] owns at most one live transport and walks it
//! through `Idle → Negotiating → Connected` on start and back to `Idle` on
//! stop or failure. Start attempts that race a stop are detected with an
//! epoch counter: every stop bumps the epoch, and a start that finishes
//! negotiation or transport setup under a stale epoch discards its result
//! instead of committing it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::events::{ClientEvent, ConversationItem};
use crate::negotiate::SessionNegotiator;
use crate::protocol::ControlHandler;
use crate::session::{SharedTransport, TransportConnector, TransportEvent};
use crate::sink::RenderSink;
use crate::tools::ToolDispatcher;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session; a start is allowed.
    Idle,
    /// Credential negotiation or transport setup in progress.
    Negotiating,
    /// Transport live.
    Connected,
    /// A start attempt failed. Transient; the controller returns to `Idle`
    /// immediately so the next start is allowed.
    Failed,
}

struct Inner {
    state: ConnectionState,
    transport: Option<SharedTransport>,
}

/// Drives the session lifecycle: negotiate, connect, pump, stop.
pub struct ConnectionController {
    config: SessionConfig,
    negotiator: SessionNegotiator,
    connector: Arc<dyn TransportConnector>,
    dispatcher: Arc<ToolDispatcher>,
    sink: Arc<dyn RenderSink>,
    inner: Mutex<Inner>,
    epoch: AtomicU64,
}

impl ConnectionController {
    /// Create a controller.
    ///
    /// When the configuration carries no tool manifest, the dispatcher's
    /// registered definitions are advertised instead, so registering a tool
    /// is a single call.
    pub fn new(
        mut config: SessionConfig,
        connector: Arc<dyn TransportConnector>,
        dispatcher: Arc<ToolDispatcher>,
        sink: Arc<dyn RenderSink>,
    ) -> Self {
        if config.tools.is_empty() {
            config.tools = dispatcher.definitions();
        }
        let negotiator = SessionNegotiator::new(config.endpoints.session.clone());
        Self {
            config,
            negotiator,
            connector,
            dispatcher,
            sink,
            inner: Mutex::new(Inner { state: ConnectionState::Idle, transport: None }),
            epoch: AtomicU64::new(0),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// Start a session: negotiate a credential, open the transport, begin
    /// pumping inbound messages.
    ///
    /// Ignored (returns `Ok`) when a session is already starting or live.
    /// Failure is reported once through the render sink and leaves the
    /// controller startable again; the returned `Result` only carries
    /// errors that could not even be reported.
    pub async fn start(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != ConnectionState::Idle {
                tracing::debug!(state = ?inner.state, "start ignored, session already active");
                return Ok(());
            }
            inner.state = ConnectionState::Negotiating;
        }
        let epoch = self.epoch.load(Ordering::Acquire);

        if self.negotiator.is_cached(&self.config.opening_line, &self.config.voice) {
            self.sink.set_status("Using cached session");
        } else {
            self.sink.set_status("Initializing...");
        }

        let credential =
            match self.negotiator.negotiate(&self.config.opening_line, &self.config.voice).await {
                Ok(credential) => credential,
                Err(e) => return self.fail(&e).await,
            };

        if self.stale(epoch).await {
            tracing::info!("discarding negotiation result after stop");
            return Ok(());
        }

        let transport = match self.connector.open(credential, &self.config).await {
            Ok(transport) => transport,
            Err(e) => return self.fail(&e).await,
        };

        {
            let mut inner = self.inner.lock().await;
            let stale = inner.state != ConnectionState::Negotiating
                || self.epoch.load(Ordering::Acquire) != epoch;
            if stale {
                drop(inner);
                tracing::info!("discarding transport opened after stop");
                if let Err(e) = transport.close().await {
                    tracing::warn!(error = %e, "failed to close discarded transport");
                }
                return Ok(());
            }
            inner.state = ConnectionState::Connected;
            inner.transport = Some(transport.clone());
        }

        let handler =
            ControlHandler::new(transport.clone(), self.dispatcher.clone(), self.sink.clone());
        let opening_line = self.config.opening_line.clone();
        let session_payload = self.config.session_update_payload();
        tokio::spawn(pump(transport, handler, opening_line, session_payload));

        self.sink.set_connected(true);
        self.sink.set_status("Connected");
        tracing::info!("session connected");
        Ok(())
    }

    /// Stop the session and release the transport. Idempotent; also cancels
    /// any start attempt still in flight.
    pub async fn stop(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);

        let transport = {
            let mut inner = self.inner.lock().await;
            inner.state = ConnectionState::Idle;
            inner.transport.take()
        };

        if let Some(transport) = transport {
            if let Err(e) = transport.close().await {
                tracing::warn!(error = %e, "transport close reported an error");
            }
        }

        self.sink.set_connected(false);
        self.sink.set_status("Ready to start");
    }

    /// Start when idle, stop when connected.
    pub async fn toggle(&self) -> Result<()> {
        if self.state().await == ConnectionState::Connected {
            self.stop().await;
            Ok(())
        } else {
            self.start().await
        }
    }

    async fn stale(&self, epoch: u64) -> bool {
        if self.epoch.load(Ordering::Acquire) != epoch {
            return true;
        }
        self.inner.lock().await.state != ConnectionState::Negotiating
    }

    /// Report a failed start attempt: one error through the sink, then back
    /// to `Idle`. A stop that raced the failure wins; nothing is reported.
    async fn fail(&self, error: &SessionError) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != ConnectionState::Negotiating {
                return Ok(());
            }
            inner.state = ConnectionState::Failed;
            inner.transport = None;
        }

        tracing::error!(error = %error, "session start failed");
        self.sink.show_error(&error.to_string());
        self.sink.set_connected(false);
        self.sink.set_status("Failed to connect");

        self.inner.lock().await.state = ConnectionState::Idle;
        Ok(())
    }
}

/// Consume transport events until the transport closes.
///
/// On channel open: send the scripted opening line as a conversation item,
/// then the session-configuration update. Inbound messages are handled one
/// at a time, in delivery order.
async fn pump(
    transport: SharedTransport,
    handler: ControlHandler,
    opening_line: String,
    session_payload: Value,
) {
    while let Some(event) = transport.next_event().await {
        match event {
            TransportEvent::ChannelOpen => {
                match serde_json::to_value(ConversationItem::user_text(&opening_line)) {
                    Ok(item) => {
                        if let Err(e) =
                            transport.send(ClientEvent::ConversationItemCreate { item }).await
                        {
                            tracing::warn!(error = %e, "failed to send opening line");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "failed to serialize opening line"),
                }
                if let Err(e) = transport
                    .send(ClientEvent::SessionUpdate { session: session_payload.clone() })
                    .await
                {
                    tracing::warn!(error = %e, "failed to send session configuration");
                }
            }
            TransportEvent::Message(message) => handler.handle(message).await,
            TransportEvent::Closed => break,
        }
    }
    tracing::debug!("transport event pump finished");
}
