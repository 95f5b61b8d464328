//! Core transport traits.
//!
//! [`Transport`] is the seam between the connection controller and the
//! concrete peer-transport implementation; [`TransportConnector`] is the
//! factory that performs the second half of the handshake (SDP exchange)
//! and yields a live transport.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::events::{ClientEvent, ServerEvent};
use crate::negotiate::Credential;

/// Events surfaced by a transport, in delivery order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The control channel is open and ready for writes.
    ChannelOpen,
    /// An inbound control message arrived.
    Message(ServerEvent),
    /// The transport shut down; no further events follow.
    Closed,
}

/// A live peer transport carrying one audio stream and one control channel.
#[async_trait]
pub trait Transport: std::fmt::Debug + Send + Sync {
    /// Unique transport identifier.
    fn transport_id(&self) -> &str;

    /// Whether the transport is currently live.
    fn is_open(&self) -> bool;

    /// Serialize and transmit a control message.
    ///
    /// A no-op (not an error) when the control channel is not yet open;
    /// this layer does not queue. Callers gate sends on
    /// [`TransportEvent::ChannelOpen`].
    async fn send(&self, event: ClientEvent) -> Result<()>;

    /// Next transport event. Returns `None` after [`TransportEvent::Closed`].
    ///
    /// Events are delivered FIFO and are meant to be consumed one at a time;
    /// handling of one message completes before the next is dequeued.
    async fn next_event(&self) -> Option<TransportEvent>;

    /// The transport events as an async stream.
    fn events(&self) -> Pin<Box<dyn Stream<Item = TransportEvent> + Send + '_>>;

    /// Close the transport: release the peer connection, stop local media,
    /// close the control channel. Idempotent; safe on a never-opened or
    /// already-closed transport.
    async fn close(&self) -> Result<()>;
}

/// A shared transport handle.
pub type SharedTransport = Arc<dyn Transport>;

/// Factory establishing a peer transport from a negotiated credential.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Perform transport setup end to end: acquire local media, build the
    /// peer connection and control channel, exchange session descriptions
    /// using `credential` as bearer, and apply the remote description.
    ///
    /// Any step failing releases every already-acquired resource before the
    /// error is returned; no partial transport is ever left live.
    async fn open(&self, credential: Credential, config: &SessionConfig) -> Result<SharedTransport>;
}
