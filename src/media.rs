//! Media device seam.
//!
//! Audio capture and playback are external collaborators: frames cross this
//! boundary already encoded for the negotiated audio codec, and the transport
//! never looks inside them. A real deployment plugs in a microphone/speaker
//! implementation; headless and test environments use [`NullMediaGateway`].

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;

/// Source of local audio capture and sink for remote playback.
#[async_trait]
pub trait MediaGateway: Send + Sync {
    /// Acquire the local audio input stream.
    ///
    /// This is the "microphone permission" step; it may be denied, which
    /// aborts transport setup.
    async fn capture(&self) -> Result<Arc<dyn CaptureStream>>;

    /// The playback surface remote audio frames are handed to.
    ///
    /// Binding is fire-and-forget; the transport does not own playback state.
    fn playback(&self) -> Arc<dyn PlaybackSink>;
}

/// A live local audio input stream producing encoded frames.
#[async_trait]
pub trait CaptureStream: Send + Sync {
    /// Next encoded audio frame, or `None` once the stream has ended.
    async fn next_frame(&self) -> Option<Bytes>;

    /// Stop the stream and release the underlying device.
    fn stop(&self);

    /// Whether the stream is still live.
    fn is_live(&self) -> bool;
}

/// Playback surface for remote audio frames.
pub trait PlaybackSink: Send + Sync {
    /// Hand one encoded frame to the playback surface.
    fn play(&self, frame: &[u8]);
}

/// Media gateway with no capture device and discarded playback.
#[derive(Debug, Clone, Default)]
pub struct NullMediaGateway;

#[async_trait]
impl MediaGateway for NullMediaGateway {
    async fn capture(&self) -> Result<Arc<dyn CaptureStream>> {
        Ok(Arc::new(NullCapture { stopped: AtomicBool::new(false) }))
    }

    fn playback(&self) -> Arc<dyn PlaybackSink> {
        Arc::new(NullPlayback)
    }
}

/// Capture stream that produces no frames.
#[derive(Debug)]
pub struct NullCapture {
    stopped: AtomicBool,
}

#[async_trait]
impl CaptureStream for NullCapture {
    async fn next_frame(&self) -> Option<Bytes> {
        if self.stopped.load(Ordering::Acquire) {
            return None;
        }
        std::future::pending().await
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }
}

/// Playback sink that discards frames.
#[derive(Debug, Clone, Default)]
pub struct NullPlayback;

impl PlaybackSink for NullPlayback {
    fn play(&self, _frame: &[u8]) {}
}
