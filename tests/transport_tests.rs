//! Transport setup tests: resource release on failure and offer structure.
//!
//! The happy path needs a live remote peer and is not reproducible in a unit
//! environment; these tests pin down the failure paths (every acquired
//! resource is released) and the structure of the generated local
//! description.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use proptest::prelude::*;
use str0m::Rtc;
use str0m::media::{Direction, MediaKind};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use voicelink::{
    CaptureStream, Endpoints, MediaGateway, NullPlayback, PlaybackSink, Result, SessionConfig,
    SessionError, TransportConnector, WebRtcConnector,
};

/// Capture double recording whether it was stopped.
struct TrackedCapture {
    stopped: AtomicBool,
}

#[async_trait]
impl CaptureStream for TrackedCapture {
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

/// Gateway double handing out tracked captures, or denying capture outright.
struct TrackedGateway {
    deny: bool,
    captures: AtomicUsize,
    last: std::sync::Mutex<Option<Arc<TrackedCapture>>>,
}

impl TrackedGateway {
    fn new(deny: bool) -> Self {
        Self { deny, captures: AtomicUsize::new(0), last: std::sync::Mutex::new(None) }
    }

    fn last_capture(&self) -> Option<Arc<TrackedCapture>> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaGateway for TrackedGateway {
    async fn capture(&self) -> Result<Arc<dyn CaptureStream>> {
        if self.deny {
            return Err(SessionError::transport("audio input permission denied"));
        }
        self.captures.fetch_add(1, Ordering::SeqCst);
        let capture = Arc::new(TrackedCapture { stopped: AtomicBool::new(false) });
        *self.last.lock().unwrap() = Some(capture.clone());
        Ok(capture)
    }

    fn playback(&self) -> Arc<dyn PlaybackSink> {
        Arc::new(NullPlayback)
    }
}

fn config_with_realtime(realtime: &str) -> SessionConfig {
    let endpoints = Endpoints::new(
        "http://localhost:5000/session",
        "http://localhost:5000/search",
        realtime,
    )
    .unwrap();
    SessionConfig::new(endpoints)
}

fn credential() -> voicelink::Credential {
    voicelink::Credential::new("ephemeral-test", "echo")
}

#[tokio::test]
async fn denied_capture_aborts_setup() {
    let gateway = Arc::new(TrackedGateway::new(true));
    let connector = WebRtcConnector::new(gateway.clone());
    let config = config_with_realtime("https://realtime.invalid/v1/realtime");

    let err = connector.open(credential(), &config).await.unwrap_err();
    assert!(matches!(err, SessionError::TransportSetup(_)), "unexpected error: {err}");
    assert_eq!(gateway.captures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejected_description_exchange_releases_capture() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gateway = Arc::new(TrackedGateway::new(false));
    let connector = WebRtcConnector::new(gateway.clone());
    let config = config_with_realtime(&format!("{}/v1/realtime", server.uri()));

    let err = connector.open(credential(), &config).await.unwrap_err();
    assert!(matches!(err, SessionError::TransportSetup(_)), "unexpected error: {err}");

    let capture = gateway.last_capture().expect("capture was acquired before the exchange");
    assert!(!capture.is_live(), "capture must be released when setup fails");
}

#[tokio::test]
async fn empty_remote_description_releases_capture() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;

    let gateway = Arc::new(TrackedGateway::new(false));
    let connector = WebRtcConnector::new(gateway.clone());
    let config = config_with_realtime(&format!("{}/v1/realtime", server.uri()));

    let err = connector.open(credential(), &config).await.unwrap_err();
    assert!(matches!(err, SessionError::TransportSetup(_)), "unexpected error: {err}");
    assert!(!gateway.last_capture().unwrap().is_live());
}

#[tokio::test]
async fn garbage_remote_description_releases_capture() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not an sdp answer"))
        .mount(&server)
        .await;

    let gateway = Arc::new(TrackedGateway::new(false));
    let connector = WebRtcConnector::new(gateway.clone());
    let config = config_with_realtime(&format!("{}/v1/realtime", server.uri()));

    let err = connector.open(credential(), &config).await.unwrap_err();
    assert!(matches!(err, SessionError::TransportSetup(_)), "unexpected error: {err}");
    assert!(!gateway.last_capture().unwrap().is_live());
}

/// Generate a local description for one audio track plus one data channel.
fn generate_offer(channel_label: &str) -> String {
    let mut rtc = Rtc::new(Instant::now());
    let mut changes = rtc.sdp_api();
    changes.add_media(MediaKind::Audio, Direction::SendRecv, None, None, None);
    changes.add_channel(channel_label.to_string());
    let (offer, _pending) = changes.apply().expect("offer generation");
    offer.to_sdp_string()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// For any channel label, the local description carries both an audio
    /// media line and an application media line for the data channel.
    #[test]
    fn offer_has_audio_and_data_channel_lines(label in "[a-z][a-z0-9-]{0,20}") {
        let sdp = generate_offer(&label);
        prop_assert!(sdp.contains("m=audio"), "missing audio media line:\n{sdp}");
        prop_assert!(sdp.contains("m=application"), "missing data channel media line:\n{sdp}");
        prop_assert!(sdp.contains("a=sendrecv"), "audio must be bidirectional:\n{sdp}");
    }
}
