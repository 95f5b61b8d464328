//! WebRTC peer transport built on Sans-IO `str0m`.
//!
//! Setup flow:
//! 1. Acquire the local capture stream from the media gateway.
//! 2. Create a `str0m::Rtc` with a send/recv audio media line and the
//!    control data channel.
//! 3. Generate the local SDP offer.
//! 4. POST it to the realtime endpoint with the negotiated credential as
//!    bearer token; the response body is the remote SDP answer.
//! 5. Apply the answer and hand the `Rtc` to a tokio drive loop that moves
//!    UDP datagrams, capture frames, and data-channel messages.
//!
//! Any failing step releases everything acquired before it; no partial
//! transport is left live.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use futures::Stream;
use str0m::change::SdpAnswer;
use str0m::channel::ChannelId;
use str0m::media::{Direction, Frequency, MediaKind, MediaTime, Mid, Pt};
use str0m::net::{Protocol as NetProtocol, Receive};
use str0m::{Candidate, Event, Input, Output, Rtc};
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, mpsc};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::events::{ClientEvent, ServerEvent};
use crate::media::{CaptureStream, MediaGateway, PlaybackSink};
use crate::negotiate::Credential;
use crate::session::{SharedTransport, Transport, TransportConnector, TransportEvent};

/// Assumed frame duration for outbound audio writes (20ms).
const FRAMES_PER_SECOND: u64 = 50;

/// Connector that performs the SDP handshake and yields a live transport.
pub struct WebRtcConnector {
    http: reqwest::Client,
    media: Arc<dyn MediaGateway>,
}

impl WebRtcConnector {
    /// Create a connector using the given media gateway.
    pub fn new(media: Arc<dyn MediaGateway>) -> Self {
        Self { http: reqwest::Client::new(), media }
    }

    async fn establish(
        &self,
        credential: Credential,
        config: &SessionConfig,
        capture: Arc<dyn CaptureStream>,
    ) -> Result<SharedTransport> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| SessionError::transport(format!("UDP bind failed: {e}")))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| SessionError::transport(format!("no local address: {e}")))?;

        let mut rtc = Rtc::new(Instant::now());

        let candidate = Candidate::host(local_addr, "udp")
            .map_err(|e| SessionError::transport(format!("local candidate: {e}")))?;
        let _ = rtc.add_local_candidate(candidate);

        let mut changes = rtc.sdp_api();
        let audio_mid = changes.add_media(MediaKind::Audio, Direction::SendRecv, None, None, None);
        let channel_id = changes.add_channel(config.channel_label.clone());

        let (offer, pending) = changes
            .apply()
            .ok_or_else(|| SessionError::transport("failed to generate local description"))?;
        let offer_sdp = offer.to_sdp_string();

        tracing::debug!(
            audio_mid = %audio_mid,
            channel = ?channel_id,
            "generated local session description"
        );

        let answer_sdp =
            exchange_descriptions(&self.http, &credential, config, &offer_sdp).await?;

        let answer = SdpAnswer::from_sdp_string(&answer_sdp)
            .map_err(|e| SessionError::transport(format!("bad remote description: {e}")))?;
        rtc.sdp_api()
            .accept_answer(pending, answer)
            .map_err(|e| SessionError::transport(format!("failed to apply remote description: {e}")))?;

        // Audio payload type and clock rate come from the negotiated answer.
        let (audio_pt, clock_rate) = {
            let writer = rtc
                .writer(audio_mid)
                .ok_or_else(|| SessionError::transport("audio track unavailable after answer"))?;
            let params = writer.payload_params().next().ok_or_else(|| {
                SessionError::transport("no audio payload type negotiated in remote description")
            })?;
            (params.pt(), params.spec().clock_rate)
        };

        tracing::info!(audio_mid = %audio_mid, "session description handshake complete");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let rtc = Arc::new(Mutex::new(rtc));
        let open = Arc::new(AtomicBool::new(true));
        let dc_open = Arc::new(AtomicBool::new(false));

        tokio::spawn(drive(DriveContext {
            rtc: rtc.clone(),
            socket,
            local_addr,
            audio_mid,
            audio_pt,
            clock_rate,
            channel_id,
            capture: capture.clone(),
            playback: self.media.playback(),
            open: open.clone(),
            dc_open: dc_open.clone(),
            events: event_tx,
        }));

        Ok(Arc::new(WebRtcTransport {
            id: uuid::Uuid::new_v4().to_string(),
            rtc,
            channel_id,
            capture,
            open,
            dc_open,
            closed: AtomicBool::new(false),
            events: Mutex::new(event_rx),
        }))
    }
}

#[async_trait]
impl TransportConnector for WebRtcConnector {
    async fn open(&self, credential: Credential, config: &SessionConfig) -> Result<SharedTransport> {
        let capture = self.media.capture().await?;

        match self.establish(credential, config, capture.clone()).await {
            Ok(transport) => Ok(transport),
            Err(e) => {
                // No partial transport may be left live.
                capture.stop();
                Err(e)
            }
        }
    }
}

/// Exchange the local description for the remote one.
///
/// POST to `{realtime}?model=…` with the credential as bearer token and the
/// offer as `application/sdp` body; a 2xx response body is the answer.
async fn exchange_descriptions(
    http: &reqwest::Client,
    credential: &Credential,
    config: &SessionConfig,
    offer_sdp: &str,
) -> Result<String> {
    let mut url = config.endpoints.realtime.clone();
    url.query_pairs_mut().append_pair("model", &config.model);

    let response = http
        .post(url)
        .header("Authorization", format!("Bearer {}", credential.secret()))
        .header("Content-Type", "application/sdp")
        .body(offer_sdp.to_string())
        .send()
        .await
        .map_err(|e| SessionError::transport(format!("description exchange failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SessionError::transport(format!(
            "description exchange returned status {status}"
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| SessionError::transport(format!("failed to read remote description: {e}")))?;

    if body.is_empty() {
        return Err(SessionError::transport("empty remote description"));
    }

    Ok(body)
}

/// A live WebRTC transport: peer connection, capture stream, control channel.
pub struct WebRtcTransport {
    id: String,
    rtc: Arc<Mutex<Rtc>>,
    channel_id: ChannelId,
    capture: Arc<dyn CaptureStream>,
    open: Arc<AtomicBool>,
    dc_open: Arc<AtomicBool>,
    closed: AtomicBool,
    events: Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
}

impl std::fmt::Debug for WebRtcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRtcTransport")
            .field("id", &self.id)
            .field("open", &self.open.load(Ordering::Relaxed))
            .field("channel_open", &self.dc_open.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl Transport for WebRtcTransport {
    fn transport_id(&self) -> &str {
        &self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn send(&self, event: ClientEvent) -> Result<()> {
        if !self.is_open() || !self.dc_open.load(Ordering::Acquire) {
            tracing::debug!("control channel not open, dropping outbound message");
            return Ok(());
        }

        let bytes = serde_json::to_vec(&event)?;

        let mut rtc = self.rtc.lock().await;
        let Some(mut channel) = rtc.channel(self.channel_id) else {
            tracing::debug!("control channel unavailable, dropping outbound message");
            return Ok(());
        };
        channel
            .write(false, &bytes)
            .map_err(|e| SessionError::transport(format!("control channel write failed: {e}")))?;
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        let mut rx = self.events.lock().await;
        rx.recv().await
    }

    fn events(&self) -> Pin<Box<dyn Stream<Item = TransportEvent> + Send + '_>> {
        Box::pin(async_stream::stream! {
            let mut rx = self.events.lock().await;
            while let Some(event) = rx.recv().await {
                yield event;
            }
        })
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.capture.stop();
        self.open.store(false, Ordering::Release);
        self.dc_open.store(false, Ordering::Release);
        let mut rtc = self.rtc.lock().await;
        rtc.disconnect();
        Ok(())
    }
}

struct DriveContext {
    rtc: Arc<Mutex<Rtc>>,
    socket: UdpSocket,
    local_addr: std::net::SocketAddr,
    audio_mid: Mid,
    audio_pt: Pt,
    clock_rate: Frequency,
    channel_id: ChannelId,
    capture: Arc<dyn CaptureStream>,
    playback: Arc<dyn PlaybackSink>,
    open: Arc<AtomicBool>,
    dc_open: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

/// Drive the Sans-IO state machine: poll outputs, feed timers, move UDP
/// datagrams, push capture frames onto the audio track, and surface channel
/// events to the consumer in delivery order.
async fn drive(ctx: DriveContext) {
    let DriveContext {
        rtc,
        socket,
        local_addr,
        audio_mid,
        audio_pt,
        clock_rate,
        channel_id,
        capture,
        playback,
        open,
        dc_open,
        events,
    } = ctx;

    let mut net_buf = vec![0u8; 2000];
    let mut sample_offset: u64 = 0;
    let samples_per_frame = clock_rate.get() as u64 / FRAMES_PER_SECOND;
    let mut capture_live = true;

    'drive: loop {
        // Drain outputs until the state machine asks for a timeout.
        let deadline = loop {
            let output = {
                let mut rtc = rtc.lock().await;
                if !rtc.is_alive() {
                    break 'drive;
                }
                rtc.poll_output()
            };

            match output {
                Ok(Output::Timeout(deadline)) => break deadline,
                Ok(Output::Transmit(transmit)) => {
                    if let Err(e) =
                        socket.send_to(&transmit.contents, transmit.destination).await
                    {
                        tracing::warn!(error = %e, "UDP send failed");
                    }
                }
                Ok(Output::Event(event)) => match event {
                    Event::Connected => {
                        tracing::info!("peer transport established");
                    }
                    Event::ChannelOpen(id, label) if id == channel_id => {
                        tracing::info!(label = %label, "control channel open");
                        dc_open.store(true, Ordering::Release);
                        let _ = events.send(TransportEvent::ChannelOpen);
                    }
                    Event::ChannelData(data) if data.id == channel_id => {
                        match serde_json::from_slice::<ServerEvent>(&data.data) {
                            Ok(message) => {
                                let _ = events.send(TransportEvent::Message(message));
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "dropping malformed inbound control message");
                            }
                        }
                    }
                    Event::ChannelClose(id) if id == channel_id => {
                        tracing::info!("control channel closed");
                        dc_open.store(false, Ordering::Release);
                    }
                    Event::MediaData(media) => {
                        // Fire-and-forget binding to the playback surface.
                        playback.play(&media.data);
                    }
                    Event::IceConnectionStateChange(state) => {
                        tracing::debug!(?state, "ICE connection state changed");
                    }
                    _ => {}
                },
                Err(e) => {
                    tracing::error!(error = %e, "peer transport failed");
                    break 'drive;
                }
            }
        };

        tokio::select! {
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                let mut rtc = rtc.lock().await;
                if let Err(e) = rtc.handle_input(Input::Timeout(Instant::now())) {
                    tracing::error!(error = %e, "timer handling failed");
                    break 'drive;
                }
            }

            received = socket.recv_from(&mut net_buf) => {
                let Ok((n, source)) = received else { continue };
                let Ok(contents) = net_buf[..n].try_into() else {
                    tracing::trace!("ignoring unparseable datagram");
                    continue;
                };
                let receive = Receive {
                    proto: NetProtocol::Udp,
                    source,
                    destination: local_addr,
                    contents,
                };
                let mut rtc = rtc.lock().await;
                if let Err(e) = rtc.handle_input(Input::Receive(Instant::now(), receive)) {
                    tracing::debug!(error = %e, "input handling failed");
                }
            }

            frame = capture.next_frame(), if capture_live => {
                match frame {
                    Some(data) => {
                        let mut rtc = rtc.lock().await;
                        if let Some(writer) = rtc.writer(audio_mid) {
                            let time = MediaTime::new(sample_offset, clock_rate);
                            sample_offset += samples_per_frame;
                            if let Err(e) = writer.write(audio_pt, Instant::now(), time, data.to_vec()) {
                                tracing::warn!(error = %e, "audio track write failed");
                            }
                        }
                    }
                    None => capture_live = false,
                }
            }
        }
    }

    open.store(false, Ordering::Release);
    dc_open.store(false, Ordering::Release);
    capture.stop();
    let _ = events.send(TransportEvent::Closed);
    tracing::info!("transport drive loop exited");
}
