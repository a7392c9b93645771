//! Media session: offer/answer negotiation state machine
//!
//! One `MediaSession` performs exactly one negotiation: two receive-only
//! transceivers, one offer (sent only after ICE gathering completes), one
//! applied answer. A failed or completed session is never renegotiated in
//! place; the owner discards it and builds a new one.

use crate::config::RoverConfig;
use crate::session::ice;
use crate::session::sink::TrackSink;
use crate::signaling::{ControlChannel, SessionDescriptionBody, SignalEnvelope};
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

/// Negotiation state of a media session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// Session constructed, no offer yet
    New,
    /// Transceivers added, local offer installed
    OfferCreated,
    /// Waiting for ICE candidate gathering to finish
    IceGathering,
    /// Finalized offer sent, waiting for the remote answer
    OfferSent,
    /// Answer applied, negotiation done
    Complete,
    /// Terminal failure; the session must be discarded
    Failed,
}

type AnswerOutcome = std::result::Result<(), String>;

type SinkSlot = Arc<RwLock<Option<Arc<dyn TrackSink>>>>;

/// Pick the playback sink for a track kind: video to the video sink,
/// everything else to the audio sink
fn select_sink(
    kind: RTPCodecType,
    video: &SinkSlot,
    audio: &SinkSlot,
) -> Option<Arc<dyn TrackSink>> {
    if kind == RTPCodecType::Video {
        video.read().clone()
    } else {
        audio.read().clone()
    }
}

/// Receive-only WebRTC session against one car
///
/// Owns the peer connection and the two sink registrations. Inbound tracks
/// are dispatched by kind: `video` to the video sink, everything else to the
/// audio sink. The session never sends outbound media.
pub struct MediaSession {
    session_id: String,
    peer_connection: Arc<RTCPeerConnection>,
    state: Arc<RwLock<NegotiationState>>,
    negotiation_started: AtomicBool,
    answer_tx: Arc<Mutex<Option<oneshot::Sender<AnswerOutcome>>>>,
    answer_rx: Mutex<Option<oneshot::Receiver<AnswerOutcome>>>,
    video_sink: SinkSlot,
    audio_sink: SinkSlot,
    ice_gathering_timeout: Duration,
    answer_timeout: Duration,
}

impl MediaSession {
    /// Create a new media session
    ///
    /// Builds the peer connection (default codecs and interceptors, the
    /// configured STUN servers) and registers the inbound-track dispatcher.
    /// Sinks may be registered before or after negotiation; tracks arriving
    /// with no sink registered are dropped with a warning.
    pub async fn new(config: &RoverConfig) -> Result<Self> {
        let session_id = uuid::Uuid::new_v4().to_string();

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtc(format!("failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine)
                .map_err(|e| Error::WebRtc(format!("failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| Error::WebRtc(format!("failed to create peer connection: {}", e)))?,
        );

        info!("Created media session {}", session_id);

        let video_sink: SinkSlot = Arc::new(RwLock::new(None));
        let audio_sink: SinkSlot = Arc::new(RwLock::new(None));

        let video_sink_cb = Arc::clone(&video_sink);
        let audio_sink_cb = Arc::clone(&audio_sink);
        let sid = session_id.clone();
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let video_sink = Arc::clone(&video_sink_cb);
            let audio_sink = Arc::clone(&audio_sink_cb);
            let sid = sid.clone();

            Box::pin(async move {
                let kind = track.kind();
                info!("Session {}: remote track arrived, kind={}", sid, kind);

                match select_sink(kind, &video_sink, &audio_sink) {
                    Some(sink) => sink.attach(track),
                    None => warn!("Session {}: no sink registered for {} track", sid, kind),
                }
            })
        }));

        let (answer_tx, answer_rx) = oneshot::channel();

        Ok(Self {
            session_id,
            peer_connection,
            state: Arc::new(RwLock::new(NegotiationState::New)),
            negotiation_started: AtomicBool::new(false),
            answer_tx: Arc::new(Mutex::new(Some(answer_tx))),
            answer_rx: Mutex::new(Some(answer_rx)),
            ice_gathering_timeout: config.ice_gathering_timeout(),
            answer_timeout: config.answer_timeout(),
            video_sink,
            audio_sink,
        })
    }

    /// Session instance ID (log correlation)
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current negotiation state
    pub fn negotiation_state(&self) -> NegotiationState {
        *self.state.read()
    }

    /// Register the video playback sink
    pub fn set_video_sink(&self, sink: Arc<dyn TrackSink>) {
        *self.video_sink.write() = Some(sink);
    }

    /// Register the audio playback sink
    pub fn set_audio_sink(&self, sink: Arc<dyn TrackSink>) {
        *self.audio_sink.write() = Some(sink);
    }

    fn set_state(&self, new_state: NegotiationState) {
        let mut state = self.state.write();
        let old_state = *state;
        // Complete and Failed are terminal; a concurrent fail (channel
        // closed mid-sequence) must not be overwritten by a later step of
        // the offer path.
        if matches!(
            old_state,
            NegotiationState::Complete | NegotiationState::Failed
        ) {
            return;
        }
        if old_state != new_state {
            debug!(
                "Session {} state transition: {:?} -> {:?}",
                self.session_id, old_state, new_state
            );
            *state = new_state;
        }
    }

    /// Run the full offer/ICE/answer sequence over `channel`
    ///
    /// Resolves once the remote answer has been applied. Exactly one
    /// negotiation is permitted per session: a second call fails with
    /// [`Error::Negotiation`] without touching the first. Every suspension
    /// point is bounded by the configured timeouts; on any failure the
    /// session lands in `Failed` and must be discarded.
    pub async fn negotiate(&self, channel: &ControlChannel) -> Result<()> {
        if self.negotiation_started.swap(true, Ordering::SeqCst) {
            return Err(Error::Negotiation(
                "session already negotiated; create a new session to retry".to_string(),
            ));
        }

        match self.run_offer_sequence(channel).await {
            Ok(()) => {}
            Err(e) => {
                self.fail(&e.to_string());
                return Err(e);
            }
        }

        // The receiver pairs with the sender fired by apply_answer/fail.
        let answer_rx = self
            .answer_rx
            .lock()
            .take()
            .ok_or_else(|| Error::InvalidState("answer receiver already taken".to_string()))?;

        match tokio::time::timeout(self.answer_timeout, answer_rx).await {
            Ok(Ok(Ok(()))) => {
                info!("Session {} negotiation complete", self.session_id);
                Ok(())
            }
            Ok(Ok(Err(reason))) => Err(Error::Negotiation(reason)),
            Ok(Err(_)) => {
                let reason = "session dropped while waiting for answer".to_string();
                self.fail(&reason);
                Err(Error::Negotiation(reason))
            }
            Err(_) => {
                let reason = "timed out waiting for answer".to_string();
                self.fail(&reason);
                Err(Error::Negotiation(reason))
            }
        }
    }

    /// Offer half of the handshake: transceivers, offer, ICE wait, send
    async fn run_offer_sequence(&self, channel: &ControlChannel) -> Result<()> {
        // Receive-only transceivers, video first. The order is part of the
        // wire contract with the car's answerer.
        let transceiver_init = || {
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            })
        };

        self.peer_connection
            .add_transceiver_from_kind(RTPCodecType::Video, transceiver_init())
            .await
            .map_err(|e| Error::WebRtc(format!("failed to add video transceiver: {}", e)))?;

        self.peer_connection
            .add_transceiver_from_kind(RTPCodecType::Audio, transceiver_init())
            .await
            .map_err(|e| Error::WebRtc(format!("failed to add audio transceiver: {}", e)))?;

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| Error::WebRtc(format!("failed to create offer: {}", e)))?;

        self.peer_connection
            .set_local_description(offer)
            .await
            .map_err(|e| Error::WebRtc(format!("failed to set local description: {}", e)))?;

        self.set_state(NegotiationState::OfferCreated);

        // Installing the local description kicks off candidate gathering.
        self.set_state(NegotiationState::IceGathering);

        let gathered = ice::gathering_complete(&self.peer_connection);
        tokio::time::timeout(self.ice_gathering_timeout, gathered)
            .await
            .map_err(|_| Error::Negotiation("timed out gathering ICE candidates".to_string()))?
            .map_err(|_| Error::Negotiation("peer connection dropped during gathering".to_string()))?;

        debug!("Session {}: ICE gathering complete", self.session_id);

        let local = self
            .peer_connection
            .local_description()
            .await
            .ok_or_else(|| Error::Negotiation("no local description after gathering".to_string()))?;

        let body = SessionDescriptionBody {
            sdp: local.sdp,
            kind: local.sdp_type.to_string(),
        };
        channel.send(&SignalEnvelope::offer(&body)?)?;

        self.set_state(NegotiationState::OfferSent);
        info!("Session {}: offer sent, waiting for answer", self.session_id);

        Ok(())
    }

    /// Route one inbound signaling envelope into the session
    ///
    /// Answers are applied; every other type is logged and ignored without
    /// touching session state (the channel stays open and the session keeps
    /// waiting).
    pub async fn handle_envelope(&self, envelope: SignalEnvelope) -> Result<()> {
        if !envelope.is_answer() {
            error!(
                "Session {}: ignoring message with unrecognized type {:?}",
                self.session_id, envelope.kind
            );
            return Ok(());
        }

        // An answer with no offer in flight is rejected before the body is
        // even looked at; a malformed one must not fail a session that has
        // not negotiated yet.
        if self.negotiation_state() != NegotiationState::OfferSent {
            return Err(Error::Negotiation(format!(
                "answer arrived in state {:?}, expected OfferSent",
                self.negotiation_state()
            )));
        }

        let body = match envelope.description_body() {
            Ok(body) => body,
            Err(e) => {
                let reason = format!("malformed answer body: {}", e);
                self.fail(&reason);
                return Err(Error::Negotiation(reason));
            }
        };

        self.apply_answer(body).await
    }

    /// Apply the remote answer, completing negotiation
    ///
    /// Valid only while an offer is in flight; an answer arriving in any
    /// other state is rejected and the state is left unchanged.
    pub async fn apply_answer(&self, body: SessionDescriptionBody) -> Result<()> {
        if self.negotiation_state() != NegotiationState::OfferSent {
            return Err(Error::Negotiation(format!(
                "answer arrived in state {:?}, expected OfferSent",
                self.negotiation_state()
            )));
        }

        if body.kind != "answer" {
            let reason = format!("remote description has type {:?}, expected answer", body.kind);
            self.fail(&reason);
            return Err(Error::Negotiation(reason));
        }

        let description = match RTCSessionDescription::answer(body.sdp) {
            Ok(desc) => desc,
            Err(e) => {
                let reason = format!("malformed answer SDP: {}", e);
                self.fail(&reason);
                return Err(Error::Negotiation(reason));
            }
        };

        if let Err(e) = self.peer_connection.set_remote_description(description).await {
            let reason = format!("failed to apply remote description: {}", e);
            self.fail(&reason);
            return Err(Error::Negotiation(reason));
        }

        info!("Session {}: answer applied", self.session_id);
        self.set_state(NegotiationState::Complete);
        if let Some(tx) = self.answer_tx.lock().take() {
            let _ = tx.send(Ok(()));
        }

        Ok(())
    }

    /// Mark the session failed
    ///
    /// Invoked on malformed answers and when the control channel closes
    /// before negotiation completes. Idempotent; a `Complete` session stays
    /// complete.
    pub(crate) fn fail(&self, reason: &str) {
        {
            let mut state = self.state.write();
            if matches!(*state, NegotiationState::Complete | NegotiationState::Failed) {
                return;
            }
            warn!("Session {} failed: {}", self.session_id, reason);
            *state = NegotiationState::Failed;
        }
        if let Some(tx) = self.answer_tx.lock().take() {
            let _ = tx.send(Err(reason.to_string()));
        }
    }

    /// Close the underlying peer connection
    ///
    /// A session closed before `Complete` is marked `Failed` so any pending
    /// `negotiate` call resolves.
    pub async fn close(&self) -> Result<()> {
        self.fail("session closed");
        self.peer_connection
            .close()
            .await
            .map_err(|e| Error::WebRtc(format!("failed to close peer connection: {}", e)))
    }
}
