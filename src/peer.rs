//! Top-level facade tying signaling, media session, and drive together
//!
//! One [`RemotePeer`] represents one car. Each peer owns its channel and
//! session outright; connecting to a second car means constructing a second
//! peer, there is no process-wide current device.

use crate::config::RoverConfig;
use crate::drive::{DriveCommandClient, Orientation};
use crate::session::{MediaSession, NegotiationState, TrackSink};
use crate::signaling::{ChannelState, ControlChannel};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, info};

/// Client handle for one remote camera car
///
/// Lifecycle: construct with a validated config, `connect`, `negotiate`,
/// then drive. `connect` may be called again after a drop; it tears down
/// the previous channel and session before establishing fresh ones, so a
/// peer never holds two live sessions.
pub struct RemotePeer {
    config: RoverConfig,
    channel: RwLock<Option<Arc<ControlChannel>>>,
    session: RwLock<Option<Arc<MediaSession>>>,
    drive: DriveCommandClient,
    video_sink: RwLock<Option<Arc<dyn TrackSink>>>,
    audio_sink: RwLock<Option<Arc<dyn TrackSink>>>,
}

impl RemotePeer {
    /// Create a peer for the car described by `config`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the config does not validate.
    pub fn new(config: RoverConfig) -> Result<Self> {
        config.validate()?;
        let drive = DriveCommandClient::new(&config)?;

        Ok(Self {
            config,
            channel: RwLock::new(None),
            session: RwLock::new(None),
            drive,
            video_sink: RwLock::new(None),
            audio_sink: RwLock::new(None),
        })
    }

    /// Register the video playback sink
    ///
    /// Applies to the current session if one exists and to every session
    /// created by later `connect` calls.
    pub fn set_video_sink(&self, sink: Arc<dyn TrackSink>) {
        *self.video_sink.write() = Some(Arc::clone(&sink));
        if let Some(session) = self.session.read().clone() {
            session.set_video_sink(sink);
        }
    }

    /// Register the audio playback sink
    pub fn set_audio_sink(&self, sink: Arc<dyn TrackSink>) {
        *self.audio_sink.write() = Some(Arc::clone(&sink));
        if let Some(session) = self.session.read().clone() {
            session.set_audio_sink(sink);
        }
    }

    /// Connect the control channel and prepare a fresh media session
    ///
    /// Any previous channel and session are closed first. The new session is
    /// wired to the channel: inbound envelopes are routed into it, and a
    /// channel close before negotiation completes fails the session so a
    /// pending `negotiate` resolves.
    pub async fn connect(&self) -> Result<()> {
        // Close-before-replace: take the old pair out under the locks, then
        // tear them down with no lock held.
        let old_channel = self.channel.write().take();
        let old_session = self.session.write().take();

        if let Some(session) = old_session {
            info!("Discarding previous media session {}", session.session_id());
            if let Err(e) = session.close().await {
                error!("Failed to close previous session: {}", e);
            }
        }
        if let Some(channel) = old_channel {
            channel.close();
        }

        let channel = Arc::new(
            ControlChannel::connect(&self.config.signaling_url(), self.config.connect_timeout())
                .await?,
        );

        // Session only after the channel is up; a failed session build must
        // not leave the fresh channel open.
        let session = match MediaSession::new(&self.config).await {
            Ok(session) => Arc::new(session),
            Err(e) => {
                channel.close();
                return Err(e);
            }
        };
        if let Some(sink) = self.video_sink.read().clone() {
            session.set_video_sink(sink);
        }
        if let Some(sink) = self.audio_sink.read().clone() {
            session.set_audio_sink(sink);
        }

        let pump_session = Arc::clone(&session);
        channel.set_message_handler(Arc::new(move |envelope| {
            let session = Arc::clone(&pump_session);
            tokio::spawn(async move {
                if let Err(e) = session.handle_envelope(envelope).await {
                    error!("Failed to handle signaling message: {}", e);
                }
            });
        }));

        let close_session = Arc::clone(&session);
        channel.set_close_handler(Arc::new(move |reason| {
            close_session.fail(&format!("control channel closed: {}", reason));
        }));

        *self.channel.write() = Some(channel);
        *self.session.write() = Some(session);

        Ok(())
    }

    /// Negotiate the media session over the connected control channel
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when called before `connect`, and
    /// propagates negotiation failures from the session.
    pub async fn negotiate(&self) -> Result<()> {
        let (channel, session) = {
            let channel = self.channel.read().clone();
            let session = self.session.read().clone();
            match (channel, session) {
                (Some(c), Some(s)) => (c, s),
                _ => {
                    return Err(Error::InvalidState(
                        "negotiate called before connect".to_string(),
                    ))
                }
            }
        };

        session.negotiate(&channel).await
    }

    /// Prime the car's motor controller
    pub async fn setup_drive(&self) {
        self.drive.setup().await;
    }

    /// Start driving forward
    pub async fn move_forward(&self) {
        self.drive.move_forward().await;
    }

    /// Start driving backward
    pub async fn move_backward(&self) {
        self.drive.move_backward().await;
    }

    /// Stop the drive motor
    pub async fn stop(&self) {
        self.drive.stop().await;
    }

    /// Toggle left steering
    pub async fn turn_left(&self) {
        self.drive.turn_left().await;
    }

    /// Toggle right steering
    pub async fn turn_right(&self) {
        self.drive.turn_right().await;
    }

    /// Current steering orientation as tracked locally
    pub fn orientation(&self) -> Orientation {
        self.drive.orientation()
    }

    /// State of the control channel, if one has been connected
    pub fn channel_state(&self) -> Option<ChannelState> {
        self.channel.read().as_ref().map(|c| c.state())
    }

    /// State of the media session, if one exists
    pub fn negotiation_state(&self) -> Option<NegotiationState> {
        self.session.read().as_ref().map(|s| s.negotiation_state())
    }

    /// Configuration this peer was built with
    pub fn config(&self) -> &RoverConfig {
        &self.config
    }

    /// Tear down the session and channel
    pub async fn close(&self) -> Result<()> {
        let channel = self.channel.write().take();
        let session = self.session.write().take();

        if let Some(session) = session {
            session.close().await?;
        }
        if let Some(channel) = channel {
            channel.close();
        }

        Ok(())
    }
}
