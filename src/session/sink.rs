//! Playback sinks for inbound media tracks

use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::track::track_remote::TrackRemote;

/// Playback destination for one media kind
///
/// The presentation layer implements this seam: a video sink feeds a texture
/// or player surface, an audio sink feeds an output device. `attach` is
/// invoked from the session's track handler whenever a remote track of the
/// sink's kind arrives; a repeat invocation supersedes the previous track.
pub trait TrackSink: Send + Sync {
    /// Receive a remote track for playback
    fn attach(&self, track: Arc<TrackRemote>);
}

/// Sink that forwards tracks into an mpsc channel
///
/// Useful when the consumer wants to pull tracks from its own task instead
/// of reacting inside the session callback, and for tests.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Arc<TrackRemote>>,
}

impl ChannelSink {
    /// Create a sink and the receiver its tracks arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Arc<TrackRemote>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TrackSink for ChannelSink {
    fn attach(&self, track: Arc<TrackRemote>) {
        // Receiver gone means the consumer stopped caring; drop the track.
        let _ = self.tx.send(track);
    }
}

impl<F> TrackSink for F
where
    F: Fn(Arc<TrackRemote>) + Send + Sync,
{
    fn attach(&self, track: Arc<TrackRemote>) {
        self(track)
    }
}
