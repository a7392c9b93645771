//! Media session lifecycle: peer connection, ICE wait, track sinks
//!
//! [`MediaSession`] drives one receive-only offer/answer negotiation;
//! [`sink`] is the seam the presentation layer plugs into; [`ice`] holds the
//! one-shot gathering wait the offer path depends on.

pub(crate) mod ice;
pub mod media_session;
pub mod sink;

pub use media_session::{MediaSession, NegotiationState};
pub use sink::{ChannelSink, TrackSink};
