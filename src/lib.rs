//! Client library for remotely operated camera cars
//!
//! Connects to a car over its WebSocket signaling endpoint, negotiates a
//! receive-only WebRTC media session (video and audio from the car's
//! camera), and drives the car through its HTTP command server.
//!
//! # Architecture
//!
//! - [`signaling`]: JSON envelope protocol and the WebSocket control channel
//! - [`session`]: peer connection, offer/answer state machine, track sinks
//! - [`drive`]: fire-and-forget HTTP drive commands with local steering state
//! - [`peer`]: the [`RemotePeer`] facade wiring the three together
//!
//! # Example
//!
//! ```no_run
//! use rovercam::{RemotePeer, RoverConfig};
//!
//! # async fn run() -> rovercam::Result<()> {
//! let peer = RemotePeer::new(RoverConfig::for_host("192.168.4.1"))?;
//! peer.connect().await?;
//! peer.negotiate().await?;
//! peer.setup_drive().await;
//! peer.move_forward().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod drive;
pub mod error;
pub mod peer;
pub mod session;
pub mod signaling;

pub use config::RoverConfig;
pub use drive::{DriveCommandClient, Orientation};
pub use error::{Error, Result};
pub use peer::RemotePeer;
pub use session::{ChannelSink, MediaSession, NegotiationState, TrackSink};
pub use signaling::{ChannelState, ControlChannel, SessionDescriptionBody, SignalEnvelope};
