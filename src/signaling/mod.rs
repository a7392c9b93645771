//! Signaling protocol and control channel for offer/answer exchange
//!
//! The car's server speaks a small JSON envelope over a plain WebSocket:
//! the viewer sends one `offer` per media session and waits for one
//! `answer`. [`ControlChannel`] owns the socket; [`protocol`] defines the
//! wire shapes.

pub mod channel;
pub mod protocol;

pub use channel::{ChannelState, CloseHandler, ControlChannel, MessageHandler};
pub use protocol::{SessionDescriptionBody, SignalEnvelope, TYPE_ANSWER, TYPE_OFFER};
