//! JSON signaling envelope shared with the car's server
//!
//! Every frame on the control channel is a JSON object of the form
//! `{"type": <string>, "body": <any>}`. The viewer sends exactly one
//! `offer` per media session; the car replies with one `answer`. Any other
//! `type` is tolerated and ignored by the consumer.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Message type of an outbound offer envelope
pub const TYPE_OFFER: &str = "offer";

/// Message type of an inbound answer envelope
pub const TYPE_ANSWER: &str = "answer";

/// Wire envelope for signaling messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEnvelope {
    /// Message type tag (`offer`, `answer`, ...)
    #[serde(rename = "type")]
    pub kind: String,

    /// Type-specific payload
    pub body: serde_json::Value,
}

/// Session description payload carried by offer and answer envelopes
///
/// Extra fields in an inbound body are tolerated; only `sdp` and `type`
/// are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescriptionBody {
    /// SDP text
    pub sdp: String,

    /// Description type (`offer` or `answer`)
    #[serde(rename = "type")]
    pub kind: String,
}

impl SignalEnvelope {
    /// Build an offer envelope from a local session description
    pub fn offer(description: &SessionDescriptionBody) -> Result<Self> {
        Ok(Self {
            kind: TYPE_OFFER.to_string(),
            body: serde_json::to_value(description)
                .map_err(|e| Error::Signaling(format!("failed to encode offer body: {}", e)))?,
        })
    }

    /// Parse an envelope from a text frame
    pub fn from_text(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::Signaling(format!("malformed signaling frame: {}", e)))
    }

    /// Serialize the envelope to a text frame
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Signaling(format!("failed to encode envelope: {}", e)))
    }

    /// Whether this envelope carries an answer
    pub fn is_answer(&self) -> bool {
        self.kind == TYPE_ANSWER
    }

    /// Extract the session description from an answer body
    pub fn description_body(&self) -> Result<SessionDescriptionBody> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| Error::Signaling(format!("malformed session description body: {}", e)))
    }
}
