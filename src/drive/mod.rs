//! Drive command client: HTTP GET actions against the car's command server
//!
//! Every command is a single `GET /run/?action=<name>` request. Commands are
//! fire-and-forget at the API surface: a failed request is logged and
//! swallowed, never surfaced to the caller, because a dropped drive command
//! is recoverable by the operator pressing the control again.

use crate::config::RoverConfig;
use crate::{Error, Result};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Steering orientation of the car's front wheels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Straight,
    Left,
    Right,
}

impl Orientation {
    /// Orientation after a left-turn press: left toggles back to straight
    pub fn toggled_left(self) -> Orientation {
        match self {
            Orientation::Left => Orientation::Straight,
            _ => Orientation::Left,
        }
    }

    /// Orientation after a right-turn press: right toggles back to straight
    pub fn toggled_right(self) -> Orientation {
        match self {
            Orientation::Right => Orientation::Straight,
            _ => Orientation::Right,
        }
    }

    /// Steering action the car expects for this orientation
    pub fn steer_action(self) -> &'static str {
        match self {
            Orientation::Straight => "fwstraight",
            Orientation::Left => "fwleft",
            Orientation::Right => "fwright",
        }
    }
}

/// HTTP client for the car's drive command server
///
/// Tracks the current steering orientation locally; the car holds no
/// queryable state, so the toggle semantics of the turn buttons live here.
pub struct DriveCommandClient {
    command_base: String,
    client: reqwest::Client,
    orientation: Mutex<Orientation>,
}

impl DriveCommandClient {
    /// Create a client for the car described by `config`
    pub fn new(config: &RoverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.command_timeout())
            .build()
            .map_err(|e| Error::Command(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            command_base: config.command_base(),
            client,
            orientation: Mutex::new(Orientation::Straight),
        })
    }

    /// Current locally-tracked steering orientation
    pub fn orientation(&self) -> Orientation {
        *self.orientation.lock()
    }

    fn command_url(&self, action: &str) -> String {
        format!("{}/run/?action={}", self.command_base, action)
    }

    /// Issue one action, surfacing the transport error
    async fn send_action(&self, action: &str) -> Result<()> {
        let url = self.command_url(action);
        debug!("Sending drive command: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Command(format!("failed to send {}: {}", action, e)))?;

        if !response.status().is_success() {
            return Err(Error::Command(format!(
                "command {} rejected with status {}",
                action,
                response.status()
            )));
        }

        Ok(())
    }

    /// Issue one action, logging and swallowing failures
    async fn fire(&self, action: &str) {
        if let Err(e) = self.send_action(action).await {
            warn!("Drive command failed: {}", e);
        }
    }

    /// Prime the car's motor controller after connecting
    ///
    /// Sends the initialization sequence the car runs its calibration from.
    pub async fn setup(&self) {
        self.fire("setup").await;
        self.fire("bwready").await;
        self.fire("fwready").await;
    }

    /// Start driving forward
    pub async fn move_forward(&self) {
        self.fire("forward").await;
    }

    /// Start driving backward
    pub async fn move_backward(&self) {
        self.fire("backward").await;
    }

    /// Stop the drive motor
    ///
    /// A missed stop leaves the car running, so this one command retries
    /// once on failure before giving up.
    pub async fn stop(&self) {
        if let Err(e) = self.send_action("stop").await {
            warn!("Stop command failed, retrying once: {}", e);
            self.fire("stop").await;
        }
    }

    /// Toggle the left-turn steering state and apply it
    pub async fn turn_left(&self) {
        let next = {
            let mut orientation = self.orientation.lock();
            *orientation = orientation.toggled_left();
            *orientation
        };
        self.fire(next.steer_action()).await;
    }

    /// Toggle the right-turn steering state and apply it
    pub async fn turn_right(&self) {
        let next = {
            let mut orientation = self.orientation.lock();
            *orientation = orientation.toggled_right();
            *orientation
        };
        self.fire(next.steer_action()).await;
    }
}
