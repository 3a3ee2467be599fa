//! Control channel
//!
//! The application talks to the cache layer with small JSON messages of the
//! form `{"type": "SKIP_WAITING"}`. Anything not understood is dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Message type asking an installed version to take over immediately
pub const SKIP_WAITING: &str = "SKIP_WAITING";

/// Raw message posted by the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ControlMessage {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }

    pub fn skip_waiting() -> Self {
        Self::new(SKIP_WAITING)
    }
}

/// Signal delivered to the lifecycle controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Leave the waiting state without waiting for old clients to close
    ActivateNow,
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActivateNow => write!(f, "ACTIVATE_NOW"),
        }
    }
}

impl ControlSignal {
    /// Signal carried by a message, if any
    pub fn from_message(message: &ControlMessage) -> Option<Self> {
        match message.kind.as_str() {
            SKIP_WAITING => Some(Self::ActivateNow),
            _ => None,
        }
    }
}

/// Parse a raw JSON message into a signal
///
/// Malformed JSON and unknown message types yield `None`, never an error.
pub fn parse_message(raw: &str) -> Option<ControlSignal> {
    let message: ControlMessage = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(e) => {
            debug!("Ignoring malformed control message: {}", e);
            return None;
        }
    };

    let signal = ControlSignal::from_message(&message);
    if signal.is_none() {
        debug!("Ignoring control message of type {:?}", message.kind);
    }
    signal
}
