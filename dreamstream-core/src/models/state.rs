use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection state of one local role instance.
///
/// State transitions:
/// ```text
/// unknown → available → searching → connected
///              ↑            ↑  ↓         │
///              └────────────┴──┴─────────┘  (peer lost / user toggle)
/// any → unknown  (full teardown)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Unknown,
    /// Idle, ready to (re)start a search.
    Available,
    Searching,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_searching(&self) -> bool {
        matches!(self, Self::Searching)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Available => "available",
            Self::Searching => "searching",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side of the link this instance plays.
///
/// The sender owns the microphone and advertises; the receiver listens and
/// discovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
