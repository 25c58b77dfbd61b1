use std::fmt;
use std::str::FromStr;

use super::error::StreamError;

/// Control-channel message carried in a bytes payload.
///
/// Wire format is UTF-8 text with fields joined by `;`:
/// `threshold;<decimal int>` or `voice;<true|false>`. A bare decimal
/// integer is accepted as a legacy threshold update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// New live capture threshold.
    Threshold(u32),
    /// True while the listening side records a voice message.
    Voice(bool),
}

impl ControlMessage {
    pub fn parse(bytes: &[u8]) -> Result<Self, StreamError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| StreamError::MalformedControlMessage(format!("not utf-8: {}", e)))?;
        text.parse()
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl FromStr for ControlMessage {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || StreamError::MalformedControlMessage(format!("{:?}", s));
        let text = s.trim();

        let mut parts = text.split(';');
        let head = parts.next().unwrap_or_default();
        let value = parts.next();
        if parts.next().is_some() {
            return Err(malformed());
        }

        match (head, value) {
            ("threshold", Some(v)) => v.parse().map(Self::Threshold).map_err(|_| malformed()),
            ("voice", Some(v)) => {
                if v.eq_ignore_ascii_case("true") {
                    Ok(Self::Voice(true))
                } else if v.eq_ignore_ascii_case("false") {
                    Ok(Self::Voice(false))
                } else {
                    Err(malformed())
                }
            }
            (bare, None) => bare.parse().map(Self::Threshold).map_err(|_| malformed()),
            _ => Err(malformed()),
        }
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Threshold(t) => write!(f, "threshold;{}", t),
            Self::Voice(v) => write!(f, "voice;{}", v),
        }
    }
}
