use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::processing::pipe::PipeReader;

static NEXT_PAYLOAD_ID: AtomicU64 = AtomicU64::new(1);

/// A unit of transmitted data: a short byte message or a continuous stream.
pub enum Payload {
    Bytes { id: u64, data: Vec<u8> },
    Stream { id: u64, reader: PipeReader },
}

impl Payload {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            id: next_id(),
            data: data.into(),
        }
    }

    pub fn from_stream(reader: PipeReader) -> Self {
        Self::Stream {
            id: next_id(),
            reader,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Self::Bytes { id, .. } | Self::Stream { id, .. } => *id,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream { .. })
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes { id, data } => write!(f, "Payload::Bytes{{id={}, len={}}}", id, data.len()),
            Self::Stream { id, .. } => write!(f, "Payload::Stream{{id={}}}", id),
        }
    }
}

fn next_id() -> u64 {
    NEXT_PAYLOAD_ID.fetch_add(1, Ordering::Relaxed)
}

/// Progress of one payload transfer, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    InProgress,
    Success,
    Failure,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadTransferUpdate {
    pub payload_id: u64,
    pub status: TransferStatus,
    pub bytes_transferred: u64,
}
