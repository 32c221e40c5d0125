use crate::stream::StreamPartition;
use bytes::Bytes;

/// A single message delivered from one stream partition.
///
/// The offset is opaque: selectors only ever compare it against a target
/// offset recorded at composition time. Ordering within a partition is
/// given by arrival, never by inspecting the offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEnvelope {
    /// The partition this envelope was consumed from
    pub source: StreamPartition,

    /// Message key (optional, used for partitioning on the producing side)
    pub key: Option<Bytes>,

    /// Message payload
    pub message: Bytes,

    /// Offset of the message within its partition
    pub offset: String,
}

impl IncomingEnvelope {
    /// Create a new envelope
    pub fn new(source: StreamPartition, message: Bytes, offset: impl Into<String>) -> Self {
        Self {
            source,
            key: None,
            message,
            offset: offset.into(),
        }
    }

    /// Create an envelope with a key
    pub fn with_key(
        source: StreamPartition,
        key: Bytes,
        message: Bytes,
        offset: impl Into<String>,
    ) -> Self {
        Self {
            source,
            key: Some(key),
            message,
            offset: offset.into(),
        }
    }
}
