use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one logical stream within a named messaging system.
///
/// The system name selects which driver (and admin) owns the stream; the
/// stream name is scoped to that system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId {
    /// Name of the messaging system the stream lives in
    pub system: String,

    /// Stream name within the system
    pub stream: String,
}

impl StreamId {
    /// Create a new stream identifier
    pub fn new(system: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            stream: stream.into(),
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.system, self.stream)
    }
}

/// Zero-based partition index within a stream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct PartitionId(pub u32);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One ordered log of envelopes: a (system, stream, partition) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamPartition {
    /// The stream this partition belongs to
    pub stream_id: StreamId,

    /// Partition index within the stream
    pub partition: PartitionId,
}

impl StreamPartition {
    /// Create a new stream partition identifier
    pub fn new(stream_id: StreamId, partition: u32) -> Self {
        Self {
            stream_id,
            partition: PartitionId(partition),
        }
    }

    /// Get the system name
    pub fn system(&self) -> &str {
        &self.stream_id.system
    }

    /// Get the stream name
    pub fn stream(&self) -> &str {
        &self.stream_id.stream
    }
}

impl fmt::Display for StreamPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.stream_id, self.partition)
    }
}
