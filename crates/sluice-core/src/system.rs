//! Abstract interfaces to the underlying messaging system.
//!
//! The selection core never talks to a broker directly. Drivers implement
//! [`StreamConsumer`] and [`StreamAdmin`]; the composer and the coordinator
//! reader consume them through these traits.

use crate::envelope::IncomingEnvelope;
use crate::error::Result;
use crate::stream::{PartitionId, StreamPartition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Offsets describing one partition of a stream.
///
/// `oldest` and `newest` are `None` for a partition that holds no
/// messages; `upcoming` is the offset the next produced message will get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionOffsets {
    /// Offset of the oldest retained message
    pub oldest: Option<String>,

    /// Offset of the newest message
    pub newest: Option<String>,

    /// Offset the next produced message will be assigned
    pub upcoming: String,
}

impl PartitionOffsets {
    /// Offsets for a partition holding messages
    pub fn new(
        oldest: impl Into<String>,
        newest: impl Into<String>,
        upcoming: impl Into<String>,
    ) -> Self {
        Self {
            oldest: Some(oldest.into()),
            newest: Some(newest.into()),
            upcoming: upcoming.into(),
        }
    }

    /// Offsets for an empty partition
    pub fn empty(upcoming: impl Into<String>) -> Self {
        Self {
            oldest: None,
            newest: None,
            upcoming: upcoming.into(),
        }
    }
}

/// Per-partition offset metadata for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMetadata {
    /// Offset metadata per partition
    pub partitions: HashMap<PartitionId, PartitionOffsets>,
}

impl StreamMetadata {
    /// Create metadata from a per-partition offset map
    pub fn new(partitions: HashMap<PartitionId, PartitionOffsets>) -> Self {
        Self { partitions }
    }
}

/// A consumer of partitioned streams.
///
/// The task loop registers every input partition, starts the consumer,
/// then repeatedly polls it and deposits the returned envelopes into the
/// selector stack.
#[async_trait]
pub trait StreamConsumer: Send {
    /// Declare interest in a partition. `starting_offset` is the first
    /// offset to deliver; `None` positions the consumer at the upcoming
    /// offset.
    async fn register(
        &mut self,
        source: StreamPartition,
        starting_offset: Option<String>,
    ) -> Result<()>;

    /// Start delivering messages for all registered partitions.
    async fn start(&mut self) -> Result<()>;

    /// Stop the consumer. No envelopes are delivered after this returns.
    async fn stop(&mut self) -> Result<()>;

    /// Drain whatever envelopes are currently available, across all
    /// registered partitions. Returns an empty vec when nothing is
    /// buffered.
    async fn poll(&mut self) -> Result<Vec<IncomingEnvelope>>;
}

/// Administrative metadata access for one messaging system.
#[async_trait]
pub trait StreamAdmin: Send + Sync {
    /// Fetch offset metadata for the named streams, keyed by stream name.
    async fn stream_metadata(&self, streams: &[String]) -> Result<HashMap<String, StreamMetadata>>;

    /// For each given (partition, offset), return the offset immediately
    /// after it in that partition.
    async fn offsets_after(
        &self,
        offsets: &HashMap<StreamPartition, String>,
    ) -> Result<HashMap<StreamPartition, String>>;
}
