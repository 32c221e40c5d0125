//! Replays the coordinator log into a configuration snapshot.
//!
//! The coordinator stream is a single-partition, append-only log of
//! configuration records. The reader registers at the earliest offset,
//! captures the head offset, and replays every record up to that head;
//! only then is the materialized key/value map observable.

use crate::error::{Error, Result};
use crate::message::{CoordinatorMessage, SET_CONFIG_TYPE};
use crate::metrics::CoordinatorMetrics;
use sluice_core::{IncomingEnvelope, StreamAdmin, StreamConsumer, StreamId, StreamPartition};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Materializes the configuration carried by a coordinator stream.
pub struct CoordinatorLogReader {
    source: StreamPartition,
    consumer: Box<dyn StreamConsumer>,
    admin: Arc<dyn StreamAdmin>,
    config: HashMap<String, String>,
    head: Option<String>,
    registered: bool,
    bootstrapped: bool,
}

impl CoordinatorLogReader {
    /// Create a reader over partition 0 of the given coordinator stream.
    pub fn new(
        stream_id: StreamId,
        consumer: Box<dyn StreamConsumer>,
        admin: Arc<dyn StreamAdmin>,
    ) -> Self {
        Self {
            source: StreamPartition::new(stream_id, 0),
            consumer,
            admin,
            config: HashMap::new(),
            head: None,
            registered: false,
            bootstrapped: false,
        }
    }

    /// Look up the log's offset range and register the consumer at the
    /// earliest offset. The newest offset becomes the replay head.
    ///
    /// # Errors
    ///
    /// `MissingMetadata` when the admin does not know the coordinator
    /// stream or its partition.
    pub async fn register(&mut self) -> Result<()> {
        let stream_name = self.source.stream().to_string();
        let metadata = self.admin.stream_metadata(&[stream_name.clone()]).await?;
        let stream_metadata = metadata
            .get(&stream_name)
            .ok_or_else(|| Error::MissingMetadata(stream_name.clone()))?;
        let offsets = stream_metadata
            .partitions
            .get(&self.source.partition)
            .ok_or_else(|| Error::MissingMetadata(self.source.to_string()))?;

        self.head = offsets.newest.clone();
        self.consumer
            .register(self.source.clone(), offsets.oldest.clone())
            .await?;
        self.registered = true;

        info!(
            source = %self.source,
            head = ?self.head,
            "registered coordinator stream reader"
        );
        Ok(())
    }

    /// Start the underlying consumer.
    pub async fn start(&mut self) -> Result<()> {
        Ok(self.consumer.start().await?)
    }

    /// Stop the underlying consumer.
    pub async fn stop(&mut self) -> Result<()> {
        Ok(self.consumer.stop().await?)
    }

    /// Replay the log from the registered position up to the captured
    /// head. On success the configuration snapshot becomes observable;
    /// on any failure the reader stays un-bootstrapped and no partial
    /// result is ever exposed.
    pub async fn bootstrap(&mut self) -> Result<()> {
        if !self.registered {
            return Err(Error::NotRegistered);
        }
        if self.bootstrapped {
            return Ok(());
        }
        let Some(head) = self.head.clone() else {
            // empty log: nothing to replay
            self.bootstrapped = true;
            return Ok(());
        };

        let mut staged = self.config.clone();
        let mut replayed = 0u64;
        loop {
            let batch = self.consumer.poll().await?;
            if batch.is_empty() {
                // everything up to the captured head predates
                // registration, so a correct consumer cannot run dry
                // before delivering it
                return Err(Error::IncompleteReplay(head));
            }
            for envelope in batch {
                let at_head = envelope.offset == head;
                Self::apply(&mut staged, envelope)?;
                replayed += 1;
                if at_head {
                    self.config = staged;
                    self.bootstrapped = true;
                    CoordinatorMetrics::add_records_replayed(replayed);
                    info!(replayed, entries = self.config.len(), "coordinator log replayed");
                    return Ok(());
                }
            }
        }
    }

    /// Apply one record to the staged configuration map.
    fn apply(staged: &mut HashMap<String, String>, envelope: IncomingEnvelope) -> Result<()> {
        let key_bytes = envelope
            .key
            .as_ref()
            .ok_or_else(|| Error::MalformedRecord("record without key bytes".to_string()))?;
        let value_bytes = (!envelope.message.is_empty()).then_some(&envelope.message[..]);
        let message = CoordinatorMessage::from_wire(key_bytes, value_bytes)?;

        if message.message_type() != SET_CONFIG_TYPE {
            debug!(
                message_type = message.message_type(),
                offset = %envelope.offset,
                "skipping non-config record"
            );
            CoordinatorMetrics::increment_records_skipped();
            return Ok(());
        }

        if message.is_delete() {
            staged.remove(message.key());
        } else {
            let value = message.config_value().ok_or_else(|| {
                Error::MalformedRecord(format!(
                    "set-config record for {} carries no value",
                    message.key()
                ))
            })?;
            staged.insert(message.key().to_string(), value.to_string());
        }
        Ok(())
    }

    /// The replayed configuration snapshot.
    ///
    /// # Errors
    ///
    /// `NotBootstrapped` until [`bootstrap`](Self::bootstrap) has
    /// completed successfully.
    pub fn config(&self) -> Result<HashMap<String, String>> {
        if self.bootstrapped {
            Ok(self.config.clone())
        } else {
            Err(Error::NotBootstrapped)
        }
    }

    /// Whether the replay has completed.
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }
}
