//! Message-selection core for partitioned stream tasks.
//!
//! A task consumes envelopes from many stream partitions; this crate
//! decides which envelope it processes next. Three orthogonal policies
//! (batching, priority tiering, and bootstrap gating) are expressed as
//! selectors that wrap one another, assembled from configuration by the
//! composer into a single [`MessageSelector`] stack per task.

pub mod batching;
pub mod bootstrap;
pub mod compose;
pub mod config;
pub mod envelope;
pub mod error;
pub mod metrics;
pub mod priority;
pub mod selector;
pub mod stream;
pub mod system;

pub use batching::BatchingSelector;
pub use bootstrap::BootstrappingSelector;
pub use compose::{
    compose_selector, FactoryRegistry, RoundRobinFactory, SelectorFactory, ROUND_ROBIN_FACTORY,
};
pub use config::SelectorConfig;
pub use envelope::IncomingEnvelope;
pub use error::{Error, Result};
pub use metrics::SelectorMetrics;
pub use priority::TieredPrioritySelector;
pub use selector::{MessageSelector, RoundRobinSelector};
pub use stream::{PartitionId, StreamId, StreamPartition};
pub use system::{PartitionOffsets, StreamAdmin, StreamConsumer, StreamMetadata};
