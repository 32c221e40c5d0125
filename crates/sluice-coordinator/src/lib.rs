//! Coordinator-stream read model.
//!
//! Tasks recover their configuration by replaying an ordered,
//! single-partition log of `set-config` records. [`CoordinatorMessage`]
//! is the wire format; [`CoordinatorLogReader`] replays the log into a
//! key/value snapshot.

pub mod error;
pub mod message;
pub mod metrics;
pub mod reader;

pub use error::{Error, Result};
pub use message::{CoordinatorMessage, SET_CONFIG_TYPE, VERSION};
pub use metrics::CoordinatorMetrics;
pub use reader::CoordinatorLogReader;
