//! Typed selector configuration.
//!
//! Options are enumerated, not free-form: the recognized keys are
//!
//! ```text
//! task.chooser.batch.size                  = <positive int>
//! task.chooser.priorities.<sys>.<stream>   = <int>
//! task.chooser.bootstrap.<sys>.<stream>    = true|false
//! task.chooser.default-selector-factory    = <factory name>
//! ```
//!
//! Anything else in the map is ignored; malformed values for recognized
//! keys are configuration errors.

use crate::error::{Error, Result};
use crate::stream::StreamId;
use std::collections::{HashMap, HashSet};

const BATCH_SIZE_KEY: &str = "task.chooser.batch.size";
const PRIORITIES_PREFIX: &str = "task.chooser.priorities.";
const BOOTSTRAP_PREFIX: &str = "task.chooser.bootstrap.";
const DEFAULT_FACTORY_KEY: &str = "task.chooser.default-selector-factory";

/// Configuration for one selector stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Batch size for the batching layer; `None` disables batching
    pub batch_size: Option<usize>,

    /// Explicit priority tier per stream (higher wins)
    pub priorities: HashMap<StreamId, i32>,

    /// Streams whose history must be consumed before the task runs freely
    pub bootstrap: HashSet<StreamId>,

    /// Name of the tie-breaker factory; `None` means round-robin
    pub default_factory: Option<String>,
}

impl SelectorConfig {
    /// Create an empty configuration (plain round-robin selection)
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable batching with the given size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Assign a stream to a priority tier
    pub fn with_priority(mut self, stream: StreamId, tier: i32) -> Self {
        self.priorities.insert(stream, tier);
        self
    }

    /// Declare a bootstrap stream
    pub fn with_bootstrap(mut self, stream: StreamId) -> Self {
        self.bootstrap.insert(stream);
        self
    }

    /// Pick the tie-breaker factory by name
    pub fn with_default_factory(mut self, name: impl Into<String>) -> Self {
        self.default_factory = Some(name.into());
        self
    }

    /// True when no policy layer is configured at all
    pub fn is_empty(&self) -> bool {
        self.batch_size.is_none() && self.priorities.is_empty() && self.bootstrap.is_empty()
    }

    /// Parse the recognized `task.chooser.*` keys out of a flat
    /// configuration map (such as the one replayed from the coordinator
    /// log).
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        for (key, value) in map {
            if key == BATCH_SIZE_KEY {
                let batch_size: usize = value.parse().map_err(|_| {
                    Error::InvalidConfig(format!("{key} must be a positive integer, got {value:?}"))
                })?;
                if batch_size == 0 {
                    return Err(Error::InvalidConfig(format!(
                        "{key} must be a positive integer, got 0"
                    )));
                }
                config.batch_size = Some(batch_size);
            } else if let Some(rest) = key.strip_prefix(PRIORITIES_PREFIX) {
                let stream = parse_stream(key, rest)?;
                let tier: i32 = value.parse().map_err(|_| {
                    Error::InvalidConfig(format!("{key} must be an integer, got {value:?}"))
                })?;
                config.priorities.insert(stream, tier);
            } else if let Some(rest) = key.strip_prefix(BOOTSTRAP_PREFIX) {
                let stream = parse_stream(key, rest)?;
                let enabled: bool = value.parse().map_err(|_| {
                    Error::InvalidConfig(format!("{key} must be true or false, got {value:?}"))
                })?;
                if enabled {
                    config.bootstrap.insert(stream);
                }
            } else if key == DEFAULT_FACTORY_KEY {
                config.default_factory = Some(value.clone());
            }
        }

        Ok(config)
    }
}

/// A stream key suffix is `<system>.<stream>`; the stream part may itself
/// contain dots.
fn parse_stream(key: &str, rest: &str) -> Result<StreamId> {
    match rest.split_once('.') {
        Some((system, stream)) if !system.is_empty() && !stream.is_empty() => {
            Ok(StreamId::new(system, stream))
        }
        _ => Err(Error::InvalidConfig(format!(
            "{key} does not name a <system>.<stream> pair"
        ))),
    }
}
