//! Assembles a selector stack from configuration.
//!
//! The stack is built inside-out: a tie-breaker from the configured
//! factory, a priority layer when any stream has an explicit tier or is
//! a bootstrap stream, a batching layer when a batch size is set, and a
//! bootstrap gate when any bootstrap partition has a recorded target.
//! Each composed stack is fresh; nothing is shared between tasks.

use crate::batching::BatchingSelector;
use crate::bootstrap::BootstrappingSelector;
use crate::config::SelectorConfig;
use crate::error::{Error, Result};
use crate::metrics::SelectorMetrics;
use crate::priority::TieredPrioritySelector;
use crate::selector::{MessageSelector, RoundRobinSelector};
use crate::stream::{StreamId, StreamPartition};
use crate::system::StreamAdmin;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Name under which the round-robin factory is always registered.
pub const ROUND_ROBIN_FACTORY: &str = "round-robin";

/// Produces a fresh tie-breaker selector instance.
pub trait SelectorFactory: Send + Sync {
    fn create(
        &self,
        config: &SelectorConfig,
        metrics: Option<&SelectorMetrics>,
    ) -> Box<dyn MessageSelector>;
}

/// Factory for [`RoundRobinSelector`].
#[derive(Debug, Default)]
pub struct RoundRobinFactory;

impl SelectorFactory for RoundRobinFactory {
    fn create(
        &self,
        _config: &SelectorConfig,
        metrics: Option<&SelectorMetrics>,
    ) -> Box<dyn MessageSelector> {
        let selector = RoundRobinSelector::new();
        match metrics {
            Some(metrics) => Box::new(selector.with_metrics(metrics.clone())),
            None => Box::new(selector),
        }
    }
}

/// Name to factory lookup, built once at process init.
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<dyn SelectorFactory>>,
}

impl FactoryRegistry {
    /// Create a registry with the built-in round-robin factory
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register(ROUND_ROBIN_FACTORY, Arc::new(RoundRobinFactory));
        registry
    }

    /// Register a factory under a name, replacing any previous entry
    pub fn register(&mut self, name: impl Into<String>, factory: Arc<dyn SelectorFactory>) {
        self.factories.insert(name.into(), factory);
    }

    /// Look up a factory by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn SelectorFactory>> {
        self.factories.get(name).cloned()
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the selector stack for one task.
///
/// `input_streams` are the task's inputs; `admins` maps system names to
/// their admin interface, used to capture bootstrap targets (the current
/// head offset of every bootstrap partition).
///
/// # Errors
///
/// `InvalidConfig` when the named factory is unknown, `UnknownSystem`
/// when a bootstrap stream's system has no admin, and `MissingMetadata`
/// when its metadata cannot be resolved. All are fatal at composition
/// time.
pub async fn compose_selector(
    config: &SelectorConfig,
    input_streams: &HashSet<StreamId>,
    admins: &HashMap<String, Arc<dyn StreamAdmin>>,
    registry: &FactoryRegistry,
    metrics: Option<SelectorMetrics>,
) -> Result<Box<dyn MessageSelector>> {
    let factory_name = config
        .default_factory
        .as_deref()
        .unwrap_or(ROUND_ROBIN_FACTORY);
    let factory = registry.get(factory_name).ok_or_else(|| {
        Error::InvalidConfig(format!("unknown selector factory: {factory_name}"))
    })?;

    // every input stream gets a tier: 0 by default, the maximum for
    // bootstrap streams, explicit configuration last
    let mut priorities: HashMap<StreamId, i32> = input_streams
        .iter()
        .map(|stream| (stream.clone(), 0))
        .collect();
    for stream in &config.bootstrap {
        priorities.insert(stream.clone(), i32::MAX);
    }
    for (stream, tier) in &config.priorities {
        priorities.insert(stream.clone(), *tier);
    }

    let targets = bootstrap_targets(config, admins).await?;

    let use_priority = !config.priorities.is_empty() || !config.bootstrap.is_empty();
    let mut selector: Box<dyn MessageSelector> = if use_priority {
        let mut tiers: BTreeMap<i32, Box<dyn MessageSelector>> = BTreeMap::new();
        for tier in priorities.values() {
            tiers
                .entry(*tier)
                .or_insert_with(|| factory.create(config, metrics.as_ref()));
        }
        debug!(tiers = tiers.len(), "composing priority layer");
        let mut priority = TieredPrioritySelector::new(
            priorities,
            tiers,
            factory.create(config, metrics.as_ref()),
        )?;
        if let Some(metrics) = &metrics {
            priority = priority.with_metrics(metrics.clone());
        }
        Box::new(priority)
    } else {
        factory.create(config, metrics.as_ref())
    };

    if let Some(batch_size) = config.batch_size {
        debug!(batch_size, "composing batching layer");
        let mut batching = BatchingSelector::new(selector, batch_size)?;
        if let Some(metrics) = &metrics {
            batching = batching.with_metrics(metrics.clone());
        }
        selector = Box::new(batching);
    }

    if !targets.is_empty() {
        debug!(partitions = targets.len(), "composing bootstrap gate");
        let mut bootstrapping = BootstrappingSelector::new(selector, targets);
        if let Some(metrics) = &metrics {
            bootstrapping = bootstrapping.with_metrics(metrics.clone());
        }
        selector = Box::new(bootstrapping);
    }

    info!(
        factory = factory_name,
        priority = use_priority,
        batching = config.batch_size.is_some(),
        bootstrap = !config.bootstrap.is_empty(),
        "composed selector stack"
    );
    Ok(selector)
}

/// Capture the current head offset of every bootstrap partition.
///
/// Partitions that hold no messages are born caught up and get no
/// target.
async fn bootstrap_targets(
    config: &SelectorConfig,
    admins: &HashMap<String, Arc<dyn StreamAdmin>>,
) -> Result<HashMap<StreamPartition, String>> {
    let mut targets = HashMap::new();
    if config.bootstrap.is_empty() {
        return Ok(targets);
    }

    let mut by_system: HashMap<&str, Vec<&StreamId>> = HashMap::new();
    for stream in &config.bootstrap {
        by_system.entry(&stream.system).or_default().push(stream);
    }

    for (system, streams) in by_system {
        let admin = admins
            .get(system)
            .ok_or_else(|| Error::UnknownSystem(system.to_string()))?;
        let names: Vec<String> = streams.iter().map(|s| s.stream.clone()).collect();
        let metadata = admin.stream_metadata(&names).await?;

        for stream in streams {
            let stream_metadata = metadata
                .get(&stream.stream)
                .ok_or_else(|| Error::MissingMetadata(stream.to_string()))?;
            for (partition, offsets) in &stream_metadata.partitions {
                if let Some(newest) = &offsets.newest {
                    targets.insert(
                        StreamPartition {
                            stream_id: (*stream).clone(),
                            partition: *partition,
                        },
                        newest.clone(),
                    );
                }
            }
        }
    }
    Ok(targets)
}
