//! End-to-end scenarios through composed selector stacks.

use bytes::Bytes;
use sluice_core::{
    compose_selector, FactoryRegistry, IncomingEnvelope, MessageSelector, PartitionId,
    PartitionOffsets, SelectorConfig, SelectorMetrics, StreamAdmin, StreamId, StreamMetadata,
    StreamPartition,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

struct FixedAdmin {
    metadata: HashMap<String, StreamMetadata>,
}

#[async_trait::async_trait]
impl StreamAdmin for FixedAdmin {
    async fn stream_metadata(
        &self,
        streams: &[String],
    ) -> sluice_core::Result<HashMap<String, StreamMetadata>> {
        Ok(streams
            .iter()
            .filter_map(|name| {
                self.metadata
                    .get(name)
                    .map(|metadata| (name.clone(), metadata.clone()))
            })
            .collect())
    }

    async fn offsets_after(
        &self,
        offsets: &HashMap<StreamPartition, String>,
    ) -> sluice_core::Result<HashMap<StreamPartition, String>> {
        Ok(offsets
            .iter()
            .filter_map(|(source, offset)| {
                offset
                    .parse::<u64>()
                    .ok()
                    .map(|n| (source.clone(), (n + 1).to_string()))
            })
            .collect())
    }
}

fn admins_with(entries: &[(&str, u32, &str)]) -> HashMap<String, Arc<dyn StreamAdmin>> {
    let mut metadata: HashMap<String, StreamMetadata> = HashMap::new();
    for (stream, partition, newest) in entries {
        metadata
            .entry(stream.to_string())
            .or_insert_with(|| StreamMetadata::new(HashMap::new()))
            .partitions
            .insert(
                PartitionId(*partition),
                PartitionOffsets::new("0", *newest, "next"),
            );
    }
    let mut admins: HashMap<String, Arc<dyn StreamAdmin>> = HashMap::new();
    admins.insert("kafka".to_string(), Arc::new(FixedAdmin { metadata }));
    admins
}

fn inputs(streams: &[&str]) -> HashSet<StreamId> {
    streams
        .iter()
        .map(|stream| StreamId::new("kafka", *stream))
        .collect()
}

fn ssp(stream: &str, partition: u32) -> StreamPartition {
    StreamPartition::new(StreamId::new("kafka", stream), partition)
}

fn envelope(source: &StreamPartition, offset: &str) -> IncomingEnvelope {
    IncomingEnvelope::new(source.clone(), Bytes::from_static(b"payload"), offset)
}

/// A bootstrap partition that was already consumed to its target lifts
/// the gate immediately.
#[tokio::test]
async fn bootstrap_caught_up_at_registration() {
    let config = SelectorConfig::new().with_bootstrap(StreamId::new("kafka", "settings"));
    let mut selector = compose_selector(
        &config,
        &inputs(&["settings", "orders"]),
        &admins_with(&[("settings", 0, "123")]),
        &FactoryRegistry::new(),
        Some(SelectorMetrics::new("task-0")),
    )
    .await
    .unwrap();

    let settings = ssp("settings", 0);
    let orders = ssp("orders", 0);
    selector.register(settings, Some("123".to_string()));
    selector.register(orders.clone(), None);
    selector.start();

    selector.update(envelope(&orders, "1"));
    assert_eq!(selector.choose().unwrap().source, orders);
    assert!(selector.choose().is_none());

    selector.stop();
}

/// While a bootstrap stream lags, it is preferred over everything else;
/// once it reaches the captured head the stack behaves normally.
#[tokio::test]
async fn bootstrap_lags_then_catches_up() {
    let config = SelectorConfig::new().with_bootstrap(StreamId::new("kafka", "settings"));
    let mut selector = compose_selector(
        &config,
        &inputs(&["settings", "orders"]),
        &admins_with(&[("settings", 0, "123")]),
        &FactoryRegistry::new(),
        None,
    )
    .await
    .unwrap();

    let settings = ssp("settings", 0);
    let orders = ssp("orders", 0);
    selector.register(settings.clone(), Some("1".to_string()));
    selector.register(orders.clone(), None);
    selector.start();

    selector.update(envelope(&orders, "1"));
    assert!(selector.choose().is_none());

    selector.update(envelope(&settings, "4"));
    assert_eq!(selector.choose().unwrap().source, settings);
    assert!(selector.choose().is_none());

    selector.update(envelope(&settings, "123"));
    assert_eq!(selector.choose().unwrap().source, settings);

    // gate gone: the deferred orders envelope finally comes out
    assert_eq!(selector.choose().unwrap().source, orders);
    assert!(selector.choose().is_none());
}

/// Batching within a priority tier: a batch on the high-tier stream, a
/// fresh tier inspection that picks the same stream again, then the
/// lower tier drains.
#[tokio::test]
async fn batching_within_priority_tier() {
    let config = SelectorConfig::new()
        .with_batch_size(3)
        .with_priority(StreamId::new("kafka", "x"), 1)
        .with_priority(StreamId::new("kafka", "y"), 0);
    let mut selector = compose_selector(
        &config,
        &inputs(&["x", "y"]),
        &HashMap::new(),
        &FactoryRegistry::new(),
        None,
    )
    .await
    .unwrap();

    let x = ssp("x", 0);
    let y = ssp("y", 0);
    selector.register(x.clone(), None);
    selector.register(y.clone(), None);
    selector.start();

    for (source, offset) in [(&x, "1"), (&y, "1"), (&x, "2"), (&x, "3"), (&x, "4"), (&y, "2")] {
        selector.update(envelope(source, offset));
    }

    let picks: Vec<_> = std::iter::from_fn(|| selector.choose())
        .map(|e| (e.source.stream().to_string(), e.offset))
        .collect();
    assert_eq!(
        picks,
        vec![
            ("x".to_string(), "1".to_string()),
            ("x".to_string(), "2".to_string()),
            ("x".to_string(), "3".to_string()),
            ("x".to_string(), "4".to_string()),
            ("y".to_string(), "1".to_string()),
            ("y".to_string(), "2".to_string()),
        ]
    );
}

/// Total drain equals total updates across a full stack, with per
/// partition order intact.
#[tokio::test]
async fn full_stack_non_loss_non_duplication() {
    let config = SelectorConfig::new()
        .with_batch_size(2)
        .with_bootstrap(StreamId::new("kafka", "settings"))
        .with_priority(StreamId::new("kafka", "orders"), 1);
    let mut selector = compose_selector(
        &config,
        &inputs(&["settings", "orders", "logs"]),
        &admins_with(&[("settings", 0, "2")]),
        &FactoryRegistry::new(),
        None,
    )
    .await
    .unwrap();

    let settings = ssp("settings", 0);
    let orders = ssp("orders", 0);
    let logs = ssp("logs", 0);
    selector.register(settings.clone(), Some("0".to_string()));
    selector.register(orders.clone(), None);
    selector.register(logs.clone(), None);
    selector.start();

    // drive like a task loop: one outstanding envelope per partition,
    // feeding the next one as each pick is consumed
    let mut pending: HashMap<StreamPartition, Vec<IncomingEnvelope>> = HashMap::new();
    pending.insert(
        settings.clone(),
        (1..=2).rev().map(|i| envelope(&settings, &i.to_string())).collect(),
    );
    pending.insert(
        orders.clone(),
        (1..=4).rev().map(|i| envelope(&orders, &i.to_string())).collect(),
    );
    pending.insert(
        logs.clone(),
        (1..=4).rev().map(|i| envelope(&logs, &i.to_string())).collect(),
    );
    let total = 10;

    for queue in pending.values_mut() {
        if let Some(next) = queue.pop() {
            selector.update(next);
        }
    }

    let mut drained = Vec::new();
    while let Some(pick) = selector.choose() {
        if let Some(next) = pending.get_mut(&pick.source).and_then(Vec::pop) {
            selector.update(next);
        }
        drained.push(pick);
    }

    assert_eq!(drained.len(), total);
    assert!(pending.values().all(Vec::is_empty));

    for source in [&settings, &orders, &logs] {
        let returned: Vec<_> = drained
            .iter()
            .filter(|e| &e.source == source)
            .map(|e| e.offset.as_str())
            .collect();
        let expected: Vec<String> = (1..=returned.len()).map(|i| i.to_string()).collect();
        assert_eq!(returned, expected, "order for {source}");
    }
}
