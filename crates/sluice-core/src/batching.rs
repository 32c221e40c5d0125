//! Batching layer: affinity to the last-chosen partition.
//!
//! Once an envelope from partition P is picked, subsequent picks stay on
//! P until `batch_size` envelopes have been drawn or P runs dry, only
//! then is the inner selector consulted again. Batching amortizes
//! per-partition switching costs (cache locality, state-store handles)
//! without starving other partitions.

use crate::envelope::IncomingEnvelope;
use crate::error::{Error, Result};
use crate::metrics::SelectorMetrics;
use crate::selector::MessageSelector;
use crate::stream::StreamPartition;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Wraps an inner selector with batch affinity to the last-chosen
/// partition.
///
/// Every update is mirrored into a per-partition buffer and forwarded to
/// the inner selector. While a batch is open, `choose` drains the batch
/// partition's buffer directly; a per-partition skip count discards the
/// same envelopes when the inner selector later surfaces them. The
/// mirror keeps per-partition delivery order intact no matter how
/// updates and chooses interleave.
pub struct BatchingSelector {
    inner: Box<dyn MessageSelector>,
    batch_size: usize,
    buffers: HashMap<StreamPartition, VecDeque<IncomingEnvelope>>,
    skip: HashMap<StreamPartition, usize>,
    current: Option<StreamPartition>,
    drawn: usize,
    metrics: Option<SelectorMetrics>,
}

impl BatchingSelector {
    /// Create a batching layer over `inner`. `batch_size` must be at
    /// least 1.
    pub fn new(inner: Box<dyn MessageSelector>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig(
                "batch size must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            inner,
            batch_size,
            buffers: HashMap::new(),
            skip: HashMap::new(),
            current: None,
            drawn: 0,
            metrics: None,
        })
    }

    /// Attach a metrics handle
    pub fn with_metrics(mut self, metrics: SelectorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn close_batch(&mut self) {
        if let Some(current) = self.current.take() {
            debug!(source = %current, drawn = self.drawn, "closing batch");
        }
        self.drawn = 0;
    }
}

impl MessageSelector for BatchingSelector {
    fn register(&mut self, source: StreamPartition, last_read_offset: Option<String>) {
        self.inner.register(source, last_read_offset);
    }

    fn update(&mut self, envelope: IncomingEnvelope) {
        self.buffers
            .entry(envelope.source.clone())
            .or_default()
            .push_back(envelope.clone());
        self.inner.update(envelope);
    }

    fn choose(&mut self) -> Option<IncomingEnvelope> {
        if let Some(current) = self.current.clone() {
            if self.drawn < self.batch_size {
                if let Some(envelope) = self.buffers.get_mut(&current).and_then(VecDeque::pop_front)
                {
                    *self.skip.entry(current).or_insert(0) += 1;
                    self.drawn += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.record_choice("batching");
                    }
                    return Some(envelope);
                }
            }
            // batch reached its size or the partition ran dry
            self.close_batch();
        }

        loop {
            let envelope = self.inner.choose()?;
            let source = envelope.source.clone();

            // envelopes already returned from the batch buffer come back
            // out of the inner selector later; discard those ghosts here
            if let Some(remaining) = self.skip.get_mut(&source) {
                if *remaining > 0 {
                    *remaining -= 1;
                    if *remaining == 0 {
                        self.skip.remove(&source);
                    }
                    continue;
                }
            }

            // authoritative pick: keep the mirror in step
            if let Some(buffer) = self.buffers.get_mut(&source) {
                buffer.pop_front();
            }
            debug!(source = %source, "opening batch");
            self.current = Some(source);
            self.drawn = 1;
            if let Some(metrics) = &self.metrics {
                metrics.record_batch_opened();
                metrics.record_choice("batching");
            }
            return Some(envelope);
        }
    }

    fn start(&mut self) {
        self.inner.start();
    }

    fn stop(&mut self) {
        self.buffers.clear();
        self.skip.clear();
        self.current = None;
        self.drawn = 0;
        self.inner.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::test_support::{envelope, feed, partition};
    use crate::selector::RoundRobinSelector;

    fn batching(batch_size: usize) -> BatchingSelector {
        BatchingSelector::new(Box::new(RoundRobinSelector::new()), batch_size).unwrap()
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        assert!(BatchingSelector::new(Box::new(RoundRobinSelector::new()), 0).is_err());
    }

    #[test]
    fn test_batch_affinity() {
        let a = partition("kafka", "orders", 0);
        let b = partition("kafka", "events", 0);

        let mut selector = batching(2);
        selector.register(a.clone(), None);
        selector.register(b.clone(), None);

        feed(
            &mut selector,
            &[
                envelope(&a, "1"),
                envelope(&b, "1"),
                envelope(&a, "2"),
                envelope(&a, "3"),
                envelope(&b, "2"),
            ],
        );

        // a batch of 2 on `a`, then `b` gets its turn
        let picks: Vec<_> = std::iter::from_fn(|| selector.choose())
            .map(|e| (e.source.clone(), e.offset))
            .collect();
        assert_eq!(
            picks,
            vec![
                (a.clone(), "1".to_string()),
                (a.clone(), "2".to_string()),
                (b.clone(), "1".to_string()),
                (b.clone(), "2".to_string()),
                (a.clone(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_max_run_length_bounded() {
        let a = partition("kafka", "orders", 0);
        let b = partition("kafka", "events", 0);
        let batch_size = 3;

        let mut selector = batching(batch_size);
        selector.register(a.clone(), None);
        selector.register(b.clone(), None);

        let mut envelopes = Vec::new();
        for i in 0..8 {
            envelopes.push(envelope(&a, &i.to_string()));
            envelopes.push(envelope(&b, &i.to_string()));
        }
        feed(&mut selector, &envelopes);

        let picks: Vec<_> = std::iter::from_fn(|| selector.choose()).collect();
        assert_eq!(picks.len(), 16);

        // with both partitions pending throughout, no run exceeds the
        // batch size
        let mut run = 0;
        let mut last: Option<&StreamPartition> = None;
        for pick in &picks {
            if last == Some(&pick.source) {
                run += 1;
            } else {
                run = 1;
                last = Some(&pick.source);
            }
            assert!(run <= batch_size, "run of {run} on {}", pick.source);
        }
    }

    #[test]
    fn test_sole_partition_exceeds_batch_size() {
        let a = partition("kafka", "orders", 0);

        let mut selector = batching(2);
        selector.register(a.clone(), None);

        for i in 0..5 {
            selector.update(envelope(&a, &i.to_string()));
        }

        // the only non-empty partition keeps getting picked across batches
        let offsets: Vec<_> = std::iter::from_fn(|| selector.choose())
            .map(|e| e.offset)
            .collect();
        assert_eq!(offsets, ["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_order_preserved_under_interleaving() {
        let a = partition("kafka", "orders", 0);
        let b = partition("kafka", "events", 0);

        let mut selector = batching(3);
        selector.register(a.clone(), None);
        selector.register(b.clone(), None);

        // two `a` envelopes sit in the inner selector before `a` becomes
        // the batch partition; later arrivals must not overtake them
        selector.update(envelope(&a, "1"));
        selector.update(envelope(&a, "2"));
        selector.update(envelope(&b, "1"));

        assert_eq!(selector.choose().unwrap().offset, "1"); // opens batch on a
        selector.update(envelope(&a, "3"));
        assert_eq!(selector.choose().unwrap().offset, "2");
        assert_eq!(selector.choose().unwrap().offset, "3");

        let next = selector.choose().unwrap();
        assert_eq!((next.source, next.offset), (b, "1".to_string()));
        assert!(selector.choose().is_none());
    }

    #[test]
    fn test_drain_equals_updates() {
        let a = partition("kafka", "orders", 0);
        let b = partition("kafka", "events", 1);

        let mut selector = batching(2);
        selector.register(a.clone(), None);
        selector.register(b.clone(), None);

        let mut envelopes = Vec::new();
        for i in 0..7 {
            let source = if i % 3 == 0 { &b } else { &a };
            envelopes.push(envelope(source, &i.to_string()));
        }
        feed(&mut selector, &envelopes);

        let drained: Vec<_> = std::iter::from_fn(|| selector.choose()).collect();
        assert_eq!(drained.len(), envelopes.len());

        // per-partition subsequences match update order exactly
        for source in [&a, &b] {
            let updated: Vec<_> = envelopes
                .iter()
                .filter(|e| &e.source == source)
                .map(|e| e.offset.clone())
                .collect();
            let returned: Vec<_> = drained
                .iter()
                .filter(|e| &e.source == source)
                .map(|e| e.offset.clone())
                .collect();
            assert_eq!(updated, returned);
        }
    }
}
