//! Bootstrap gate: catch designated partitions up before making progress.
//!
//! A bootstrap stream's historical contents must be consumed up to a
//! target offset (captured at composition time) before the task may run
//! freely on other streams. Until every lagging partition has fed the
//! inner selector at least one envelope since the last pick, `choose`
//! returns `None`; otherwise a fast non-bootstrap stream could starve
//! the catch-up.

use crate::envelope::IncomingEnvelope;
use crate::metrics::SelectorMetrics;
use crate::selector::MessageSelector;
use crate::stream::StreamPartition;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Gates an inner selector until every bootstrap partition has reached
/// its target offset.
///
/// Envelopes flow into the inner selector unconditionally; only `choose`
/// is gated. Once the last partition catches up the gate disappears and
/// this layer is indistinguishable from its inner selector.
pub struct BootstrappingSelector {
    inner: Box<dyn MessageSelector>,
    targets: HashMap<StreamPartition, String>,
    lagging: HashSet<StreamPartition>,
    updated_since_choose: HashSet<StreamPartition>,
    metrics: Option<SelectorMetrics>,
}

impl BootstrappingSelector {
    /// Create a gate over `inner` holding the given partitions until
    /// their target offsets are observed.
    pub fn new(inner: Box<dyn MessageSelector>, targets: HashMap<StreamPartition, String>) -> Self {
        let lagging = targets.keys().cloned().collect();
        Self {
            inner,
            targets,
            lagging,
            updated_since_choose: HashSet::new(),
            metrics: None,
        }
    }

    /// Attach a metrics handle
    pub fn with_metrics(mut self, metrics: SelectorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Partitions still behind their bootstrap target.
    pub fn lagging(&self) -> &HashSet<StreamPartition> {
        &self.lagging
    }

    /// Targets are captured heads: a partition written to after capture
    /// may never produce the exact target offset again, so catching up is
    /// monotonic where offsets are numeric. Opaque offsets fall back to
    /// exact equality.
    fn meets_target(observed: &str, target: &str) -> bool {
        match (observed.parse::<u64>(), target.parse::<u64>()) {
            (Ok(observed), Ok(target)) => observed >= target,
            _ => observed == target,
        }
    }

    fn retire(&mut self, source: &StreamPartition) {
        self.lagging.remove(source);
        self.updated_since_choose.remove(source);
        debug!(source = %source, remaining = self.lagging.len(), "partition caught up");
        if let Some(metrics) = &self.metrics {
            metrics.set_lagging_partitions(self.lagging.len());
        }
    }
}

impl MessageSelector for BootstrappingSelector {
    fn register(&mut self, source: StreamPartition, last_read_offset: Option<String>) {
        if let Some(target) = self.targets.get(&source) {
            let caught_up = last_read_offset
                .as_deref()
                .is_some_and(|offset| Self::meets_target(offset, target));
            if caught_up {
                self.retire(&source);
            }
        }
        self.inner.register(source, last_read_offset);
    }

    fn update(&mut self, envelope: IncomingEnvelope) {
        if !self.lagging.is_empty() {
            self.updated_since_choose.insert(envelope.source.clone());
        }
        self.inner.update(envelope);
    }

    fn choose(&mut self) -> Option<IncomingEnvelope> {
        if !self.lagging.is_empty() {
            // every lagging partition must have fed the inner selector
            // since the last pick, or the pick could unfairly skip a
            // bootstrap stream that simply has not been polled yet
            let starved = self
                .lagging
                .iter()
                .any(|source| !self.updated_since_choose.contains(source));
            if starved {
                if let Some(metrics) = &self.metrics {
                    metrics.record_gate_blocked();
                }
                return None;
            }
        }

        let envelope = self.inner.choose()?;
        let source = envelope.source.clone();
        // re-arm the gate for this partition
        self.updated_since_choose.remove(&source);

        if self.lagging.contains(&source) {
            if let Some(target) = self.targets.get(&source) {
                if Self::meets_target(&envelope.offset, target) {
                    self.retire(&source);
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_choice("bootstrap");
        }
        Some(envelope)
    }

    fn start(&mut self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_lagging_partitions(self.lagging.len());
        }
        self.inner.start();
    }

    fn stop(&mut self) {
        self.updated_since_choose.clear();
        self.inner.stop();
    }
}
