//! The selector contract and the round-robin baseline.
//!
//! A selector decides which of the deposited envelopes a task processes
//! next. Selectors compose by delegation: each policy layer holds an
//! inner selector and intercepts `update`/`choose`. All calls on one
//! stack come from a single task thread and must never block.

use crate::envelope::IncomingEnvelope;
use crate::metrics::SelectorMetrics;
use crate::stream::StreamPartition;
use std::collections::{HashSet, VecDeque};
use tracing::error;

/// Chooses the next envelope a task should process.
///
/// Contract:
/// - `register` is called once per input partition, before `start` and
///   before any `update` or `choose` referring to that partition.
/// - `update` deposits an envelope and must not block.
/// - `choose` removes and returns the next envelope, or `None` when the
///   selector currently has no acceptable pick. It only inspects state
///   and is safe to call when empty.
/// - Every deposited envelope is eventually returned exactly once, unless
///   the selector is stopped first; per-partition delivery order always
///   matches deposit order.
pub trait MessageSelector: Send {
    /// Declare that envelopes for `source` will be delivered, starting
    /// just after `last_read_offset` (`None` means the partition has
    /// nothing consumed yet).
    fn register(&mut self, source: StreamPartition, last_read_offset: Option<String>);

    /// Deposit an envelope for a registered partition.
    fn update(&mut self, envelope: IncomingEnvelope);

    /// Pick the next envelope, or `None` if there is no acceptable choice.
    fn choose(&mut self) -> Option<IncomingEnvelope>;

    /// Lifecycle hook, recursively invoked through the stack.
    fn start(&mut self) {}

    /// Terminal signal. Pending envelopes are discarded.
    fn stop(&mut self) {}
}

/// Baseline tie-breaker: envelopes come back in arrival order.
///
/// Ties between partitions are broken by which envelope arrived first,
/// which is exactly the fairness property the outer policy layers rely
/// on.
#[derive(Default)]
pub struct RoundRobinSelector {
    registered: HashSet<StreamPartition>,
    queue: VecDeque<IncomingEnvelope>,
    metrics: Option<SelectorMetrics>,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a metrics handle
    pub fn with_metrics(mut self, metrics: SelectorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl MessageSelector for RoundRobinSelector {
    fn register(&mut self, source: StreamPartition, _last_read_offset: Option<String>) {
        self.registered.insert(source);
    }

    fn update(&mut self, envelope: IncomingEnvelope) {
        if !self.registered.contains(&envelope.source) {
            error!(
                source = %envelope.source,
                offset = %envelope.offset,
                "dropping envelope for unregistered partition"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_update_dropped();
            }
            return;
        }
        self.queue.push_back(envelope);
    }

    fn choose(&mut self) -> Option<IncomingEnvelope> {
        let envelope = self.queue.pop_front();
        if envelope.is_some() {
            if let Some(metrics) = &self.metrics {
                metrics.record_choice("round-robin");
            }
        }
        envelope
    }

    fn stop(&mut self) {
        self.queue.clear();
    }
}
