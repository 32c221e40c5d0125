//! Priority tiers: higher-tier streams always win.
//!
//! Streams map to integer tiers; each tier owns its own tie-breaker
//! selector. `choose` scans tiers from the highest down and returns the
//! first pick, so an envelope from a lower tier is only ever returned
//! when every higher tier is empty.

use crate::envelope::IncomingEnvelope;
use crate::error::{Error, Result};
use crate::metrics::SelectorMetrics;
use crate::selector::MessageSelector;
use crate::stream::{StreamId, StreamPartition};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Routes envelopes into priority tiers, each with its own inner
/// selector; streams absent from the priority map fall through to the
/// default selector, which is consulted after every tier.
pub struct TieredPrioritySelector {
    priorities: HashMap<StreamId, i32>,
    tiers: BTreeMap<i32, Box<dyn MessageSelector>>,
    default: Box<dyn MessageSelector>,
    metrics: Option<SelectorMetrics>,
}

impl TieredPrioritySelector {
    /// Create a tiered selector. Every tier referenced by `priorities`
    /// must have a selector in `tiers`.
    pub fn new(
        priorities: HashMap<StreamId, i32>,
        tiers: BTreeMap<i32, Box<dyn MessageSelector>>,
        default: Box<dyn MessageSelector>,
    ) -> Result<Self> {
        for (stream, tier) in &priorities {
            if !tiers.contains_key(tier) {
                return Err(Error::InvalidConfig(format!(
                    "stream {stream} is assigned to tier {tier}, which has no selector"
                )));
            }
        }
        debug!(
            tiers = tiers.len(),
            streams = priorities.len(),
            "created tiered priority selector"
        );
        Ok(Self {
            priorities,
            tiers,
            default,
            metrics: None,
        })
    }

    /// Attach a metrics handle
    pub fn with_metrics(mut self, metrics: SelectorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn selector_for(&mut self, stream: &StreamId) -> &mut Box<dyn MessageSelector> {
        match self.priorities.get(stream) {
            // tier presence was validated at construction
            Some(tier) => self.tiers.get_mut(tier).unwrap_or(&mut self.default),
            None => &mut self.default,
        }
    }
}

impl MessageSelector for TieredPrioritySelector {
    fn register(&mut self, source: StreamPartition, last_read_offset: Option<String>) {
        self.selector_for(&source.stream_id)
            .register(source, last_read_offset);
    }

    fn update(&mut self, envelope: IncomingEnvelope) {
        self.selector_for(&envelope.source.stream_id).update(envelope);
    }

    fn choose(&mut self) -> Option<IncomingEnvelope> {
        for (_, selector) in self.tiers.iter_mut().rev() {
            if let Some(envelope) = selector.choose() {
                if let Some(metrics) = &self.metrics {
                    metrics.record_choice("priority");
                }
                return Some(envelope);
            }
        }
        let envelope = self.default.choose();
        if envelope.is_some() {
            if let Some(metrics) = &self.metrics {
                metrics.record_choice("priority");
            }
        }
        envelope
    }

    fn start(&mut self) {
        for selector in self.tiers.values_mut() {
            selector.start();
        }
        self.default.start();
    }

    fn stop(&mut self) {
        for selector in self.tiers.values_mut() {
            selector.stop();
        }
        self.default.stop();
    }
}
