//! Selector metrics over the `metrics` facade.
//!
//! All series follow the pattern `sluice_selector_{name}` and carry the
//! owning task as a label. The handle is created once per selector stack
//! and threaded through composition explicitly; there is no process-wide
//! registry.

use metrics::{counter, gauge};

/// Metrics handle for one selector stack.
#[derive(Debug, Clone)]
pub struct SelectorMetrics {
    task: String,
}

impl SelectorMetrics {
    /// Create a handle labelling every series with the owning task
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into() }
    }

    /// An envelope was returned by the named selector layer
    pub fn record_choice(&self, layer: &'static str) {
        counter!(
            "sluice_selector_envelopes_chosen_total",
            "task" => self.task.clone(),
            "layer" => layer
        )
        .increment(1);
    }

    /// A new batch was opened on some partition
    pub fn record_batch_opened(&self) {
        counter!("sluice_selector_batches_opened_total", "task" => self.task.clone()).increment(1);
    }

    /// A choose call was blocked by the bootstrap gate
    pub fn record_gate_blocked(&self) {
        counter!("sluice_selector_gate_blocked_total", "task" => self.task.clone()).increment(1);
    }

    /// Number of partitions still behind their bootstrap target
    pub fn set_lagging_partitions(&self, count: usize) {
        gauge!("sluice_selector_lagging_partitions", "task" => self.task.clone())
            .set(count as f64);
    }

    /// An update for an unregistered partition was dropped
    pub fn record_update_dropped(&self) {
        counter!("sluice_selector_updates_dropped_total", "task" => self.task.clone()).increment(1);
    }
}
