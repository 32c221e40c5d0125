//! Reader metrics over the `metrics` facade.

/// Coordinator stream reader metrics
pub struct CoordinatorMetrics;

impl CoordinatorMetrics {
    /// Records applied during a completed replay
    pub fn add_records_replayed(count: u64) {
        metrics::counter!("sluice_coordinator_records_replayed_total").increment(count);
    }

    /// A record of a type this reader does not handle was skipped
    pub fn increment_records_skipped() {
        metrics::counter!("sluice_coordinator_records_skipped_total").increment(1);
    }
}
