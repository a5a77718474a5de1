use std::sync::Arc;
use std::time::Instant;

use herd_metrics::Aggregator;

use crate::signal::StopSignal;

/// Everything one worker task needs. Built by the pool's spawner, one per
/// (id, generation).
#[derive(Debug, Clone)]
pub struct VuContext {
    pub vu_id: u64,
    /// Bumped each time this id is reused for a fresh worker, so a retired
    /// worker's last in-flight iteration stays distinguishable from its
    /// successor's.
    pub generation: u64,

    /// Raised by the pool to retire this worker after its in-flight
    /// iteration.
    pub stop: Arc<StopSignal>,
    /// Raised once for the whole run: schedule completion, manual abort, or
    /// run timeout.
    pub global_stop: Arc<StopSignal>,

    pub run_started: Instant,
    pub stats: Arc<Aggregator>,
}

impl VuContext {
    pub fn stop_requested(&self) -> bool {
        self.stop.is_raised() || self.global_stop.is_raised()
    }
}
