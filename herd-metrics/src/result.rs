use std::sync::Arc;
use std::time::Duration;

/// Classification of a single workload invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum IterationOutcome {
    /// The workload returned normally and every check passed.
    Success,
    /// The workload returned normally but at least one check failed.
    CheckFailure,
    /// The workload raised a transport failure before producing a result.
    TransportError,
}

/// Pass/fail of one named check for one iteration.
#[derive(Debug, Clone)]
pub struct CheckSample {
    pub name: Arc<str>,
    pub passed: bool,
}

/// One finished iteration. Consumed exactly once by [`Aggregator::record`]
/// and then discarded; only the folded aggregates are retained.
///
/// [`Aggregator::record`]: crate::Aggregator::record
#[derive(Debug, Clone)]
pub struct IterationResult {
    pub vu_id: u64,
    /// Bumped each time the VU's id is reused for a fresh worker.
    pub generation: u64,
    pub iteration: u64,
    /// Offset from run start at which the iteration began.
    pub started_at: Duration,
    pub duration: Duration,
    pub outcome: IterationOutcome,
    /// Failed check names for a check failure, or the transport failure
    /// description.
    pub detail: Option<String>,
    pub checks: Vec<CheckSample>,
}
