use serde::Serialize;

/// Totals for one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub name: String,
    pub total: u64,
    pub failed: u64,
}

/// Latency distribution in milliseconds. All stats are `None` until at
/// least one sample has been recorded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub mean_ms: Option<f64>,
    pub stdev_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p75_ms: Option<f64>,
    pub p90_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

/// Point-in-time view of the run's aggregate. Serializable; formatting and
/// export belong to the caller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub iterations_total: u64,
    pub success_total: u64,
    pub check_failures_total: u64,
    pub transport_errors_total: u64,
    /// Sorted by check name.
    pub checks_by_name: Vec<CheckSummary>,
    pub active_vus: u64,
    pub peak_vus: u64,
    pub run_duration_ms: u64,
    pub latency: LatencySummary,
}
