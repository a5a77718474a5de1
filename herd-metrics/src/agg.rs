use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::result::{IterationOutcome, IterationResult};
use crate::summary::{CheckSummary, LatencySummary, Summary};

/// Calling into the aggregator after it has been finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MisuseError {
    #[error("record called after finalize")]
    RecordAfterFinalize,

    #[error("finalize called more than once")]
    AlreadyFinalized,
}

#[derive(Debug, Default)]
struct CheckCounters {
    total: AtomicU64,
    failed: AtomicU64,
}

fn new_latency_hist() -> Histogram<u64> {
    // Track up to 60s in microseconds (with 3 sigfigs).
    match Histogram::<u64>::new_with_bounds(1, 60_000_000, 3) {
        Ok(h) => h,
        Err(err) => panic!("failed to init histogram: {err}"),
    }
}

/// Folds [`IterationResult`]s into a running [`Summary`].
///
/// `record` is safe under concurrent calls from every live VU: counters are
/// atomics and the latency histogram sits behind a short mutex-held insert.
/// `snapshot` can be read at any time during the run; `finalize` is valid
/// exactly once, after which further calls are a reported misuse.
#[derive(Debug)]
pub struct Aggregator {
    iterations_total: AtomicU64,
    success_total: AtomicU64,
    check_failures_total: AtomicU64,
    transport_errors_total: AtomicU64,
    checks_by_name: Mutex<HashMap<Arc<str>, Arc<CheckCounters>>>,
    latency_us: Mutex<Histogram<u64>>,
    active_vus: AtomicI64,
    peak_vus: AtomicI64,
    started: OnceLock<Instant>,
    finalized: AtomicBool,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            iterations_total: AtomicU64::new(0),
            success_total: AtomicU64::new(0),
            check_failures_total: AtomicU64::new(0),
            transport_errors_total: AtomicU64::new(0),
            checks_by_name: Mutex::new(HashMap::new()),
            latency_us: Mutex::new(new_latency_hist()),
            active_vus: AtomicI64::new(0),
            peak_vus: AtomicI64::new(0),
            started: OnceLock::new(),
            finalized: AtomicBool::new(false),
        }
    }
}

impl Aggregator {
    /// Pin the run clock. First call wins; later calls are ignored.
    pub fn start(&self, at: Instant) {
        let _ = self.started.set(at);
    }

    pub fn elapsed(&self) -> Duration {
        self.started.get().map(Instant::elapsed).unwrap_or_default()
    }

    pub fn iterations_total(&self) -> u64 {
        self.iterations_total.load(Ordering::Relaxed)
    }

    pub fn active_vus(&self) -> u64 {
        self.active_vus.load(Ordering::Relaxed).max(0) as u64
    }

    /// A worker became active.
    pub fn vu_started(&self) {
        let new_active = self.active_vus.fetch_add(1, Ordering::Relaxed).saturating_add(1);

        // CAS loop to keep the max without races.
        let mut cur = self.peak_vus.load(Ordering::Relaxed);
        while new_active > cur {
            match self.peak_vus.compare_exchange_weak(
                cur,
                new_active,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
    }

    /// A worker was stop-marked; it no longer counts as active even while it
    /// finishes an in-flight iteration.
    pub fn vu_stopped(&self) {
        self.active_vus.fetch_sub(1, Ordering::Relaxed);
    }

    /// Fold one iteration into the aggregate.
    pub fn record(&self, result: &IterationResult) -> Result<(), MisuseError> {
        if self.finalized.load(Ordering::Acquire) {
            return Err(MisuseError::RecordAfterFinalize);
        }

        self.iterations_total.fetch_add(1, Ordering::Relaxed);
        match result.outcome {
            IterationOutcome::Success => {
                self.success_total.fetch_add(1, Ordering::Relaxed);
            }
            IterationOutcome::CheckFailure => {
                self.check_failures_total.fetch_add(1, Ordering::Relaxed);
            }
            IterationOutcome::TransportError => {
                self.transport_errors_total.fetch_add(1, Ordering::Relaxed);
            }
        }

        for check in &result.checks {
            let counters = self.check_counters(&check.name);
            counters.total.fetch_add(1, Ordering::Relaxed);
            if !check.passed {
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.record_latency(result.duration);
        Ok(())
    }

    fn check_counters(&self, name: &Arc<str>) -> Arc<CheckCounters> {
        let mut map = self.checks_by_name.lock();
        if let Some(v) = map.get(name) {
            v.clone()
        } else {
            let v = Arc::new(CheckCounters::default());
            map.insert(name.clone(), v.clone());
            v
        }
    }

    fn record_latency(&self, elapsed: Duration) {
        let us = elapsed.as_micros();
        if us == 0 {
            return;
        }

        let mut h = self.latency_us.lock();
        let _ = h.record(us as u64);
    }

    /// Consistent point-in-time copy of the aggregate.
    pub fn snapshot(&self) -> Summary {
        let checks_by_name = {
            let map = self.checks_by_name.lock();
            let mut out: Vec<CheckSummary> = map
                .iter()
                .map(|(name, counters)| CheckSummary {
                    name: name.to_string(),
                    total: counters.total.load(Ordering::Relaxed),
                    failed: counters.failed.load(Ordering::Relaxed),
                })
                .collect();
            out.sort_by(|a, b| a.name.cmp(&b.name));
            out
        };

        let latency = {
            let h = self.latency_us.lock();
            summarize_latency(&h)
        };

        Summary {
            iterations_total: self.iterations_total.load(Ordering::Relaxed),
            success_total: self.success_total.load(Ordering::Relaxed),
            check_failures_total: self.check_failures_total.load(Ordering::Relaxed),
            transport_errors_total: self.transport_errors_total.load(Ordering::Relaxed),
            checks_by_name,
            active_vus: self.active_vus(),
            peak_vus: self.peak_vus.load(Ordering::Relaxed).max(0) as u64,
            run_duration_ms: self.elapsed().as_millis() as u64,
            latency,
        }
    }

    /// Close the aggregate. Valid exactly once, after every worker has
    /// exited; the second call reports [`MisuseError::AlreadyFinalized`].
    pub fn finalize(&self) -> Result<Summary, MisuseError> {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return Err(MisuseError::AlreadyFinalized);
        }
        Ok(self.snapshot())
    }
}

fn summarize_latency(h: &Histogram<u64>) -> LatencySummary {
    let count = h.len();
    let to_ms = |v: u64| v as f64 / 1000.0;

    LatencySummary {
        count,
        min_ms: (count > 0).then(|| to_ms(h.min())),
        max_ms: (count > 0).then(|| to_ms(h.max())),
        mean_ms: (count > 0).then(|| h.mean() / 1000.0),
        stdev_ms: (count > 0).then(|| h.stdev() / 1000.0),
        p50_ms: (count > 0).then(|| to_ms(h.value_at_quantile(0.50))),
        p75_ms: (count > 0).then(|| to_ms(h.value_at_quantile(0.75))),
        p90_ms: (count > 0).then(|| to_ms(h.value_at_quantile(0.90))),
        p95_ms: (count > 0).then(|| to_ms(h.value_at_quantile(0.95))),
        p99_ms: (count > 0).then(|| to_ms(h.value_at_quantile(0.99))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::CheckSample;

    fn result_with(outcome: IterationOutcome) -> IterationResult {
        IterationResult {
            vu_id: 1,
            generation: 1,
            iteration: 1,
            started_at: Duration::ZERO,
            duration: Duration::from_millis(12),
            outcome,
            detail: None,
            checks: Vec::new(),
        }
    }

    #[test]
    fn record_counts_by_outcome() {
        let agg = Aggregator::default();
        for _ in 0..3 {
            agg.record(&result_with(IterationOutcome::Success))
                .unwrap_or_else(|e| panic!("record failed: {e}"));
        }
        agg.record(&result_with(IterationOutcome::CheckFailure))
            .unwrap_or_else(|e| panic!("record failed: {e}"));
        agg.record(&result_with(IterationOutcome::TransportError))
            .unwrap_or_else(|e| panic!("record failed: {e}"));

        let s = agg.snapshot();
        assert_eq!(s.iterations_total, 5);
        assert_eq!(s.success_total, 3);
        assert_eq!(s.check_failures_total, 1);
        assert_eq!(s.transport_errors_total, 1);
        assert_eq!(s.latency.count, 5);
    }

    #[test]
    fn check_samples_fold_into_named_counters() {
        let agg = Aggregator::default();
        let name: Arc<str> = Arc::from("status is 200 or 201");

        let mut r = result_with(IterationOutcome::CheckFailure);
        r.checks = vec![CheckSample {
            name: name.clone(),
            passed: false,
        }];
        agg.record(&r).unwrap_or_else(|e| panic!("record failed: {e}"));

        let mut r = result_with(IterationOutcome::Success);
        r.checks = vec![CheckSample { name, passed: true }];
        agg.record(&r).unwrap_or_else(|e| panic!("record failed: {e}"));

        let s = agg.snapshot();
        assert_eq!(s.checks_by_name.len(), 1);
        assert_eq!(s.checks_by_name[0].name, "status is 200 or 201");
        assert_eq!(s.checks_by_name[0].total, 2);
        assert_eq!(s.checks_by_name[0].failed, 1);
    }

    #[test]
    fn finalize_twice_is_a_reported_misuse() {
        let agg = Aggregator::default();
        let first = agg.finalize();
        assert!(first.is_ok());
        assert!(matches!(agg.finalize(), Err(MisuseError::AlreadyFinalized)));
    }

    #[test]
    fn record_after_finalize_is_a_reported_misuse() {
        let agg = Aggregator::default();
        agg.finalize().unwrap_or_else(|e| panic!("finalize failed: {e}"));
        assert_eq!(
            agg.record(&result_with(IterationOutcome::Success)),
            Err(MisuseError::RecordAfterFinalize)
        );
    }

    #[test]
    fn empty_latency_has_no_stats() {
        let s = Aggregator::default().snapshot();
        assert_eq!(s.latency.count, 0);
        assert!(s.latency.p50_ms.is_none());
        assert!(s.latency.max_ms.is_none());
        assert!(s.latency.mean_ms.is_none());
    }

    #[test]
    fn vu_gauge_tracks_active_and_peak() {
        let agg = Aggregator::default();
        agg.vu_started();
        agg.vu_started();
        agg.vu_started();
        agg.vu_stopped();

        let s = agg.snapshot();
        assert_eq!(s.active_vus, 2);
        assert_eq!(s.peak_vus, 3);
    }
}
