use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use herd_metrics::{CheckSample, IterationOutcome, IterationResult};

use crate::vu::VuContext;
use crate::workload::{Check, TransportFailure, WorkloadCall, WorkloadResult};

/// Invokes the user workload once per VU per loop, evaluates the check
/// list, and classifies the outcome.
pub struct IterationRunner<W> {
    workload: W,
    checks: Arc<[Check]>,
    think_time: Duration,
}

impl<W, Fut> IterationRunner<W>
where
    W: Fn(WorkloadCall) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<WorkloadResult, TransportFailure>> + Send,
{
    pub fn new(workload: W, checks: Vec<Check>, think_time: Duration) -> Self {
        Self {
            workload,
            checks: Arc::from(checks.into_boxed_slice()),
            think_time,
        }
    }

    /// One iteration: invoke the workload with the VU's identity and the
    /// iteration count, time it, and classify the result.
    pub async fn run_once(&self, ctx: &VuContext, iteration: u64) -> IterationResult {
        let call = WorkloadCall {
            vu_id: ctx.vu_id,
            generation: ctx.generation,
            iteration,
        };

        let started_at = ctx.run_started.elapsed();
        let started = Instant::now();

        let (outcome, detail, checks) = match (self.workload)(call).await {
            Ok(result) => {
                let samples: Vec<CheckSample> =
                    self.checks.iter().map(|c| c.sample(&result)).collect();
                let failed: Vec<&str> = samples
                    .iter()
                    .filter(|s| !s.passed)
                    .map(|s| s.name.as_ref())
                    .collect();

                if failed.is_empty() {
                    (IterationOutcome::Success, None, samples)
                } else {
                    (
                        IterationOutcome::CheckFailure,
                        Some(failed.join(", ")),
                        samples,
                    )
                }
            }
            Err(failure) => (
                IterationOutcome::TransportError,
                Some(failure.to_string()),
                Vec::new(),
            ),
        };

        IterationResult {
            vu_id: ctx.vu_id,
            generation: ctx.generation,
            iteration,
            started_at,
            duration: started.elapsed(),
            outcome,
            detail,
            checks,
        }
    }

    /// Worker loop. Iterations are strictly sequential within one VU; each
    /// result is recorded exactly once. The think-time pause races against
    /// the stop signals, so a stop-marked VU exits right after yielding its
    /// in-flight result instead of sleeping through the pause.
    pub(crate) async fn drive(&self, ctx: VuContext) {
        let mut iteration: u64 = 0;
        loop {
            if ctx.stop_requested() {
                break;
            }

            iteration += 1;
            let result = self.run_once(&ctx, iteration).await;

            if let Err(err) = ctx.stats.record(&result) {
                tracing::warn!(vu_id = ctx.vu_id, %err, "dropping iteration result");
                break;
            }

            if ctx.stop_requested() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.think_time) => {}
                _ = ctx.stop.wait() => break,
                _ = ctx.global_stop.wait() => break,
            }
        }
    }
}
