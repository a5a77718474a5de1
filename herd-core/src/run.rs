use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use herd_metrics::{Aggregator, Summary};
use tokio::time::MissedTickBehavior;

use crate::config::DriverOptions;
use crate::error::{Error, Result};
use crate::iteration::IterationRunner;
use crate::pool::VuPool;
use crate::schedule::RampSchedule;
use crate::signal::StopSignal;
use crate::vu::VuContext;
use crate::workload::{Check, TransportFailure, WorkloadCall, WorkloadResult};

/// Clonable handle that stops a running driver from outside.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    stop: Arc<StopSignal>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.stop.raise();
    }
}

/// Staged virtual-user load driver.
///
/// Ticks the stage schedule, reconciles the worker pool toward the current
/// target, and folds every iteration into the shared aggregate. `run`
/// returns only after every worker has exited and the aggregate has been
/// finalized.
pub struct LoadDriver<W> {
    options: DriverOptions,
    schedule: RampSchedule,
    runner: Arc<IterationRunner<W>>,
    stats: Arc<Aggregator>,
    global_stop: Arc<StopSignal>,
}

impl<W, Fut> LoadDriver<W>
where
    W: Fn(WorkloadCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<WorkloadResult, TransportFailure>> + Send + 'static,
{
    /// Validates the options and builds the driver. Configuration errors
    /// surface here, before any worker starts.
    pub fn new(options: DriverOptions, workload: W, checks: Vec<Check>) -> Result<Self> {
        if options.tick.is_zero() {
            return Err(Error::InvalidTick);
        }
        if options.run_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::InvalidRunTimeout);
        }

        let schedule = RampSchedule::new(options.stages.clone());
        let runner = Arc::new(IterationRunner::new(workload, checks, options.think_time));

        Ok(Self {
            options,
            schedule,
            runner,
            stats: Arc::new(Aggregator::default()),
            global_stop: Arc::new(StopSignal::new()),
        })
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            stop: self.global_stop.clone(),
        }
    }

    /// Shared aggregate; clone before `run` for live snapshots.
    pub fn stats(&self) -> Arc<Aggregator> {
        self.stats.clone()
    }

    /// Drive the schedule to completion (or abort/timeout), retire every
    /// worker, and finalize the aggregate.
    pub async fn run(self) -> Result<Summary> {
        let started = Instant::now();
        self.stats.start(started);
        let hard_deadline = self.options.run_timeout.map(|t| started + t);

        tracing::info!(
            stages = self.schedule.stages().len(),
            total = ?self.schedule.total_duration(),
            "run starting"
        );

        let runner = self.runner.clone();
        let stats = self.stats.clone();
        let global_stop = self.global_stop.clone();
        let mut pool = VuPool::new(
            move |vu_id, generation, stop| {
                let runner = runner.clone();
                let ctx = VuContext {
                    vu_id,
                    generation,
                    stop,
                    global_stop: global_stop.clone(),
                    run_started: started,
                    stats: stats.clone(),
                };
                tokio::spawn(async move { runner.drive(ctx).await })
            },
            self.stats.clone(),
        );

        let mut interval = tokio::time::interval(self.options.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_target = 0u64;
        let mut timed_out = false;
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.global_stop.wait() => break,
            }
            // The abort flag may have been raised between the flag check
            // inside `wait` and its wakeup registration; the tick arm wins
            // that race, so re-check here.
            if self.global_stop.is_raised() {
                break;
            }

            let elapsed = started.elapsed();
            if self.schedule.is_done(elapsed) {
                break;
            }
            if hard_deadline.is_some_and(|d| Instant::now() >= d) {
                timed_out = true;
                break;
            }

            let target = self.schedule.target_at(elapsed);
            if target != last_target {
                tracing::debug!(
                    vus = target,
                    stage = ?self.schedule.stage_index_at(elapsed),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "target changed"
                );
                last_target = target;
            }
            pool.reconcile(target);
        }

        self.global_stop.raise();
        pool.shutdown(hard_deadline).await?;

        let summary = self.stats.finalize()?;
        tracing::info!(
            iterations = summary.iterations_total,
            timed_out,
            "run complete"
        );
        Ok(summary)
    }
}
