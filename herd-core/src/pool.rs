use std::sync::Arc;
use std::time::Instant;

use herd_metrics::Aggregator;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::signal::StopSignal;

struct LiveVu {
    stop: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

struct Seat {
    generation: u64,
    live: Option<LiveVu>,
}

/// Owns the live worker set and reconciles it toward the schedule's target.
///
/// Ids are dense: the active workers always occupy `1..=active_count()`.
/// Scaling up fills the lowest free ids, bumping each seat's generation;
/// scaling down retires the most-recently-started workers first. Retiring
/// is cooperative: a stop-marked worker finishes its in-flight iteration
/// and exits, it is never killed mid-iteration (a workload that hangs is
/// therefore never reclaimed here).
///
/// Convergence lag is bounded by one reconciler tick: a target change is
/// applied in full on the tick that observes it.
pub struct VuPool<S> {
    seats: Vec<Seat>,
    active: u64,
    draining: Vec<JoinHandle<()>>,
    spawn: S,
    stats: Arc<Aggregator>,
}

impl<S> VuPool<S>
where
    S: Fn(u64, u64, Arc<StopSignal>) -> JoinHandle<()>,
{
    pub fn new(spawn: S, stats: Arc<Aggregator>) -> Self {
        Self {
            seats: Vec::new(),
            active: 0,
            draining: Vec::new(),
            spawn,
            stats,
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active
    }

    /// Converge the live worker count toward `target`.
    pub fn reconcile(&mut self, target: u64) {
        self.draining.retain(|h| !h.is_finished());

        while self.active < target {
            let id = self.active + 1;
            let idx = (id - 1) as usize;
            if self.seats.len() <= idx {
                self.seats.push(Seat {
                    generation: 0,
                    live: None,
                });
            }

            let seat = &mut self.seats[idx];
            // The seat's previous occupant may still be finishing its last
            // iteration; the generation keeps the two apart.
            if let Some(old) = seat.live.take() {
                self.draining.push(old.handle);
            }
            seat.generation += 1;

            let stop = Arc::new(StopSignal::new());
            let handle = (self.spawn)(id, seat.generation, stop.clone());
            seat.live = Some(LiveVu { stop, handle });

            self.stats.vu_started();
            tracing::debug!(vu_id = id, generation = seat.generation, "vu started");
            self.active += 1;
        }

        while self.active > target {
            let id = self.active;
            let seat = &mut self.seats[(id - 1) as usize];
            if let Some(live) = seat.live.take() {
                live.stop.raise();
                self.draining.push(live.handle);
                self.stats.vu_stopped();
                tracing::debug!(vu_id = id, "vu stop requested");
            }
            self.active -= 1;
        }
    }

    /// Retire every worker. Idempotent.
    pub fn stop_all(&mut self) {
        self.reconcile(0);
    }

    /// Wait for every worker to exit. Past `hard_deadline`, still-running
    /// tasks are aborted instead of awaited to completion.
    pub async fn shutdown(mut self, hard_deadline: Option<Instant>) -> Result<()> {
        self.stop_all();

        for mut handle in std::mem::take(&mut self.draining) {
            let joined = match hard_deadline {
                Some(deadline) => {
                    let deadline = tokio::time::Instant::from_std(deadline);
                    match tokio::time::timeout_at(deadline, &mut handle).await {
                        Ok(res) => res,
                        Err(_) => {
                            handle.abort();
                            handle.await
                        }
                    }
                }
                None => handle.await,
            };

            match joined {
                Ok(()) => {}
                // Aborted past the hard deadline.
                Err(err) if err.is_cancelled() => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }
}
