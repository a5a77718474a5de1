use std::time::Duration;

/// One ramp or plateau segment of the concurrency schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    /// Concurrency the schedule ramps to over `duration`.
    pub target: u64,
}

impl Stage {
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

/// Driver configuration, passed explicitly to [`LoadDriver::new`]. There is
/// no process-wide options state.
///
/// [`LoadDriver::new`]: crate::LoadDriver::new
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub stages: Vec<Stage>,

    /// Reconciler tick. The pool converges to a changed target within one
    /// tick interval.
    pub tick: Duration,

    /// Pause between a VU's iterations.
    pub think_time: Duration,

    /// Hard deadline for the whole run. Once it passes, in-flight
    /// iterations are aborted instead of awaited.
    pub run_timeout: Option<Duration>,
}

impl DriverOptions {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            stages,
            ..Self::default()
        }
    }
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            stages: Vec::new(),
            tick: Duration::from_secs(1),
            think_time: Duration::from_secs(1),
            run_timeout: None,
        }
    }
}
