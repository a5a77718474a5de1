use std::time::Duration;

use crate::config::Stage;

/// Target concurrency as a function of elapsed time, derived from an
/// ordered stage list.
///
/// Stage boundaries are cumulative: stage `i` begins where stage `i - 1`
/// ends, and the ramp always starts from 0. Within a stage the target moves
/// by linear interpolation from the concurrency at stage start to the
/// stage's own target, rounded to the nearest integer; a zero-duration
/// stage is an instantaneous jump. Past the last stage the final target
/// holds indefinitely and `is_done` reports completion.
#[derive(Debug, Clone)]
pub struct RampSchedule {
    stages: Vec<Stage>,
    cumulative_ends: Vec<Duration>,
}

impl RampSchedule {
    pub fn new(stages: Vec<Stage>) -> Self {
        let mut cumulative_ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for s in &stages {
            acc = acc.saturating_add(s.duration);
            cumulative_ends.push(acc);
        }

        Self {
            stages,
            cumulative_ends,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// True once the schedule has nothing left to ramp. An empty stage list
    /// is done immediately.
    pub fn is_done(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    /// Index of the stage governing `elapsed`, or `None` for an empty list
    /// or a clock past the end.
    pub fn stage_index_at(&self, elapsed: Duration) -> Option<usize> {
        if self.stages.is_empty() || elapsed >= self.total_duration() {
            return None;
        }
        Some(self.cumulative_ends.partition_point(|end| *end <= elapsed))
    }

    pub fn target_at(&self, elapsed: Duration) -> u64 {
        let Some(last) = self.stages.last() else {
            return 0;
        };
        if elapsed >= self.total_duration() {
            return last.target;
        }

        // First stage whose end lies strictly after `elapsed`; at an exact
        // boundary this lands on the next stage, whose start value equals
        // the finished stage's target.
        let idx = self.cumulative_ends.partition_point(|end| *end <= elapsed);

        let stage_end = self.cumulative_ends[idx];
        let stage_start = if idx == 0 {
            Duration::ZERO
        } else {
            self.cumulative_ends[idx - 1]
        };

        let start_target = if idx == 0 {
            0
        } else {
            self.stages[idx - 1].target
        };
        let end_target = self.stages[idx].target;

        let stage_duration = stage_end.saturating_sub(stage_start);
        if stage_duration.is_zero() {
            return end_target;
        }

        let stage_elapsed = elapsed.saturating_sub(stage_start);

        // Linear interpolation across the stage, rounded to nearest.
        let delta = end_target as i128 - start_target as i128;
        let num = stage_elapsed.as_nanos() as i128;
        let den = stage_duration.as_nanos() as i128;

        let cur = start_target as i128 + round_div(delta.saturating_mul(num), den);
        cur.clamp(0, u64::MAX as i128) as u64
    }
}

/// Integer division rounding to the nearest value, half away from zero.
fn round_div(num: i128, den: i128) -> i128 {
    let half = den / 2;
    if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn schedule(stages: &[(u64, u64)]) -> RampSchedule {
        RampSchedule::new(
            stages
                .iter()
                .map(|&(d, t)| Stage::new(secs(d), t))
                .collect(),
        )
    }

    #[test]
    fn empty_stage_list_is_constant_zero_and_done() {
        let s = schedule(&[]);
        assert_eq!(s.target_at(Duration::ZERO), 0);
        assert_eq!(s.target_at(secs(100)), 0);
        assert!(s.is_done(Duration::ZERO));
    }

    #[test]
    fn ramp_lands_exactly_on_stage_targets() {
        let s = schedule(&[(10, 10), (30, 10), (10, 0)]);

        assert_eq!(s.target_at(Duration::ZERO), 0);
        assert_eq!(s.target_at(secs(5)), 5);
        assert_eq!(s.target_at(secs(10)), 10);
        assert_eq!(s.target_at(secs(25)), 10);
        assert_eq!(s.target_at(secs(40)), 10);
        assert_eq!(s.target_at(secs(45)), 5);
        assert!(!s.is_done(secs(49)));
        assert!(s.is_done(secs(50)));
        assert_eq!(s.target_at(secs(50)), 0);
    }

    #[test]
    fn terminal_target_holds_past_the_end() {
        let s = schedule(&[(10, 4)]);
        assert_eq!(s.target_at(secs(10)), 4);
        assert_eq!(s.target_at(secs(1000)), 4);
        assert!(s.is_done(secs(10)));
    }

    #[test]
    fn interpolation_rounds_to_nearest() {
        let s = schedule(&[(10, 10)]);
        // 4.5s into a 0 -> 10 ramp over 10s sits at 4.5; nearest is 5.
        assert_eq!(s.target_at(Duration::from_millis(4500)), 5);
        assert_eq!(s.target_at(Duration::from_millis(4400)), 4);
    }

    #[test]
    fn ramp_is_monotonic_within_a_stage() {
        let s = schedule(&[(10, 10)]);
        let mut last = 0;
        for ms in (0..=10_000).step_by(250) {
            let target = s.target_at(Duration::from_millis(ms));
            assert!(target >= last, "target dipped at {ms}ms");
            last = target;
        }
        assert_eq!(last, 10);
    }

    #[test]
    fn zero_duration_stage_jumps() {
        let s = schedule(&[(0, 7), (10, 7)]);
        assert_eq!(s.target_at(Duration::ZERO), 7);
        assert_eq!(s.target_at(secs(5)), 7);
    }

    #[test]
    fn ramp_down_never_goes_negative() {
        let s = schedule(&[(2, 4), (2, 0)]);
        assert_eq!(s.target_at(secs(3)), 2);
        for ms in (0..=4000).step_by(100) {
            // u64 already excludes negatives; this guards the i128 math.
            let _ = s.target_at(Duration::from_millis(ms));
        }
        assert_eq!(s.target_at(secs(4)), 0);
    }

    #[test]
    fn stage_index_tracks_cumulative_boundaries() {
        let s = schedule(&[(10, 10), (30, 10), (10, 0)]);
        assert_eq!(s.stage_index_at(secs(0)), Some(0));
        assert_eq!(s.stage_index_at(secs(10)), Some(1));
        assert_eq!(s.stage_index_at(secs(39)), Some(1));
        assert_eq!(s.stage_index_at(secs(45)), Some(2));
        assert_eq!(s.stage_index_at(secs(50)), None);
    }
}
