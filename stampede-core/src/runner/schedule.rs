use std::time::Duration;

use super::config::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSnapshot {
    /// 0-based stage index.
    pub index: usize,
    pub count: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

/// Piecewise-linear worker target over the stage timeline, starting from zero workers.
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

    pub fn is_done(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    // Stage boundaries belong to the stage that ends there, so the target at a
    // boundary is exactly that stage's target.
    fn stage_index_at(&self, elapsed: Duration) -> usize {
        let idx = match self
            .cumulative_ends
            .binary_search_by(|end| end.cmp(&elapsed))
        {
            Ok(i) | Err(i) => i,
        };
        idx.min(self.stages.len().saturating_sub(1))
    }

    fn stage_bounds(&self, idx: usize) -> (Duration, Duration) {
        let end = self.cumulative_ends[idx];
        let start = if idx == 0 {
            Duration::ZERO
        } else {
            self.cumulative_ends[idx - 1]
        };
        (start, end)
    }

    fn start_target(&self, idx: usize) -> u64 {
        if idx == 0 {
            0
        } else {
            self.stages[idx - 1].target
        }
    }

    pub fn target_at(&self, elapsed: Duration) -> u64 {
        let Some(last) = self.stages.last() else {
            return 0;
        };
        if elapsed >= self.total_duration() {
            return last.target;
        }

        let idx = self.stage_index_at(elapsed);
        let (stage_start, stage_end) = self.stage_bounds(idx);
        let stage_duration = stage_end.saturating_sub(stage_start);
        let stage_elapsed = elapsed.saturating_sub(stage_start);

        let start_target = self.start_target(idx);
        let end_target = self.stages[idx].target;

        if stage_duration.is_zero() {
            return end_target;
        }

        // Truncating division keeps the value between the two endpoints.
        let start_i = start_target as i128;
        let delta = end_target as i128 - start_i;
        let num = stage_elapsed.as_nanos() as i128;
        let den = stage_duration.as_nanos() as i128;

        let cur = start_i + delta.saturating_mul(num) / den.max(1);
        cur.clamp(0, u64::MAX as i128) as u64
    }

    pub fn stage_snapshot_at(&self, elapsed: Duration) -> Option<StageSnapshot> {
        if self.stages.is_empty() {
            return None;
        }

        let clamped = elapsed.min(self.total_duration());
        let idx = self.stage_index_at(clamped);
        let (stage_start, stage_end) = self.stage_bounds(idx);
        let stage_elapsed = clamped.saturating_sub(stage_start);

        Some(StageSnapshot {
            index: idx,
            count: self.stages.len(),
            stage_elapsed,
            stage_remaining: stage_end.saturating_sub(clamped),
            start_target: self.start_target(idx),
            end_target: self.stages[idx].target,
            current_target: self.target_at(clamped),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn three_stages() -> RampSchedule {
        RampSchedule::new(vec![
            Stage::new(secs(5), 1),
            Stage::new(secs(10), 10),
            Stage::new(secs(5), 0),
        ])
    }

    #[test]
    fn interpolates_from_zero_and_hits_targets_at_stage_ends() {
        let s = three_stages();
        assert_eq!(s.total_duration(), secs(20));

        assert_eq!(s.target_at(Duration::ZERO), 0);
        assert_eq!(s.target_at(secs(5)), 1);
        assert_eq!(s.target_at(Duration::from_millis(10_000)), 5);
        assert_eq!(s.target_at(secs(15)), 10);
        assert_eq!(s.target_at(Duration::from_millis(17_500)), 5);
        assert_eq!(s.target_at(secs(20)), 0);
        assert!(s.is_done(secs(20)));
        assert!(!s.is_done(Duration::from_millis(19_999)));
    }

    #[test]
    fn never_leaves_the_stage_endpoints() {
        let s = three_stages();
        let mut prev = 0;
        for ms in (5_000..=15_000).step_by(7) {
            let t = s.target_at(Duration::from_millis(ms));
            assert!((1..=10).contains(&t), "t={ms}ms target={t}");
            assert!(t >= prev, "ramp-up must be monotonic");
            prev = t;
        }
        prev = 10;
        for ms in (15_000..=20_000).step_by(7) {
            let t = s.target_at(Duration::from_millis(ms));
            assert!(t <= 10, "t={ms}ms target={t}");
            assert!(t <= prev, "ramp-down must be monotonic");
            prev = t;
        }
    }

    #[test]
    fn zero_length_stage_jumps_to_its_target() {
        let s = RampSchedule::new(vec![Stage::new(Duration::ZERO, 4), Stage::new(secs(2), 4)]);
        assert_eq!(s.target_at(Duration::from_millis(1)), 4);
        assert_eq!(s.target_at(secs(1)), 4);
    }

    #[test]
    fn snapshot_reports_stage_position() {
        let s = three_stages();
        let snap = s.stage_snapshot_at(secs(7)).unwrap_or_else(|| panic!("no stages"));
        assert_eq!(snap.index, 1);
        assert_eq!(snap.count, 3);
        assert_eq!(snap.stage_elapsed, secs(2));
        assert_eq!(snap.stage_remaining, secs(8));
        assert_eq!(snap.start_target, 1);
        assert_eq!(snap.end_target, 10);

        let end = s.stage_snapshot_at(secs(60)).unwrap_or_else(|| panic!("no stages"));
        assert_eq!(end.index, 2);
        assert_eq!(end.current_target, 0);
        assert_eq!(end.stage_remaining, Duration::ZERO);

        assert!(RampSchedule::new(Vec::new()).stage_snapshot_at(secs(1)).is_none());
    }
}
