//! Probabilistic cycle gate for expensive collectors.
//!
//! Some collectors are too costly to run on every cycle. Instead of a strict
//! every-Nth-cycle counter (which phase-aligns across process restarts), the
//! gate fires with a probability that rises linearly from 0 toward 1 as
//! quiet cycles accumulate, reaching certainty after `max_interval` cycles.
//! The result is an approximately-every-N execution pattern with randomized
//! phase.

/// Trigger gate consulted once per cycle for a throttled collector.
pub struct CycleGate {
    max_interval: u32,
    sampling: u32,
    /// Quiet cycles since the gate last fired.
    val: u32,
}

impl CycleGate {
    /// `max_interval` is the number of quiet cycles after which the gate is
    /// certain to fire; the probability roll only happens on every
    /// `sampling`-th cycle.
    pub fn new(max_interval: u32, sampling: u32) -> Self {
        Self {
            max_interval: max_interval.max(1),
            sampling: sampling.max(1),
            val: 0,
        }
    }

    /// Returns true if the gated collector should run this cycle.
    pub fn check(&mut self) -> bool {
        self.advance(rand::random::<f64>())
    }

    fn advance(&mut self, roll: f64) -> bool {
        let fired = self.val % self.sampling == 0 && {
            // Chance of firing is val/max_interval: 0 right after a run,
            // certain once val reaches max_interval.
            let threshold = (f64::from(self.max_interval) - f64::from(self.val)) / f64::from(self.max_interval);
            roll > threshold
        };
        if fired {
            self.val = 0;
        }
        self.val += 1;
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::CycleGate;

    #[test]
    fn never_fires_right_after_a_run() {
        let mut gate = CycleGate::new(20, 1);
        // val = 0: the threshold is 1.0, unreachable by any roll in [0, 1).
        assert!(!gate.advance(0.999_999));
    }

    #[test]
    fn always_fires_once_max_interval_is_reached() {
        let mut gate = CycleGate::new(5, 1);
        for _ in 0..=5 {
            gate.advance(0.0);
        }
        // val > max_interval: the threshold is negative.
        assert!(gate.advance(0.0));
    }

    #[test]
    fn fires_only_on_sampled_cycles() {
        let mut gate = CycleGate::new(2, 3);
        assert!(!gate.advance(1.0)); // val 0: sampled, threshold 1.0
        assert!(!gate.advance(1.0)); // val 1: not sampled
        assert!(!gate.advance(1.0)); // val 2: not sampled
        assert!(gate.advance(1.0)); // val 3: sampled, past max_interval
    }

    #[test]
    fn firing_resets_the_quiet_count() {
        // With max_interval 1 the gate degenerates to "every cycle after the
        // first": one quiet cycle is already certainty.
        let mut gate = CycleGate::new(1, 1);
        assert!(!gate.advance(0.5));
        assert!(gate.advance(0.5));
        assert!(gate.advance(0.5));
    }

    #[test]
    fn probability_rises_with_quiet_cycles() {
        let mut gate = CycleGate::new(10, 1);
        gate.advance(1.0); // val 0 -> 1
        for _ in 0..3 {
            assert!(!gate.advance(0.0));
        }
        // val 4: chance 0.4, a roll of 0.5 misses the 0.6 threshold.
        assert!(!gate.advance(0.5));
        // val 5: chance 0.5, a roll of 0.7 clears it.
        assert!(gate.advance(0.7));
    }
}
