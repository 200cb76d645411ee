//! Wall-clock to tick conversion.

use std::time::Duration;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Converts elapsed wall time into whole ticks at a given rate.
///
/// The fraction of a tick left over from each call carries into the next,
/// so many short frames add up to the same tick count as one long one.
/// Changing the rate keeps the partial tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    rate: u32,
    /// Partial tick, in billionths of a tick.
    remainder: u128,
    total_ticks: u64,
}

impl Timeline {
    /// Create a timeline running at `rate` ticks per second (at least 1).
    #[must_use]
    pub fn new(rate: u32) -> Self {
        Self {
            rate: rate.max(1),
            remainder: 0,
            total_ticks: 0,
        }
    }

    /// Ticks per second.
    #[must_use]
    pub const fn rate(&self) -> u32 {
        self.rate
    }

    /// Change the rate. Zero is raised to one.
    pub fn set_rate(&mut self, rate: u32) {
        self.rate = rate.max(1);
    }

    /// Whole ticks elapsed over the lifetime of this timeline.
    #[must_use]
    pub const fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Account for `elapsed` wall time and return how many ticks are due.
    pub fn advance(&mut self, elapsed: Duration) -> u64 {
        let scaled = self.remainder + elapsed.as_nanos() * u128::from(self.rate);
        let ticks = scaled / NANOS_PER_SECOND;
        self.remainder = scaled % NANOS_PER_SECOND;
        let ticks = u64::try_from(ticks).unwrap_or(u64::MAX);
        self.total_ticks = self.total_ticks.saturating_add(ticks);
        ticks
    }

    /// Drop any partial tick.
    pub fn reset(&mut self) {
        self.remainder = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_second() {
        let mut timeline = Timeline::new(60);
        assert_eq!(timeline.advance(Duration::from_secs(1)), 60);
        assert_eq!(timeline.total_ticks(), 60);
    }

    #[test]
    fn test_remainder_carries() {
        let mut timeline = Timeline::new(60);
        // 10ms frames: 0.6 ticks each
        let ticks: u64 = (0..100).map(|_| timeline.advance(Duration::from_millis(10))).sum();
        assert_eq!(ticks, 60);

        let mut timeline = Timeline::new(60);
        assert_eq!(timeline.advance(Duration::from_millis(10)), 0);
        assert_eq!(timeline.advance(Duration::from_millis(10)), 1);
    }

    #[test]
    fn test_rate_change_keeps_partial_tick() {
        let mut timeline = Timeline::new(30);
        // 0.6 of a tick at 30/s
        assert_eq!(timeline.advance(Duration::from_millis(20)), 0);
        timeline.set_rate(120);
        // Another 0.6 at 120/s
        assert_eq!(timeline.advance(Duration::from_millis(5)), 1);
        assert_eq!(timeline.advance(Duration::from_millis(5)), 0);
        assert_eq!(timeline.advance(Duration::from_millis(5)), 1);
    }

    #[test]
    fn test_zero_rate_clamped() {
        let mut timeline = Timeline::new(0);
        assert_eq!(timeline.rate(), 1);
        assert_eq!(timeline.advance(Duration::from_secs(2)), 2);
        timeline.reset();
        timeline.set_rate(0);
        assert_eq!(timeline.rate(), 1);
    }
}
