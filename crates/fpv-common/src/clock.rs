//! Monotonic millisecond time, shared by every tick loop's hysteresis and
//! dwell-timer math.

use quanta::Clock;

#[derive(Clone)]
pub struct MonotonicClock {
    clock: Clock,
    start: quanta::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        let clock = Clock::new();
        let start = clock.now();
        Self { clock, start }
    }
}

impl MonotonicClock {
    pub fn now_ms(&self) -> u64 {
        self.clock.now().duration_since(self.start).as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_monotonic_nondecreasing() {
        let clock = MonotonicClock::default();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
