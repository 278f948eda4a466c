//! One-line-per-second counters, printed in the capture's
//! `ts:recv=N:fwd=N:badfcs=N` wire format.

#[derive(Default)]
pub struct Counters {
    pub recv: u64,
    pub fwd: u64,
    pub badfcs: u64,
}

pub struct StatsReporter {
    counters: Counters,
    last_report_ms: u64,
    period_ms: u64,
}

impl StatsReporter {
    pub fn new(now_ms: u64) -> Self {
        Self {
            counters: Counters::default(),
            last_report_ms: now_ms,
            period_ms: 1000,
        }
    }

    pub fn record_recv(&mut self) {
        self.counters.recv += 1;
    }
    pub fn record_fwd(&mut self, n: u64) {
        self.counters.fwd += n;
    }
    pub fn record_badfcs(&mut self) {
        self.counters.badfcs += 1;
    }

    /// True once `period_ms` has elapsed since the last report, without
    /// consuming it, so the caller can flush pending output before the
    /// counters reset.
    pub fn due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_report_ms) >= self.period_ms
    }

    /// Emits and resets the counters once `period_ms` has elapsed; returns
    /// the formatted line on report ticks, `None` otherwise.
    pub fn maybe_report(&mut self, now_ms: u64) -> Option<String> {
        if !self.due(now_ms) {
            return None;
        }
        let line = format!(
            "{:.3}:recv={}:fwd={}:badfcs={}",
            now_ms as f64 / 1000.0,
            self.counters.recv,
            self.counters.fwd,
            self.counters.badfcs
        );
        self.counters = Counters::default();
        self.last_report_ms = now_ms;
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_only_after_the_period_elapses() {
        let mut r = StatsReporter::new(0);
        r.record_recv();
        assert!(r.maybe_report(500).is_none());
        let line = r.maybe_report(1000).unwrap();
        assert_eq!(line, "1.000:recv=1:fwd=0:badfcs=0");
    }

    #[test]
    fn resets_counters_after_reporting() {
        let mut r = StatsReporter::new(0);
        r.record_recv();
        r.maybe_report(1000);
        r.record_recv();
        let line = r.maybe_report(2000).unwrap();
        assert_eq!(line, "2.000:recv=1:fwd=0:badfcs=0");
    }
}
