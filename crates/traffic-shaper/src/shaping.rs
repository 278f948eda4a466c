//! EWMA smoothing plus percentage/time hysteresis gating on top of the raw
//! per-tick allocation target, so a shaping change is only pushed to `tc`
//! once it has been stable for `hysteresis_hold_ms` and the previous change
//! is at least `min_dwell_ms` old.

use crate::allocation::{allocate, Rates};
use crate::config::Config;

pub struct Shaper {
    smoothed_kbps: f64,
    hold_active: bool,
    hold_start_ms: u64,
    last_applied_kbps: Option<u32>,
    last_applied_ms: u64,
}

impl Default for Shaper {
    fn default() -> Self {
        Self {
            smoothed_kbps: 0.0,
            hold_active: false,
            hold_start_ms: 0,
            last_applied_kbps: None,
            last_applied_ms: 0,
        }
    }
}

impl Shaper {
    /// Feeds one tick's raw target through smoothing and hysteresis. Returns
    /// `Some(rates)` only on ticks where the shaping should actually change.
    pub fn tick(&mut self, cfg: &Config, raw_target_kbps: u32, now_ms: u64) -> Option<Rates> {
        if self.smoothed_kbps <= 0.1 {
            self.smoothed_kbps = raw_target_kbps as f64;
        } else {
            self.smoothed_kbps = cfg.alpha * raw_target_kbps as f64 + (1.0 - cfg.alpha) * self.smoothed_kbps;
        }
        let target = (self.smoothed_kbps + 0.5) as u32;

        let pct = match self.last_applied_kbps {
            None => 100,
            Some(0) => 100,
            Some(prev) => (target.abs_diff(prev) * 100) / prev,
        };

        if pct >= cfg.hysteresis_pct {
            if !self.hold_active {
                self.hold_active = true;
                self.hold_start_ms = now_ms;
            }
            let held_long_enough = now_ms.saturating_sub(self.hold_start_ms) >= cfg.hysteresis_hold_ms;
            let dwell_elapsed = now_ms.saturating_sub(self.last_applied_ms) >= cfg.min_dwell_ms;
            if held_long_enough && dwell_elapsed {
                self.hold_active = false;
                self.last_applied_kbps = Some(target);
                self.last_applied_ms = now_ms;
                return Some(allocate(cfg, target));
            }
        } else {
            self.hold_active = false;
        }
        None
    }

    /// Forces the next tick to re-apply regardless of hysteresis state, used
    /// after a config reload installs a fresh `tc` tree.
    pub fn force_reapply(&mut self) {
        self.last_applied_kbps = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_always_applies() {
        let cfg = Config::default();
        let mut s = Shaper::default();
        assert!(s.tick(&cfg, 5000, 0).is_some());
    }

    #[test]
    fn small_change_within_hysteresis_band_does_not_reapply() {
        let cfg = Config { hysteresis_pct: 50, ..Config::default() };
        let mut s = Shaper::default();
        s.tick(&cfg, 5000, 0);
        assert!(s.tick(&cfg, 5100, 100).is_none());
    }

    #[test]
    fn large_change_waits_out_hold_and_dwell_before_reapplying() {
        let cfg = Config {
            hysteresis_pct: 10,
            hysteresis_hold_ms: 500,
            min_dwell_ms: 0,
            alpha: 1.0,
            ..Config::default()
        };
        let mut s = Shaper::default();
        s.tick(&cfg, 5000, 0);
        assert!(s.tick(&cfg, 9000, 100).is_none(), "hold timer just started");
        assert!(s.tick(&cfg, 9000, 600).is_some(), "hold elapsed, dwell is zero");
    }

    #[test]
    fn force_reapply_makes_the_next_tick_unconditional() {
        let cfg = Config { hysteresis_pct: 99, alpha: 1.0, ..Config::default() };
        let mut s = Shaper::default();
        s.tick(&cfg, 5000, 0);
        s.force_reapply();
        assert!(s.tick(&cfg, 5010, 100).is_some());
    }
}
