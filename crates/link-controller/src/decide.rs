use crate::station::{all_down, Station, UNSEEN_RSSI};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Init,
    Selected,
    Searching,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteChange {
    Set(String),
    Clear,
}

/// Owns the hysteresis window and current route selection. Everything here
/// is plain data threaded through the tick loop, no process-wide globals.
pub struct Decider {
    pub via_ip: Option<String>,
    pub state: LinkState,
    candidate_ip: Option<String>,
    candidate_since_ms: u64,
}

impl Default for Decider {
    fn default() -> Self {
        Self {
            via_ip: None,
            state: LinkState::Init,
            candidate_ip: None,
            candidate_since_ms: 0,
        }
    }
}

impl Decider {
    /// Runs one decision step. `now_ms` must be monotonic across calls.
    pub fn decide(
        &mut self,
        stations: &[Station],
        hyst_db: i32,
        hyst_ms: u64,
        floor_db: i32,
        ping_fail_max: u8,
        now_ms: u64,
    ) -> Option<RouteChange> {
        if stations.is_empty() {
            if self.via_ip.take().is_some() {
                self.state = LinkState::Down;
                return Some(RouteChange::Clear);
            }
            return None;
        }

        // Single-station shortcut mirrors the original's direct assignment
        // (no hysteresis needed when there is nothing to hysterese between).
        if stations.len() == 1 {
            let ip = stations[0].cfg.ip.clone();
            if self.via_ip.as_deref() != Some(ip.as_str()) {
                self.via_ip = Some(ip.clone());
                self.state = LinkState::Selected;
                return Some(RouteChange::Set(ip));
            }
            return None;
        }

        // 1. Sticky: keep the current route if it's still above the floor.
        if let Some(via) = &self.via_ip {
            if let Some(st) = stations.iter().find(|s| &s.cfg.ip == via) {
                if st.effective_rssi(ping_fail_max) >= floor_db {
                    self.state = LinkState::Selected;
                    return None;
                }
            }
        }

        // 2. All down?
        let best = stations
            .iter()
            .map(|s| s.effective_rssi(ping_fail_max))
            .max()
            .unwrap_or(UNSEEN_RSSI);
        if all_down(best) {
            self.candidate_ip = None;
            if self.via_ip.take().is_some() {
                self.state = LinkState::Down;
                return Some(RouteChange::Clear);
            }
            self.state = LinkState::Down;
            return None;
        }
        self.state = LinkState::Searching;

        // 3. Candidate = last station within hyst_db of the best.
        let mut candidate: Option<&Station> = None;
        for s in stations {
            if best - s.effective_rssi(ping_fail_max) < hyst_db {
                candidate = Some(s);
            }
        }
        let Some(candidate) = candidate else {
            return None;
        };
        let candidate_ip = candidate.cfg.ip.clone();

        // 4. Track how long this candidate has persisted; commit once stable.
        if self.candidate_ip.as_deref() != Some(candidate_ip.as_str()) {
            self.candidate_ip = Some(candidate_ip);
            self.candidate_since_ms = now_ms;
            return None;
        }
        if now_ms.saturating_sub(self.candidate_since_ms) >= hyst_ms
            && self.via_ip.as_deref() != Some(candidate_ip.as_str())
        {
            self.via_ip = Some(candidate_ip.clone());
            self.state = LinkState::Selected;
            return Some(RouteChange::Set(candidate_ip));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;

    fn station(ip: &str, rssi: i32) -> Station {
        let mut s = Station::new(StationConfig {
            iface: "wlan0".into(),
            ip: ip.into(),
            mac: [0; 6],
        });
        s.rssi_dbm = rssi;
        s
    }

    // Selection then a flip once the stations' RSSI reverses.
    #[test]
    fn selects_best_station_then_flips_after_hysteresis_window() {
        let mut d = Decider::default();
        let stations = vec![station("192.168.0.11", -50), station("192.168.0.12", -45)];
        assert_eq!(d.decide(&stations, 10, 2000, -40, 3, 0), None);
        assert_eq!(d.decide(&stations, 10, 2000, -40, 3, 1000), None);
        assert_eq!(
            d.decide(&stations, 10, 2000, -40, 3, 2000),
            Some(RouteChange::Set("192.168.0.12".into()))
        );

        let flipped = vec![station("192.168.0.11", -40), station("192.168.0.12", -60)];
        // sticky check fails immediately since via (B) is now -60 < floor -40
        assert_eq!(d.decide(&flipped, 10, 2000, -40, 3, 5000), None);
        assert_eq!(
            d.decide(&flipped, 10, 2000, -40, 3, 7000),
            Some(RouteChange::Set("192.168.0.11".into()))
        );
    }

    #[test]
    fn sticky_keeps_current_route_above_floor() {
        let mut d = Decider::default();
        d.via_ip = Some("192.168.0.11".into());
        let stations = vec![station("192.168.0.11", -39), station("192.168.0.12", -10)];
        assert_eq!(d.decide(&stations, 10, 2000, -40, 3, 0), None);
        assert_eq!(d.via_ip.as_deref(), Some("192.168.0.11"));
    }

    #[test]
    fn all_down_clears_route() {
        let mut d = Decider::default();
        d.via_ip = Some("192.168.0.11".into());
        let stations = vec![
            station("192.168.0.11", UNSEEN_RSSI),
            station("192.168.0.12", UNSEEN_RSSI),
        ];
        assert_eq!(d.decide(&stations, 10, 2000, -40, 3, 0), Some(RouteChange::Clear));
        assert_eq!(d.via_ip, None);
        assert_eq!(d.state, LinkState::Down);
    }

    #[test]
    fn single_station_assigns_immediately_without_hysteresis() {
        let mut d = Decider::default();
        let stations = vec![station("192.168.0.11", -80)];
        assert_eq!(
            d.decide(&stations, 10, 2000, -40, 3, 0),
            Some(RouteChange::Set("192.168.0.11".into()))
        );
    }

    #[test]
    fn candidate_change_restarts_the_hysteresis_window() {
        let mut d = Decider::default();
        let a_leads = vec![station("10.0.0.1", -10), station("10.0.0.2", -90)];
        let b_leads = vec![station("10.0.0.1", -90), station("10.0.0.2", -10)];
        assert_eq!(d.decide(&a_leads, 10, 1000, -40, 3, 0), None);
        // candidate flips before the window elapses: timer restarts, no commit at t=900
        assert_eq!(d.decide(&b_leads, 10, 1000, -40, 3, 900), None);
        assert_eq!(d.decide(&b_leads, 10, 1000, -40, 3, 1899), None);
        assert_eq!(
            d.decide(&b_leads, 10, 1000, -40, 3, 1900),
            Some(RouteChange::Set("10.0.0.2".into()))
        );
    }
}
