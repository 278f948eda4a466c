//! Output-mode selection. Signals pick the mode (see `main.rs` for the
//! reassigned table); this module only owns the resulting destination set.

use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicU8, Ordering};

pub const UNICAST_IP: &str = "192.168.0.10";
pub const UNICAST_PORT: u16 = 5600;
pub const BROADCAST_IP: &str = "255.255.255.255";
pub const BROADCAST_PORT: u16 = 5601;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Unicast = 0,
    BroadcastAltPort = 1,
    Both = 2,
    BroadcastSamePort = 3,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Unicast => "unicast",
            Mode::BroadcastAltPort => "broadcast",
            Mode::Both => "both",
            Mode::BroadcastSamePort => "broadcast5600",
        }
    }

    fn from_u8(v: u8) -> Mode {
        match v {
            1 => Mode::BroadcastAltPort,
            2 => Mode::Both,
            3 => Mode::BroadcastSamePort,
            _ => Mode::Unicast,
        }
    }
}

/// Mode flipped by signal handlers; read once per inbound packet.
pub struct ModeFlag(AtomicU8);

impl ModeFlag {
    pub fn new(initial: Mode) -> Self {
        Self(AtomicU8::new(initial as u8))
    }
    pub fn set(&self, mode: Mode) {
        self.0.store(mode as u8, Ordering::SeqCst);
    }
    pub fn get(&self) -> Mode {
        Mode::from_u8(self.0.load(Ordering::SeqCst))
    }
}

pub struct Destinations {
    pub unicast: SocketAddrV4,
    pub broadcast_alt_port: SocketAddrV4,
    pub broadcast_same_port: SocketAddrV4,
}

impl Default for Destinations {
    fn default() -> Self {
        let uni_ip: std::net::Ipv4Addr = UNICAST_IP.parse().unwrap();
        let bcast_ip: std::net::Ipv4Addr = BROADCAST_IP.parse().unwrap();
        Self {
            unicast: SocketAddrV4::new(uni_ip, UNICAST_PORT),
            broadcast_alt_port: SocketAddrV4::new(bcast_ip, BROADCAST_PORT),
            broadcast_same_port: SocketAddrV4::new(bcast_ip, UNICAST_PORT),
        }
    }
}

/// Resolves the set of destinations a packet should be duplicated to for the
/// current mode, each paired with the duplicate count (`batch_size`, or 1 if
/// duplication is disabled).
pub fn targets_for(mode: Mode, dests: &Destinations, batch_size: usize) -> Vec<(SocketAddrV4, usize)> {
    let dup = batch_size.max(1);
    match mode {
        Mode::Unicast => vec![(dests.unicast, dup)],
        Mode::BroadcastAltPort => vec![(dests.broadcast_alt_port, dup)],
        Mode::Both => vec![(dests.unicast, dup), (dests.broadcast_alt_port, dup)],
        Mode::BroadcastSamePort => vec![(dests.broadcast_same_port, dup)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_mode_targets_unicast_and_broadcast_alt_port() {
        let dests = Destinations::default();
        let targets = targets_for(Mode::Both, &dests, 1);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].0, dests.unicast);
        assert_eq!(targets[1].0, dests.broadcast_alt_port);
    }

    #[test]
    fn zero_batch_size_still_sends_once() {
        let dests = Destinations::default();
        let targets = targets_for(Mode::Unicast, &dests, 0);
        assert_eq!(targets[0].1, 1);
    }

    #[test]
    fn mode_flag_round_trips_through_u8_encoding() {
        let flag = ModeFlag::new(Mode::Unicast);
        flag.set(Mode::BroadcastSamePort);
        assert_eq!(flag.get(), Mode::BroadcastSamePort);
    }
}
