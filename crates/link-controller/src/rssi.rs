//! Station-dump acquisition: invoke the driver's dump utility (an external
//! process, e.g. `iw dev <iface> station dump`) and parse `Station <MAC>`
//! blocks defensively: a record is committed only when the next header
//! starts or the dump ends, never on a blank-line assumption.

use fpv_common::net::mac_eq_ci;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::station::{Station, UNSEEN_RSSI};

#[derive(Debug, Clone, PartialEq)]
pub struct DumpRecord {
    pub mac: String,
    pub rssi: i32,
}

pub fn parse_station_dump(text: &str) -> Vec<DumpRecord> {
    let mut records = Vec::new();
    let mut mac = String::new();
    let mut rssi = UNSEEN_RSSI;

    let mut commit = |mac: &str, rssi: i32, out: &mut Vec<DumpRecord>| {
        if !mac.is_empty() {
            out.push(DumpRecord {
                mac: mac.to_string(),
                rssi,
            });
        }
    };

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("Station ") {
            commit(&mac, rssi, &mut records);
            mac = rest.split_whitespace().next().unwrap_or("").to_string();
            rssi = UNSEEN_RSSI;
        } else if trimmed.contains("signal") {
            if let Some(v) = trimmed.split_whitespace().nth(1) {
                if let Ok(parsed) = v.trim_end_matches("dBm").parse::<i32>() {
                    rssi = parsed;
                }
            }
        }
    }
    commit(&mac, rssi, &mut records);
    records
}

/// Marks every station unseen, then overwrites with matching dump records.
pub fn apply_dump(stations: &mut [Station], records: &[DumpRecord]) {
    for s in stations.iter_mut() {
        s.rssi_dbm = UNSEEN_RSSI;
    }
    for rec in records {
        if let Some(s) = stations
            .iter_mut()
            .find(|s| mac_eq_ci(&fpv_common::net::format_mac(&s.cfg.mac), &rec.mac))
        {
            s.rssi_dbm = rec.rssi;
        }
    }
}

/// Runs `iw dev <iface> station dump`, aborting (killing the child) if it
/// doesn't finish within `budget`. Returns `None` on spawn failure, timeout,
/// or non-UTF8 output, all treated as a transient I/O error upstream.
pub fn run_station_dump(iface: &str, budget: Duration) -> Option<String> {
    let child = Command::new("iw")
        .args(["dev", iface, "station", "dump"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;
    wait_with_budget(child, budget)
}

/// Runs `iw dev <iface> link`, used by the STA role to read its own uplink
/// signal quality. Output has a single implicit "station" (no `Station <MAC>`
/// header), so it's parsed with the same `signal:` line scan but wrapped in
/// a synthetic header first.
pub fn run_iface_link(iface: &str, budget: Duration) -> Option<String> {
    let child = Command::new("iw")
        .args(["dev", iface, "link"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;
    wait_with_budget(child, budget)
}

/// Parses `iw dev <iface> link` output for a single signal reading, keyed by
/// `mac` since the link output doesn't repeat the peer's MAC per line.
pub fn parse_iface_link(text: &str, mac: &str) -> DumpRecord {
    let mut rssi = UNSEEN_RSSI;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.contains("signal") {
            if let Some(v) = trimmed.split_whitespace().nth(1) {
                if let Ok(parsed) = v.trim_end_matches("dBm").parse::<i32>() {
                    rssi = parsed;
                }
            }
        }
    }
    DumpRecord {
        mac: mac.to_string(),
        rssi,
    }
}

fn wait_with_budget(mut child: Child, budget: Duration) -> Option<String> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    return None;
                }
                let mut out = String::new();
                child.stdout.take()?.read_to_string(&mut out).ok()?;
                return Some(out);
            }
            Ok(None) => {
                if start.elapsed() >= budget {
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(_) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;

    #[test]
    fn parses_multiple_stations_without_blank_line_separators() {
        let text = "Station aa:bb:cc:dd:ee:01 (on wlan0)\n\tinactive time:\t10 ms\n\tsignal:  \t-42 dBm\nStation aa:bb:cc:dd:ee:02 (on wlan0)\n\tsignal:  \t-55 dBm\n";
        let records = parse_station_dump(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].mac, "aa:bb:cc:dd:ee:01");
        assert_eq!(records[0].rssi, -42);
        assert_eq!(records[1].rssi, -55);
    }

    #[test]
    fn commits_final_record_at_end_of_input() {
        let text = "Station aa:bb:cc:dd:ee:01\n\tsignal: -70 dBm\n";
        let records = parse_station_dump(text);
        assert_eq!(records, vec![DumpRecord { mac: "aa:bb:cc:dd:ee:01".into(), rssi: -70 }]);
    }

    #[test]
    fn apply_dump_marks_unmatched_stations_unseen() {
        let mut stations = vec![
            Station::new(StationConfig {
                iface: "wlan0".into(),
                ip: "10.0.0.1".into(),
                mac: [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01],
            }),
            Station::new(StationConfig {
                iface: "wlan0".into(),
                ip: "10.0.0.2".into(),
                mac: [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02],
            }),
        ];
        stations[1].rssi_dbm = -33; // stale value from a previous poll
        let records = vec![DumpRecord {
            mac: "AA:BB:CC:DD:EE:01".into(),
            rssi: -42,
        }];
        apply_dump(&mut stations, &records);
        assert_eq!(stations[0].rssi_dbm, -42);
        assert_eq!(stations[1].rssi_dbm, UNSEEN_RSSI, "unseen stations reset, not stale");
    }

    #[test]
    fn parse_iface_link_reads_single_signal_line() {
        let text = "Connected to aa:bb:cc:dd:ee:01 (on wlan0)\n\tSSID: fpv\n\tsignal: -61 dBm\n\ttx bitrate: 65.0 MBit/s\n";
        let rec = parse_iface_link(text, "aa:bb:cc:dd:ee:01");
        assert_eq!(rec.rssi, -61);
        assert_eq!(rec.mac, "aa:bb:cc:dd:ee:01");
    }

    #[test]
    fn parse_iface_link_defaults_to_unseen_when_not_connected() {
        let rec = parse_iface_link("Not connected.\n", "aa:bb:cc:dd:ee:01");
        assert_eq!(rec.rssi, UNSEEN_RSSI);
    }
}
