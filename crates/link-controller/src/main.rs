mod config;
mod decide;
mod http;
mod ping;
mod rssi;
mod station;

use std::process::id as pid;
use std::time::Duration;

use fpv_common::capability::{route_default_matches, RouteController, SystemExecutor};
use fpv_common::signal::ShutdownFlag;

use config::{ConfigInput, Role};
use decide::{Decider, RouteChange};
use http::StatusServer;
use ping::Pinger;
use rssi::{apply_dump, parse_iface_link, run_iface_link, run_station_dump};
use station::Station;

const DEFAULT_CONFIG_PATH: &str = "/etc/linkmgrd.conf";

fn main() {
    fpv_common::logging::init("info");

    let mut config_path = DEFAULT_CONFIG_PATH.to_string();
    let mut verbose = false;
    for arg in std::env::args().skip(1) {
        if arg == "--verbose" {
            verbose = true;
        } else {
            config_path = arg;
        }
    }

    let text = match std::fs::read_to_string(&config_path) {
        Ok(t) => t,
        Err(err) => {
            tracing::error!(path = %config_path, %err, "failed to read config");
            std::process::exit(1);
        }
    };
    let doc = fpv_common::ini::IniDocument::parse(&text);
    let cfg = match ConfigInput::from_ini(&doc).resolve() {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(%err, "invalid config");
            std::process::exit(1);
        }
    };

    if verbose {
        tracing::info!(
            role = ?cfg.role,
            stations = cfg.stations.len(),
            poll_ms = cfg.poll_ms,
            hyst_db = cfg.hyst_db,
            hyst_ms = cfg.hyst_ms,
            "starting"
        );
    }

    let shutdown = std::sync::Arc::new(ShutdownFlag::new());
    {
        let shutdown = shutdown.clone();
        fpv_common::signal::spawn_sigwait_thread(&[libc::SIGINT, libc::SIGTERM], move |_sig| {
            shutdown.set();
        });
    }

    let status_server = match StatusServer::bind(cfg.http_port) {
        Ok(s) => Some(s),
        Err(err) => {
            tracing::warn!(%err, port = cfg.http_port, "status server unavailable");
            None
        }
    };

    let clock = fpv_common::clock::MonotonicClock::default();
    let mut stations: Vec<Station> = cfg.stations.iter().cloned().map(Station::new).collect();
    let pinger = Pinger::new();
    if !pinger.is_available() {
        tracing::warn!("ICMP probing disabled, falling back to RSSI-only steering");
    }
    let mut decider = Decider::default();
    let mut route = RouteController::new(SystemExecutor);
    let ping_timeout = Duration::from_millis(cfg.ping_to_ms);
    let poll_interval = Duration::from_millis(cfg.poll_ms);
    let http_timeout = Duration::from_secs(cfg.http_timeout_s.max(1));
    let mut next_poll = clock.now_ms();

    while !shutdown.is_set() {
        if let Some(server) = &status_server {
            server.poll_once(&cfg.role, decider.state, &stations, &cfg.html_path, http_timeout);
        }

        let now = clock.now_ms();
        if now >= next_poll {
            poll_stations(&cfg, &mut stations, &pinger, ping_timeout);
            if verbose {
                for s in &stations {
                    tracing::info!(ip = %s.cfg.ip, rssi = s.rssi_dbm, fail = s.ping_fail_count, "poll");
                }
            }

            if let Some(change) = decider.decide(&stations, cfg.hyst_db, cfg.hyst_ms, cfg.floor_db, cfg.ping_fail_max, now) {
                apply_route_change(&mut route, &cfg, &change);
            }

            if let Some(via) = &decider.via_ip {
                watchdog_reapply(&mut route, &cfg, via);
            }

            next_poll = now + poll_interval.as_millis() as u64;
        }

        std::thread::sleep(Duration::from_millis(10));
    }

    tracing::info!("shutdown");
}

fn poll_stations(cfg: &config::Config, stations: &mut [Station], pinger: &Pinger, ping_timeout: Duration) {
    match cfg.role {
        Role::Master => {
            if let Some(text) = run_station_dump(&cfg.master_iface, Duration::from_millis(200)) {
                let records = rssi::parse_station_dump(&text);
                apply_dump(stations, &records);
            }
        }
        Role::Sta => {
            for s in stations.iter_mut() {
                let mac_str = fpv_common::net::format_mac(&s.cfg.mac);
                if let Some(text) = run_iface_link(&s.cfg.iface, Duration::from_millis(200)) {
                    let rec = parse_iface_link(&text, &mac_str);
                    s.rssi_dbm = rec.rssi;
                } else {
                    s.rssi_dbm = station::UNSEEN_RSSI;
                }
            }
        }
    }

    if pinger.is_available() {
        let id = (pid() & 0xffff) as u16;
        for s in stations.iter_mut() {
            let Ok(target) = s.cfg.ip.parse() else {
                continue;
            };
            if pinger.probe(target, id, ping_timeout) {
                s.on_ping_success(cfg.ping_fail_max);
            } else {
                s.on_ping_timeout();
            }
        }
    }
}

fn apply_route_change<E: fpv_common::capability::CommandExecutor>(
    route: &mut RouteController<E>,
    cfg: &config::Config,
    change: &RouteChange,
) {
    match change {
        RouteChange::Set(ip) => {
            tracing::info!(via = %ip, "route selected");
            route.set_default(ip, &cfg.master_iface);
        }
        RouteChange::Clear => {
            tracing::warn!("all links down, clearing default route");
            route.clear_default(&cfg.master_iface);
        }
    }
}

fn watchdog_reapply<E: fpv_common::capability::CommandExecutor>(route: &mut RouteController<E>, cfg: &config::Config, via: &str) {
    match route_default_matches(via, &cfg.master_iface) {
        Some(true) | None => {}
        Some(false) => {
            tracing::warn!(via, "default route drifted, reapplying");
            route.set_default(via, &cfg.master_iface);
        }
    }
}
