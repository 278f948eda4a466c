mod allocation;
mod capacity;
mod config;
mod http;
mod shaping;
mod telemetry;

use std::time::Duration;

use fpv_common::capability::{ClassSpec, QosController, SystemExecutor};
use fpv_common::signal::{ReloadFlag, ShutdownFlag};

use config::{Config, ConfigInput};
use http::{Action, ApiServer, Snapshot};
use shaping::Shaper;

const DEFAULT_CONFIG_PATH: &str = "/etc/trafficctrl.conf";

fn load_config(path: &str) -> Config {
    match std::fs::read_to_string(path) {
        Ok(text) => ConfigInput::from_ini(&fpv_common::ini::IniDocument::parse(&text)).resolve(),
        Err(_) => Config::default(),
    }
}

fn install_tree(qos: &mut QosController<SystemExecutor>, cfg: &Config) {
    let classes = [
        ClassSpec { classid: "1:1".into(), mark: Some(cfg.video.mark), rate_kbps: 1000, ceil_kbps: 2000, prio: 2 },
        ClassSpec { classid: "1:10".into(), mark: Some(cfg.mavlink.mark), rate_kbps: 300, ceil_kbps: 2000, prio: 1 },
        ClassSpec { classid: "1:20".into(), mark: Some(cfg.tunnel.mark), rate_kbps: 200, ceil_kbps: 3000, prio: 3 },
        ClassSpec { classid: "1:100".into(), mark: None, rate_kbps: 5, ceil_kbps: 500, prio: 4 },
    ];
    qos.install_tree(&cfg.wlan, &classes);
}

fn apply_rates(qos: &mut QosController<SystemExecutor>, cfg: &Config, rates: &allocation::Rates) {
    let specs = [
        ("1:1", &rates.video, 2u32),
        ("1:10", &rates.mavlink, 1),
        ("1:20", &rates.tunnel, 3),
        ("1:100", &rates.default_class, 4),
    ];
    for (classid, rate, prio) in specs {
        qos.change(
            &cfg.wlan,
            &ClassSpec {
                classid: classid.into(),
                mark: None,
                rate_kbps: rate.rate_kbps,
                ceil_kbps: rate.ceil_kbps,
                prio,
            },
        );
    }
}

fn main() {
    fpv_common::logging::init("info");

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let mut cfg = load_config(&config_path);

    let shutdown = std::sync::Arc::new(ShutdownFlag::new());
    let reload = std::sync::Arc::new(ReloadFlag::new());
    {
        let shutdown = shutdown.clone();
        let reload = reload.clone();
        fpv_common::signal::spawn_sigwait_thread(&[libc::SIGHUP, libc::SIGINT, libc::SIGTERM], move |sig| {
            if sig == libc::SIGHUP {
                reload.set();
            } else {
                shutdown.set();
            }
        });
    }

    let server = match ApiServer::bind(&cfg.http_addr) {
        Ok(s) => Some(s),
        Err(err) => {
            tracing::error!(%err, addr = %cfg.http_addr, "failed to bind http api");
            None
        }
    };

    let mut qos = QosController::new(SystemExecutor);
    install_tree(&mut qos, &cfg);

    let clock = fpv_common::clock::MonotonicClock::default();
    let mut shaper = Shaper::default();
    let mut last_telem: Option<(telemetry::Telemetry, u64)> = None;
    let mut last_rates: Option<allocation::Rates> = None;

    let mut tick_ms = (1000 / cfg.sample_hz.max(1)).max(10) as u64;
    let mut next_tick = clock.now_ms();

    while !shutdown.is_set() {
        if reload.take() {
            cfg = load_config(&config_path);
            install_tree(&mut qos, &cfg);
            shaper.force_reapply();
            tick_ms = (1000 / cfg.sample_hz.max(1)).max(10) as u64;
            tracing::info!("config reloaded");
        }

        let now = clock.now_ms();
        if now >= next_tick {
            next_tick = now + tick_ms;

            if let Some(t) = telemetry::read_telem_file(&cfg.telem_file, &cfg.key_mcs, &cfg.key_width) {
                last_telem = Some((t, now));
            }
            let (mcs, width) = match &last_telem {
                Some((t, ts)) if now.saturating_sub(*ts) <= cfg.stale_ms => (t.mcs, t.width),
                _ => (0, 20),
            };

            let usable = capacity::usable_kbps(&cfg, width, mcs);
            let target = capacity::alloc_kbps(&cfg, usable);

            if let Some(rates) = shaper.tick(&cfg, target, now) {
                apply_rates(&mut qos, &cfg, &rates);
                last_rates = Some(rates);
            }
            if last_rates.is_none() {
                last_rates = Some(allocation::allocate(&cfg, target));
            }

            if let Some(server) = &server {
                if let Some(rates) = last_rates {
                    let snapshot = Snapshot {
                        mcs,
                        width,
                        usable_kbps: usable,
                        eff: capacity::eff_for(&cfg, width),
                        phy: capacity::phy_for(width, mcs),
                        rates,
                        cfg: &cfg,
                        cfg_path: &config_path,
                    };
                    if let Action::Reload = server.poll_once(&snapshot, Duration::from_millis(100)) {
                        reload.set();
                    }
                }
            }
        }

        std::thread::sleep(Duration::from_millis(10));
    }

    tracing::info!("shutdown");
}
