mod hardening;
mod mode;

use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

use fpv_common::signal::ShutdownFlag;
use mode::{targets_for, Destinations, Mode, ModeFlag};

const IN_PORT: u16 = 5600;
const BUF_SIZE: usize = 2048;
const MAX_BATCH: usize = 64;

struct Args {
    batch_size: usize,
    start_mode: Mode,
}

fn print_help(prog: &str) -> ! {
    println!("Usage: {prog} [--batch N] [--start-mode MODE]");
    println!("  --batch N          duplicate each packet N times (1-{MAX_BATCH})");
    println!("  --start-mode MODE  unicast | broadcast | both | broadcast5600");
    println!("  --help             show this help");
    println!();
    println!("Signals at runtime:");
    println!("  SIGUSR1 → unicast only  ({}:{})", mode::UNICAST_IP, mode::UNICAST_PORT);
    println!("  SIGUSR2 → broadcast only ({}:{})", mode::BROADCAST_IP, mode::BROADCAST_PORT);
    println!("  SIGQUIT → both (unicast + broadcast)");
    println!("  SIGHUP  → broadcast only on {}:{}", mode::BROADCAST_IP, mode::UNICAST_PORT);
    println!("  SIGINT/SIGTERM → graceful shutdown");
    std::process::exit(0);
}

fn parse_args() -> Args {
    let argv: Vec<String> = std::env::args().collect();
    let mut batch_size = 0usize;
    let mut start_mode = Mode::Unicast;

    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--help" => print_help(&argv[0]),
            "--batch" => {
                i += 1;
                let n: usize = argv.get(i).and_then(|s| s.parse().ok()).unwrap_or(0);
                if n < 1 || n > MAX_BATCH {
                    eprintln!("Invalid batch size (1-{MAX_BATCH})");
                    std::process::exit(1);
                }
                batch_size = n;
            }
            "--start-mode" => {
                i += 1;
                start_mode = match argv.get(i).map(String::as_str) {
                    Some("unicast") => Mode::Unicast,
                    Some("broadcast") => Mode::BroadcastAltPort,
                    Some("both") => Mode::Both,
                    Some("broadcast5600") => Mode::BroadcastSamePort,
                    other => {
                        eprintln!("Unknown mode: {}", other.unwrap_or(""));
                        std::process::exit(1);
                    }
                };
            }
            other => {
                eprintln!("Unknown option: {other}");
                print_help(&argv[0]);
            }
        }
        i += 1;
    }

    Args { batch_size, start_mode }
}

fn main() {
    fpv_common::logging::init("info");
    let args = parse_args();

    hardening::apply();

    let shutdown = Arc::new(ShutdownFlag::new());
    let mode_flag = Arc::new(ModeFlag::new(args.start_mode));
    {
        let shutdown = shutdown.clone();
        let mode_flag = mode_flag.clone();
        fpv_common::signal::spawn_sigwait_thread(
            &[libc::SIGUSR1, libc::SIGUSR2, libc::SIGQUIT, libc::SIGHUP, libc::SIGINT, libc::SIGTERM],
            move |sig| match sig {
                libc::SIGUSR1 => mode_flag.set(Mode::Unicast),
                libc::SIGUSR2 => mode_flag.set(Mode::BroadcastAltPort),
                libc::SIGQUIT => mode_flag.set(Mode::Both),
                libc::SIGHUP => mode_flag.set(Mode::BroadcastSamePort),
                _ => shutdown.set(),
            },
        );
    }

    let in_sock = UdpSocket::bind(("127.0.0.1", IN_PORT)).unwrap_or_else(|err| {
        eprintln!("bind failed: {err}");
        std::process::exit(1);
    });
    in_sock.set_read_timeout(Some(Duration::from_millis(200))).expect("set_read_timeout");
    let out_sock = UdpSocket::bind("0.0.0.0:0").unwrap_or_else(|err| {
        eprintln!("socket failed: {err}");
        std::process::exit(1);
    });
    out_sock.set_broadcast(true).ok();

    let dests = Destinations::default();
    let clock = fpv_common::clock::MonotonicClock::default();
    let mut packet_count: u64 = 0;
    let mut bytes_count: u64 = 0;
    let mut last_report_ms = clock.now_ms();
    let mut buf = [0u8; BUF_SIZE];

    while !shutdown.is_set() {
        let len = match in_sock.recv(&mut buf) {
            Ok(n) => n,
            Err(_) => continue,
        };
        if len == 0 {
            continue;
        }
        packet_count += 1;
        bytes_count += len as u64;

        let mode = mode_flag.get();
        for (dest, dup) in targets_for(mode, &dests, args.batch_size) {
            for _ in 0..dup {
                let _ = out_sock.send_to(&buf[..len], dest);
            }
        }

        let now = clock.now_ms();
        if now.saturating_sub(last_report_ms) >= 1000 {
            let mbps = (bytes_count as f64 * 8.0) / 1e6;
            println!("{packet_count} packets ({mbps:.2} Mbps) last sec, mode={}", mode.name());
            packet_count = 0;
            bytes_count = 0;
            last_report_ms = now;
        }
    }
}
