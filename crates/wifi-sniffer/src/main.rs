mod batching;
mod frame;
mod radiotap;
mod source;
mod stats;

use std::net::UdpSocket;
use std::time::Duration;

use fpv_common::net::{parse_mac, Mac};
use fpv_common::signal::ShutdownFlag;

use batching::Batcher;
use frame::Filters;
use source::{FrameSource, PacketSocketSource};
use stats::StatsReporter;

struct Args {
    iface: String,
    bssid: Mac,
    dest_ip: String,
    dest_port: u16,
    udp_port: Option<u16>,
    dest_mac: Option<Mac>,
    group_ip: Option<std::net::Ipv4Addr>,
    batch: usize,
    cpu: Option<usize>,
}

fn parse_args() -> Result<Args, String> {
    let argv: Vec<String> = std::env::args().collect();
    if argv.len() < 5 {
        return Err(format!(
            "usage: {} IFACE BSSID DEST_IP DEST_PORT [--udp-port N] [--dest-mac XX:..] [--group-ip A.B.C.D] [--batch N] [--cpu N]",
            argv.first().map(String::as_str).unwrap_or("wifi-sniffer")
        ));
    }
    let iface = argv[1].clone();
    let bssid = parse_mac(&argv[2]).ok_or("bad BSSID")?;
    let dest_ip = argv[3].clone();
    let dest_port: u16 = argv[4].parse().map_err(|_| "bad DEST_PORT")?;

    let mut udp_port = None;
    let mut dest_mac = None;
    let mut group_ip = None;
    let mut batch = 16usize;
    let mut cpu = None;

    let mut i = 5;
    while i < argv.len() {
        match argv[i].as_str() {
            "--udp-port" => {
                i += 1;
                udp_port = Some(argv.get(i).ok_or("missing --udp-port value")?.parse().map_err(|_| "bad --udp-port")?);
            }
            "--dest-mac" => {
                i += 1;
                dest_mac = Some(parse_mac(argv.get(i).ok_or("missing --dest-mac value")?).ok_or("bad --dest-mac")?);
            }
            "--group-ip" => {
                i += 1;
                group_ip = Some(argv.get(i).ok_or("missing --group-ip value")?.parse().map_err(|_| "bad --group-ip")?);
            }
            "--batch" => {
                i += 1;
                batch = argv.get(i).ok_or("missing --batch value")?.parse().map_err(|_| "bad --batch")?;
            }
            "--cpu" => {
                i += 1;
                cpu = Some(argv.get(i).ok_or("missing --cpu value")?.parse().map_err(|_| "bad --cpu")?);
            }
            other => return Err(format!("unknown option {other}")),
        }
        i += 1;
    }

    Ok(Args { iface, bssid, dest_ip, dest_port, udp_port, dest_mac, group_ip, batch, cpu })
}

fn pin_cpu(cpu: usize) {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) == 0 {
            tracing::info!(cpu, "pinned to cpu");
        } else {
            tracing::warn!(cpu, "sched_setaffinity failed");
        }
    }
}

fn group_mac_for(ip: std::net::Ipv4Addr) -> Mac {
    fpv_common::net::multicast_group_mac(ip)
}

fn main() {
    fpv_common::logging::init("info");

    let args = match parse_args() {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(1);
        }
    };

    if let Some(cpu) = args.cpu {
        pin_cpu(cpu);
    }

    let shutdown = std::sync::Arc::new(ShutdownFlag::new());
    {
        let shutdown = shutdown.clone();
        fpv_common::signal::spawn_sigwait_thread(&[libc::SIGINT, libc::SIGTERM], move |_| shutdown.set());
    }

    let mut source = match PacketSocketSource::bind(&args.iface) {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(%err, iface = %args.iface, "failed to bind monitor socket");
            std::process::exit(1);
        }
    };

    let sock = match UdpSocket::bind("0.0.0.0:0") {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(%err, "failed to open udp output socket");
            std::process::exit(1);
        }
    };
    if let Err(err) = sock.connect((args.dest_ip.as_str(), args.dest_port)) {
        tracing::error!(%err, "failed to connect udp output socket");
        std::process::exit(1);
    }
    let mut batcher = Batcher::new(sock, args.batch);

    let group_mac = args.group_ip.map(group_mac_for);
    let filters = Filters {
        bssid: &args.bssid,
        dest_mac: args.dest_mac.as_ref(),
        group_mac: group_mac.as_ref(),
        udp_port: args.udp_port,
    };

    let clock = fpv_common::clock::MonotonicClock::default();
    let mut stats = StatsReporter::new(clock.now_ms());
    let mut buf = vec![0u8; 2048];

    while !shutdown.is_set() {
        if let Some(n) = source.next_frame(Duration::from_millis(100), &mut buf) {
            process_frame(&buf[..n], &filters, &mut batcher, &mut stats);
        }
        let now = clock.now_ms();
        if stats.due(now) {
            let sent = batcher.flush();
            if sent > 0 {
                stats.record_fwd(sent as u64);
            }
        }
        if let Some(line) = stats.maybe_report(now) {
            println!("{line}");
        }
    }
}

fn process_frame(raw: &[u8], filters: &Filters, batcher: &mut Batcher, stats: &mut StatsReporter) {
    let Some(rtap) = radiotap::parse(raw) else {
        return;
    };
    if rtap.fcs_bad {
        stats.record_badfcs();
        return;
    }
    if rtap.header_len >= raw.len() {
        return;
    }
    let mac_frame = &raw[rtap.header_len..];
    let Some(extracted) = frame::extract(mac_frame, filters) else {
        return;
    };
    stats.record_recv();
    let sent = batcher.push(extracted.datagram);
    if sent > 0 {
        stats.record_fwd(sent as u64);
    }
}
