//! Blocking status server: `GET /status` (JSON) and `GET /` (static HTML from
//! `html_path`, if it exists). The listener is set non-blocking so a poll of
//! it from the main tick loop never stalls the poll/decide/watchdog cycle.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use crate::config::Role;
use crate::decide::LinkState;
use crate::station::Station;

pub struct StatusServer {
    listener: TcpListener,
}

impl StatusServer {
    pub fn bind(port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        Ok(Self { listener })
    }

    /// Accepts and serves at most one pending connection; a no-op if none is
    /// waiting. Called once per tick from the main loop.
    pub fn poll_once(&self, role: &Role, state: LinkState, stations: &[Station], html_path: &str, timeout: Duration) {
        let Ok((stream, _)) = self.listener.accept() else {
            return;
        };
        let _ = stream.set_read_timeout(Some(timeout));
        let _ = stream.set_write_timeout(Some(timeout));
        serve(stream, role, state, stations, html_path);
    }
}

fn serve(mut stream: TcpStream, role: &Role, state: LinkState, stations: &[Station], html_path: &str) {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut header = String::new();
    loop {
        header.clear();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => break,
            Ok(_) if header.trim().is_empty() => break,
            _ => {}
        }
    }

    let (status, content_type, body) = if request_line.starts_with("GET /status") {
        ("200 OK", "application/json", status_json(role, state, stations))
    } else if request_line.starts_with("GET / ") || request_line.starts_with("GET / H") {
        match std::fs::read_to_string(html_path) {
            Ok(html) => ("200 OK", "text/html; charset=utf-8", html),
            Err(_) => ("404 Not Found", "text/plain", "no status page configured".to_string()),
        }
    } else {
        ("404 Not Found", "text/plain", "not found".to_string())
    };

    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
}

fn status_json(role: &Role, state: LinkState, stations: &[Station]) -> String {
    let role_s = match role {
        Role::Master => "master",
        Role::Sta => "sta",
    };
    let state_s = match state {
        LinkState::Init => "init",
        LinkState::Selected => "selected",
        LinkState::Searching => "searching",
        LinkState::Down => "down",
    };
    let nodes: Vec<String> = stations
        .iter()
        .map(|s| {
            format!(
                "{{\"ip\":\"{}\",\"rssi\":{},\"fail\":{}}}",
                s.cfg.ip, s.rssi_dbm, s.ping_fail_count
            )
        })
        .collect();
    format!(
        "{{\"role\":\"{role_s}\",\"state\":\"{state_s}\",\"nodes\":[{}]}}",
        nodes.join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;
    use std::net::TcpStream as ClientStream;

    fn station(ip: &str, rssi: i32) -> Station {
        let mut s = Station::new(StationConfig {
            iface: "wlan0".into(),
            ip: ip.into(),
            mac: [0; 6],
        });
        s.rssi_dbm = rssi;
        s
    }

    #[test]
    fn status_json_includes_role_state_and_nodes() {
        let json = status_json(&Role::Master, LinkState::Selected, &[station("10.0.0.1", -40)]);
        assert!(json.contains("\"role\":\"master\""));
        assert!(json.contains("\"state\":\"selected\""));
        assert!(json.contains("\"ip\":\"10.0.0.1\""));
        assert!(json.contains("\"rssi\":-40"));
    }

    #[test]
    fn serves_status_over_a_real_loopback_connection() {
        let server = StatusServer::bind(0).unwrap();
        let addr = server.listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let mut client = ClientStream::connect(addr).unwrap();
            client.write_all(b"GET /status HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
            let mut buf = String::new();
            client.read_to_string(&mut buf).unwrap();
            buf
        });
        // give the client a moment to connect before polling
        std::thread::sleep(Duration::from_millis(20));
        server.poll_once(&Role::Sta, LinkState::Down, &[], "/nonexistent", Duration::from_millis(500));
        let response = handle.join().unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("\"role\":\"sta\""));
    }
}
