//! HTTP/1.1 control API. Every route is reachable both at its canonical
//! `/api/v1/...` path and a legacy bare alias (`/status` for
//! `/api/v1/status`), matching the original tool's backward-compatible
//! routing. The listener is non-blocking so polling it from the tick loop
//! never stalls shaping.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use fpv_common::ini::IniDocument;

use crate::allocation::Rates;
use crate::config::Config;

pub struct Snapshot<'a> {
    pub mcs: i32,
    pub width: u32,
    pub usable_kbps: u32,
    pub eff: f64,
    pub phy: f64,
    pub rates: Rates,
    pub cfg: &'a Config,
    pub cfg_path: &'a str,
}

pub struct ApiServer {
    listener: TcpListener,
}

pub enum Action {
    None,
    Reload,
}

impl ApiServer {
    pub fn bind(addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self { listener })
    }

    pub fn poll_once(&self, snapshot: &Snapshot, timeout: Duration) -> Action {
        let Ok((stream, _)) = self.listener.accept() else {
            return Action::None;
        };
        let _ = stream.set_read_timeout(Some(timeout));
        let _ = stream.set_write_timeout(Some(timeout));
        serve(stream, snapshot)
    }
}

fn strip_api_prefix(path: &str) -> &str {
    path.strip_prefix("/api/v1").unwrap_or(path)
}

fn serve(mut stream: TcpStream, snap: &Snapshot) -> Action {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return Action::None;
    }
    let mut content_len = 0usize;
    let mut header = String::new();
    loop {
        header.clear();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => break,
            Ok(_) if header.trim().is_empty() => break,
            Ok(_) => {
                if let Some(v) = header.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_len = v.trim().parse().unwrap_or(0);
                }
            }
        }
    }
    let mut body = vec![0u8; content_len];
    if content_len > 0 {
        let _ = reader.read_exact(&mut body);
    }
    let body = String::from_utf8_lossy(&body).to_string();

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let full_path = parts.next().unwrap_or("/");
    let (path, query) = full_path.split_once('?').unwrap_or((full_path, ""));
    let path = strip_api_prefix(path);

    let mut action = Action::None;
    let (status, content_type, resp_body) = match (method, path) {
        ("GET", "/status") => ("200 OK", "application/json", status_json(snap)),
        ("GET", "/config") => match std::fs::read_to_string(snap.cfg_path) {
            Ok(text) => ("200 OK", "text/plain", text),
            Err(_) => ("404 Not Found", "text/plain", "no config on disk".to_string()),
        },
        ("POST", "/config") => {
            let _ = std::fs::write(snap.cfg_path, &body);
            action = Action::Reload;
            ("200 OK", "application/json", "{\"ok\":1}".to_string())
        }
        ("GET", "/get") => {
            let q = parse_query(query);
            handle_get_kv(snap.cfg_path, &q)
        }
        ("POST", "/set") => {
            let q = parse_query(query);
            let result = handle_set_kv(snap.cfg_path, &q);
            action = Action::Reload;
            result
        }
        ("GET", "/keys") => {
            let q = parse_query(query);
            handle_keys(snap.cfg_path, &q)
        }
        ("POST", "/action/reload") | ("POST", "/reload") => {
            action = Action::Reload;
            ("200 OK", "application/json", "{\"ok\":1}".to_string())
        }
        _ => ("404 Not Found", "text/plain", "no route".to_string()),
    };

    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{resp_body}",
        resp_body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    action
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Splits a `section.name` key on its first dot, matching the original's
/// `strchr(sk, '.')` split. A key with no dot has an empty section, which
/// `handle_get_kv` then matches against any section.
fn split_section_key(raw: &str) -> (&str, &str) {
    match raw.split_once('.') {
        Some((section, key)) => (section, key),
        None => ("", raw),
    }
}

fn handle_get_kv(cfg_path: &str, q: &HashMap<String, String>) -> (&'static str, &'static str, String) {
    let Some(raw_key) = q.get("key") else {
        return ("400 Bad Request", "application/json", "{\"error\":\"missing key\"}".to_string());
    };
    let (section, key) = split_section_key(raw_key);
    let Ok(text) = std::fs::read_to_string(cfg_path) else {
        return ("404 Not Found", "application/json", "{\"error\":\"no config\"}".to_string());
    };
    let doc = IniDocument::parse(&text);
    let found = doc
        .entries()
        .iter()
        .find(|e| (section.is_empty() || e.section == section) && e.key == key);
    match found {
        Some(e) => ("200 OK", "application/json", format!("{{\"value\":\"{}\"}}", e.value)),
        None => ("404 Not Found", "application/json", "{\"error\":\"not found\"}".to_string()),
    }
}

fn handle_set_kv(cfg_path: &str, q: &HashMap<String, String>) -> (&'static str, &'static str, String) {
    let Some(raw_key) = q.get("key") else {
        return ("400 Bad Request", "application/json", "{\"error\":\"missing key\"}".to_string());
    };
    let Some(value) = q.get("value") else {
        return ("400 Bad Request", "application/json", "{\"error\":\"missing value\"}".to_string());
    };
    let (section, key) = split_section_key(raw_key);
    let Ok(text) = std::fs::read_to_string(cfg_path) else {
        return ("404 Not Found", "application/json", "{\"error\":\"no config\"}".to_string());
    };
    let mut doc = IniDocument::parse(&text);
    doc.set(section, key, value);
    match std::fs::write(cfg_path, doc.render()) {
        Ok(()) => ("200 OK", "application/json", "{\"ok\":1}".to_string()),
        Err(_) => ("500 Internal Server Error", "application/json", "{\"error\":\"write failed\"}".to_string()),
    }
}

fn escape_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// `GET /keys[?format=tree|flat&values=1&section=...&prefix=...&sort=1]`.
/// `count` in the response is always the total number of keys in the config,
/// independent of any `section`/`prefix` filtering, matching the original.
fn handle_keys(cfg_path: &str, q: &HashMap<String, String>) -> (&'static str, &'static str, String) {
    let Ok(text) = std::fs::read_to_string(cfg_path) else {
        return ("404 Not Found", "application/json", "{\"error\":\"no config\"}".to_string());
    };
    let doc = IniDocument::parse(&text);
    let total = doc.entries().len();

    let format = q.get("format").map(String::as_str).unwrap_or("flat");
    let want_values = matches!(q.get("values").map(String::as_str), Some("1") | Some("true"));
    let section_filter = q.get("section").map(String::as_str).unwrap_or("");
    let prefix_filter = q.get("prefix").map(String::as_str).unwrap_or("");
    let do_sort = !matches!(q.get("sort").map(String::as_str), Some("0") | Some("false"));

    let mut entries: Vec<_> = doc.entries().iter().collect();
    if do_sort {
        entries.sort_by(|a, b| (a.section.as_str(), a.key.as_str()).cmp(&(b.section.as_str(), b.key.as_str())));
    }
    let filtered: Vec<_> = entries
        .into_iter()
        .filter(|e| section_filter.is_empty() || e.section == section_filter)
        .filter(|e| prefix_filter.is_empty() || e.key.starts_with(prefix_filter))
        .collect();

    let body = if format == "tree" {
        render_keys_tree(&filtered, want_values, total)
    } else {
        render_keys_flat(&filtered, want_values, total)
    };
    ("200 OK", "application/json", body)
}

fn render_keys_flat(entries: &[&fpv_common::ini::IniEntry], want_values: bool, total: usize) -> String {
    let items: Vec<String> = entries
        .iter()
        .map(|e| {
            if want_values {
                format!("{{\"k\":\"{}.{}\",\"v\":\"{}\"}}", e.section, e.key, escape_json(&e.value))
            } else {
                format!("\"{}.{}\"", e.section, e.key)
            }
        })
        .collect();
    format!("{{\"keys\":[{}],\"count\":{total}}}", items.join(","))
}

fn render_keys_tree(entries: &[&fpv_common::ini::IniEntry], want_values: bool, total: usize) -> String {
    let mut sections: Vec<(&str, Vec<String>)> = Vec::new();
    for e in entries {
        let item = if want_values {
            format!("\"{}\":\"{}\"", e.key, escape_json(&e.value))
        } else {
            format!("\"{}\"", e.key)
        };
        match sections.last_mut() {
            Some((sec, items)) if *sec == e.section => items.push(item),
            _ => sections.push((e.section.as_str(), vec![item])),
        }
    }
    let body = sections
        .iter()
        .map(|(sec, items)| format!("\"{}\":{{{}}}", sec, items.join(",")))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{\"sections\":{{{body}}},\"count\":{total}}}")
}

fn status_json(snap: &Snapshot) -> String {
    let r = &snap.rates;
    format!(
        "{{\"mcs\":{},\"width\":{},\"phy_mbps\":{:.2},\"eff\":{:.2},\"usable_kbps\":{},\"alloc_kbps\":{},\
         \"video\":{{\"rate_kbps\":{},\"ceil_kbps\":{}}},\
         \"mavlink\":{{\"rate_kbps\":{},\"ceil_kbps\":{}}},\
         \"tunnel\":{{\"rate_kbps\":{},\"ceil_kbps\":{}}},\
         \"default\":{{\"rate_kbps\":{},\"ceil_kbps\":{}}}}}",
        snap.mcs,
        snap.width,
        snap.phy,
        snap.eff,
        snap.usable_kbps,
        r.alloc_total,
        r.video.rate_kbps,
        r.video.ceil_kbps,
        r.mavlink.rate_kbps,
        r.mavlink.ceil_kbps,
        r.tunnel.rate_kbps,
        r.tunnel.ceil_kbps,
        r.default_class.rate_kbps,
        r.default_class.ceil_kbps,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_api_v1_prefix_but_passes_through_legacy_paths() {
        assert_eq!(strip_api_prefix("/api/v1/status"), "/status");
        assert_eq!(strip_api_prefix("/status"), "/status");
    }

    #[test]
    fn parse_query_splits_key_value_pairs() {
        let q = parse_query("section=general&key=wlan");
        assert_eq!(q.get("section").map(String::as_str), Some("general"));
        assert_eq!(q.get("key").map(String::as_str), Some("wlan"));
    }

    #[test]
    fn split_section_key_splits_on_first_dot() {
        assert_eq!(split_section_key("general.wlan"), ("general", "wlan"));
        assert_eq!(split_section_key("wlan"), ("", "wlan"));
        assert_eq!(split_section_key("class.video.mark"), ("class", "video.mark"));
    }

    #[test]
    fn get_then_set_round_trips_through_a_dotted_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trafficctrl.conf");
        std::fs::write(&path, "[general]\nwlan = wlan0\n").unwrap();
        let path = path.to_str().unwrap();

        let mut q = HashMap::new();
        q.insert("key".to_string(), "general.wlan".to_string());
        q.insert("value".to_string(), "wlan1".to_string());
        let (status, _, _) = handle_set_kv(path, &q);
        assert_eq!(status, "200 OK");

        let mut q = HashMap::new();
        q.insert("key".to_string(), "general.wlan".to_string());
        let (status, _, body) = handle_get_kv(path, &q);
        assert_eq!(status, "200 OK");
        assert_eq!(body, "{\"value\":\"wlan1\"}");
    }

    #[test]
    fn keys_endpoint_lists_flat_and_tree_with_total_count_unfiltered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trafficctrl.conf");
        std::fs::write(&path, "[general]\nwlan = wlan0\nsample_hz = 10\n[class.video]\nmark = 1\n").unwrap();
        let path = path.to_str().unwrap();

        let (status, _, body) = handle_keys(path, &HashMap::new());
        assert_eq!(status, "200 OK");
        assert!(body.contains("\"count\":3"));
        assert!(body.contains("\"general.wlan\""));

        let mut q = HashMap::new();
        q.insert("format".to_string(), "tree".to_string());
        q.insert("section".to_string(), "general".to_string());
        let (_, _, body) = handle_keys(path, &q);
        assert!(body.contains("\"general\":{\"sample_hz\",\"wlan\"}"));
        assert!(!body.contains("class.video"));
        assert!(body.contains("\"count\":3"));
    }
}
