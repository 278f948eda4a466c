//! Two-stage configuration: every field is parsed into an `Option<T>` on
//! `*Input`, then `.resolve()` fills gaps from defaults and clamps, reading
//! an INI file rather than TOML.

use fpv_common::ini::IniDocument;
use fpv_common::net::{parse_mac, Mac};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Master,
    Sta,
}

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub iface: String,
    pub ip: String,
    pub mac: Mac,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub role: Role,
    pub poll_ms: u64,
    pub hyst_ms: u64,
    pub hyst_db: i32,
    pub floor_db: i32,
    pub ping_to_ms: u64,
    pub ping_fail_max: u8,
    pub http_port: u16,
    pub http_timeout_s: u64,
    pub html_path: String,
    pub master_iface: String,
    pub master_ip: String,
    pub stations: Vec<StationConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role: Role::Sta,
            poll_ms: 500,
            hyst_ms: 2000,
            hyst_db: 20,
            floor_db: -40,
            ping_to_ms: 300,
            ping_fail_max: 3,
            http_port: 8080,
            http_timeout_s: 1,
            html_path: "/etc/linkmgrd.html".into(),
            master_iface: "wlan0".into(),
            master_ip: String::new(),
            stations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigInput {
    pub role: Option<Role>,
    pub poll_ms: Option<u64>,
    pub hyst_ms: Option<u64>,
    pub hyst_db: Option<i32>,
    pub floor_db: Option<i32>,
    pub ping_to_ms: Option<u64>,
    pub ping_fail_max: Option<u8>,
    pub http_port: Option<u16>,
    pub http_timeout_s: Option<u64>,
    pub html_path: Option<String>,
    pub master_iface: Option<String>,
    pub master_ip: Option<String>,
    pub stations: Vec<(String, String, String)>, // (iface, ip, mac)
}

impl ConfigInput {
    pub fn from_ini(doc: &IniDocument) -> Self {
        let role = doc.get("general", "role").map(|v| match v {
            "master" => Role::Master,
            _ => Role::Sta,
        });
        let mut stations = Vec::new();
        for section in doc.numbered_sections("sta") {
            let iface = doc.get(&section, "iface").unwrap_or_default().to_string();
            let ip = doc.get(&section, "ip").unwrap_or_default().to_string();
            let mac = doc.get(&section, "mac").unwrap_or_default().to_string();
            if !iface.is_empty() && !ip.is_empty() && !mac.is_empty() {
                stations.push((iface, ip, mac));
            }
        }
        Self {
            role,
            poll_ms: doc.get_parsed("general", "poll_interval_ms"),
            hyst_ms: doc.get_parsed("general", "hysteresis_ms"),
            hyst_db: doc.get_parsed("general", "hysteresis_db"),
            floor_db: doc.get_parsed("general", "floor_db"),
            ping_to_ms: doc.get_parsed("general", "ping_timeout_ms"),
            ping_fail_max: doc.get_parsed("general", "ping_fail_max"),
            http_port: doc.get_parsed("general", "http_port"),
            http_timeout_s: doc.get_parsed("general", "http_timeout_s"),
            html_path: doc.get("general", "html_path").map(str::to_string),
            master_iface: doc.get("master", "master_iface").map(str::to_string),
            master_ip: doc.get("sta", "master_ip").map(str::to_string),
            stations,
        }
    }

    pub fn resolve(self) -> Result<Config, fpv_common::error::ConfigError> {
        let defaults = Config::default();
        let mut stations = Vec::new();
        for (iface, ip, mac) in &self.stations {
            let Some(mac) = parse_mac(mac) else {
                return Err(fpv_common::error::ConfigError::Invalid {
                    section: "staN".into(),
                    key: "mac".into(),
                    value: mac.clone(),
                });
            };
            stations.push(StationConfig {
                iface: iface.clone(),
                ip: ip.clone(),
                mac,
            });
        }
        Ok(Config {
            role: self.role.unwrap_or(defaults.role),
            poll_ms: self.poll_ms.unwrap_or(defaults.poll_ms).max(10),
            hyst_ms: self.hyst_ms.unwrap_or(defaults.hyst_ms).max(10),
            hyst_db: self.hyst_db.unwrap_or(defaults.hyst_db),
            floor_db: self.floor_db.unwrap_or(defaults.floor_db),
            ping_to_ms: self.ping_to_ms.unwrap_or(defaults.ping_to_ms),
            ping_fail_max: self.ping_fail_max.unwrap_or(defaults.ping_fail_max).max(1),
            http_port: self.http_port.unwrap_or(defaults.http_port),
            http_timeout_s: self.http_timeout_s.unwrap_or(defaults.http_timeout_s),
            html_path: self.html_path.unwrap_or(defaults.html_path),
            master_iface: self.master_iface.unwrap_or(defaults.master_iface),
            master_ip: self.master_ip.unwrap_or(defaults.master_ip),
            stations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_defaults_when_ini_is_empty() {
        let doc = IniDocument::parse("");
        let cfg = ConfigInput::from_ini(&doc).resolve().unwrap();
        assert_eq!(cfg.poll_ms, 500);
        assert_eq!(cfg.hyst_db, 20);
        assert_eq!(cfg.role, Role::Sta);
    }

    #[test]
    fn parses_master_role_and_stations() {
        let doc = IniDocument::parse(
            "[general]\nrole=master\nhysteresis_db=10\n\
             [sta0]\niface=wlan0\nip=192.168.0.11\nmac=AA:BB:CC:DD:EE:01\n",
        );
        let cfg = ConfigInput::from_ini(&doc).resolve().unwrap();
        assert_eq!(cfg.role, Role::Master);
        assert_eq!(cfg.hyst_db, 10);
        assert_eq!(cfg.stations.len(), 1);
        assert_eq!(cfg.stations[0].ip, "192.168.0.11");
    }

    #[test]
    fn rejects_malformed_station_mac() {
        let doc = IniDocument::parse("[sta0]\niface=wlan0\nip=10.0.0.1\nmac=bad\n");
        assert!(ConfigInput::from_ini(&doc).resolve().is_err());
    }
}
