//! Two-stage INI configuration, same `*Input` -> `.resolve()` shape used
//! across the other daemons.

use fpv_common::ini::IniDocument;

#[derive(Debug, Clone)]
pub struct ClassConfig {
    pub mark: u32,
    pub floor_kbps: u32,
    pub min_floor_kbps: u32,
    pub ceil_max_kbps: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_addr: String,
    pub wlan: String,
    pub telem_file: String,
    pub key_mcs: String,
    pub key_width: String,
    pub sample_hz: u32,
    pub alpha: f64,
    pub hysteresis_pct: u32,
    pub hysteresis_hold_ms: u64,
    pub min_dwell_ms: u64,
    pub headroom_pct: u32,
    pub stale_ms: u64,
    pub ceil_margin_pct: u32,
    pub eff_10: f64,
    pub eff_20: f64,
    pub eff_40: f64,
    pub video: ClassConfig,
    pub mavlink: ClassConfig,
    pub tunnel: ClassConfig,
    pub default_class: ClassConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8084".into(),
            wlan: "wlan0".into(),
            telem_file: "/tmp/aalink_ext.msg".into(),
            key_mcs: "mcs".into(),
            key_width: "width".into(),
            sample_hz: 10,
            alpha: 0.5,
            hysteresis_pct: 15,
            hysteresis_hold_ms: 800,
            min_dwell_ms: 800,
            headroom_pct: 20,
            stale_ms: 2500,
            ceil_margin_pct: 15,
            eff_10: 0.55,
            eff_20: 0.60,
            eff_40: 0.58,
            video: ClassConfig { mark: 1, floor_kbps: 2000, min_floor_kbps: 0, ceil_max_kbps: 120_000 },
            mavlink: ClassConfig { mark: 10, floor_kbps: 300, min_floor_kbps: 150, ceil_max_kbps: 2000 },
            tunnel: ClassConfig { mark: 20, floor_kbps: 200, min_floor_kbps: 0, ceil_max_kbps: 3000 },
            default_class: ClassConfig { mark: 0, floor_kbps: 5, min_floor_kbps: 0, ceil_max_kbps: 500 },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigInput {
    pub http_addr: Option<String>,
    pub wlan: Option<String>,
    pub telem_file: Option<String>,
    pub key_mcs: Option<String>,
    pub key_width: Option<String>,
    pub sample_hz: Option<u32>,
    pub alpha: Option<f64>,
    pub hysteresis_pct: Option<u32>,
    pub hysteresis_hold_ms: Option<u64>,
    pub min_dwell_ms: Option<u64>,
    pub headroom_pct: Option<u32>,
    pub stale_ms: Option<u64>,
    pub ceil_margin_pct: Option<u32>,
    pub eff_10: Option<f64>,
    pub eff_20: Option<f64>,
    pub eff_40: Option<f64>,
    pub video_mark: Option<u32>,
    pub video_floor: Option<u32>,
    pub video_ceil: Option<u32>,
    pub mav_mark: Option<u32>,
    pub mav_floor: Option<u32>,
    pub mav_min_floor: Option<u32>,
    pub mav_ceil: Option<u32>,
    pub tun_mark: Option<u32>,
    pub tun_floor: Option<u32>,
    pub tun_ceil: Option<u32>,
    pub def_floor: Option<u32>,
    pub def_ceil: Option<u32>,
}

impl ConfigInput {
    pub fn from_ini(doc: &IniDocument) -> Self {
        Self {
            http_addr: doc.get("general", "http_addr").map(str::to_string),
            wlan: doc.get("general", "wlan").map(str::to_string),
            telem_file: doc.get("general", "telem_file").map(str::to_string),
            key_mcs: doc.get("general", "telem_key_mcs").map(str::to_string),
            key_width: doc.get("general", "telem_key_width").map(str::to_string),
            sample_hz: doc.get_parsed("general", "sample_hz"),
            alpha: doc.get_parsed("general", "smoothing_alpha"),
            hysteresis_pct: doc.get_parsed("general", "hysteresis_pct"),
            hysteresis_hold_ms: doc.get_parsed("general", "hysteresis_hold_ms"),
            min_dwell_ms: doc.get_parsed("general", "min_dwell_ms"),
            headroom_pct: doc.get_parsed("general", "headroom_pct"),
            stale_ms: doc.get_parsed("general", "stale_ms"),
            ceil_margin_pct: doc.get_parsed("general", "ceil_margin_pct"),
            eff_10: doc.get_parsed("general", "eff_10mhz"),
            eff_20: doc.get_parsed("general", "eff_20mhz"),
            eff_40: doc.get_parsed("general", "eff_40mhz"),
            video_mark: doc.get_parsed("class.video", "mark"),
            video_floor: doc.get_parsed("class.video", "floor_kbps"),
            video_ceil: doc.get_parsed("class.video", "ceil_kbps_max"),
            mav_mark: doc.get_parsed("class.mavlink", "mark"),
            mav_floor: doc.get_parsed("class.mavlink", "floor_kbps"),
            mav_min_floor: doc.get_parsed("class.mavlink", "min_floor_kbps"),
            mav_ceil: doc.get_parsed("class.mavlink", "ceil_kbps_max"),
            tun_mark: doc.get_parsed("class.tunnel", "mark"),
            tun_floor: doc.get_parsed("class.tunnel", "floor_kbps"),
            tun_ceil: doc.get_parsed("class.tunnel", "ceil_kbps_max"),
            def_floor: doc.get_parsed("class.default", "floor_kbps"),
            def_ceil: doc.get_parsed("class.default", "ceil_kbps_max"),
        }
    }

    pub fn resolve(self) -> Config {
        let d = Config::default();
        Config {
            http_addr: self.http_addr.unwrap_or(d.http_addr),
            wlan: self.wlan.unwrap_or(d.wlan),
            telem_file: self.telem_file.unwrap_or(d.telem_file),
            key_mcs: self.key_mcs.unwrap_or(d.key_mcs),
            key_width: self.key_width.unwrap_or(d.key_width),
            sample_hz: self.sample_hz.unwrap_or(d.sample_hz).max(1),
            alpha: self.alpha.unwrap_or(d.alpha).clamp(0.0, 1.0),
            hysteresis_pct: self.hysteresis_pct.unwrap_or(d.hysteresis_pct),
            hysteresis_hold_ms: self.hysteresis_hold_ms.unwrap_or(d.hysteresis_hold_ms),
            min_dwell_ms: self.min_dwell_ms.unwrap_or(d.min_dwell_ms),
            headroom_pct: self.headroom_pct.unwrap_or(d.headroom_pct).min(100),
            stale_ms: self.stale_ms.unwrap_or(d.stale_ms),
            ceil_margin_pct: self.ceil_margin_pct.unwrap_or(d.ceil_margin_pct),
            eff_10: self.eff_10.unwrap_or(d.eff_10),
            eff_20: self.eff_20.unwrap_or(d.eff_20),
            eff_40: self.eff_40.unwrap_or(d.eff_40),
            video: ClassConfig {
                mark: self.video_mark.unwrap_or(d.video.mark),
                floor_kbps: self.video_floor.unwrap_or(d.video.floor_kbps),
                min_floor_kbps: d.video.min_floor_kbps,
                ceil_max_kbps: self.video_ceil.unwrap_or(d.video.ceil_max_kbps),
            },
            mavlink: ClassConfig {
                mark: self.mav_mark.unwrap_or(d.mavlink.mark),
                floor_kbps: self.mav_floor.unwrap_or(d.mavlink.floor_kbps),
                min_floor_kbps: self.mav_min_floor.unwrap_or(d.mavlink.min_floor_kbps),
                ceil_max_kbps: self.mav_ceil.unwrap_or(d.mavlink.ceil_max_kbps),
            },
            tunnel: ClassConfig {
                mark: self.tun_mark.unwrap_or(d.tunnel.mark),
                floor_kbps: self.tun_floor.unwrap_or(d.tunnel.floor_kbps),
                min_floor_kbps: d.tunnel.min_floor_kbps,
                ceil_max_kbps: self.tun_ceil.unwrap_or(d.tunnel.ceil_max_kbps),
            },
            default_class: ClassConfig {
                mark: 0,
                floor_kbps: self.def_floor.unwrap_or(d.default_class.floor_kbps),
                min_floor_kbps: 0,
                ceil_max_kbps: self.def_ceil.unwrap_or(d.default_class.ceil_max_kbps),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_defaults_when_ini_is_empty() {
        let doc = IniDocument::parse("");
        let cfg = ConfigInput::from_ini(&doc).resolve();
        assert_eq!(cfg.wlan, "wlan0");
        assert_eq!(cfg.video.floor_kbps, 2000);
    }

    #[test]
    fn overrides_class_fields_from_ini() {
        let doc = IniDocument::parse("[class.mavlink]\nfloor_kbps=500\nmin_floor_kbps=100\n");
        let cfg = ConfigInput::from_ini(&doc).resolve();
        assert_eq!(cfg.mavlink.floor_kbps, 500);
        assert_eq!(cfg.mavlink.min_floor_kbps, 100);
    }

    #[test]
    fn alpha_is_clamped_to_unit_interval() {
        let doc = IniDocument::parse("[general]\nsmoothing_alpha=4.0\n");
        let cfg = ConfigInput::from_ini(&doc).resolve();
        assert_eq!(cfg.alpha, 1.0);
    }
}
