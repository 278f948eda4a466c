//! Reads the MCS/channel-width telemetry file the radio driver refreshes
//! out-of-band. Format is a flat `key=value` file, not INI sections.

use std::io::Read;

#[derive(Debug, Clone, Copy)]
pub struct Telemetry {
    pub mcs: i32,
    pub width: u32,
}

/// Returns `None` if the file is missing, unreadable, or doesn't contain
/// both keys with a valid (mcs >= 0, width > 0) reading.
pub fn read_telem_file(path: &str, key_mcs: &str, key_width: &str) -> Option<Telemetry> {
    let mut file = std::fs::File::open(path).ok()?;
    let mut text = String::new();
    file.read_to_string(&mut text).ok()?;

    let mut mcs: Option<i32> = None;
    let mut width: Option<u32> = None;
    for line in text.lines() {
        let s = line.split(['#', ';']).next().unwrap_or("").trim();
        if s.is_empty() {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let (k, v) = (k.trim(), v.trim());
        if k == key_mcs {
            mcs = v.parse().ok();
        } else if k == key_width {
            width = v.parse().ok();
        }
    }
    match (mcs, width) {
        (Some(m), Some(w)) if m >= 0 && w > 0 => Some(Telemetry { mcs: m, width: w }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_mcs_and_width_ignoring_comments() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "# comment\nmcs=5\nwidth=40\n").unwrap();
        let t = read_telem_file(f.path().to_str().unwrap(), "mcs", "width").unwrap();
        assert_eq!(t.mcs, 5);
        assert_eq!(t.width, 40);
    }

    #[test]
    fn rejects_incomplete_telemetry() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "mcs=5\n").unwrap();
        assert!(read_telem_file(f.path().to_str().unwrap(), "mcs", "width").is_none());
    }

    #[test]
    fn missing_file_returns_none() {
        assert!(read_telem_file("/nonexistent/path", "mcs", "width").is_none());
    }
}
