//! Minimal INI reader/writer: `[section]` headers, `key = value` pairs,
//! `#`/`;` comments, trimmed whitespace. Order-preserving so a `set()`
//! followed by a `render()` reproduces the original file byte-for-byte
//! apart from the one changed value, matching the atomic rewrite-in-place
//! behavior external config editors expect.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniEntry {
    pub section: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct IniDocument {
    entries: Vec<IniEntry>,
}

fn strip_comment(line: &str) -> &str {
    match line.find(['#', ';']) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

impl IniDocument {
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        let mut section = String::new();
        for raw in text.lines() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            if let Some(stripped) = line.strip_prefix('[') {
                if let Some(end) = stripped.find(']') {
                    section = stripped[..end].trim().to_string();
                }
                continue;
            }
            let Some(eq) = line.find('=') else { continue };
            let key = line[..eq].trim().to_string();
            let value = line[eq + 1..].trim().to_string();
            if key.is_empty() {
                continue;
            }
            entries.push(IniEntry {
                section: section.clone(),
                key,
                value,
            });
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[IniEntry] {
        &self.entries
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.section == section && e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn get_parsed<T: std::str::FromStr>(&self, section: &str, key: &str) -> Option<T> {
        self.get(section, key).and_then(|v| v.parse().ok())
    }

    /// Sections whose name starts with `prefix` followed by a numeric suffix
    /// (the `staN` convention), in ascending numeric order.
    pub fn numbered_sections(&self, prefix: &str) -> Vec<String> {
        let mut found: Vec<(u32, String)> = self
            .entries
            .iter()
            .map(|e| e.section.as_str())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .filter_map(|s| {
                s.strip_prefix(prefix)
                    .and_then(|n| n.parse::<u32>().ok())
                    .map(|n| (n, s.to_string()))
            })
            .collect();
        found.sort_by_key(|(n, _)| *n);
        found.into_iter().map(|(_, s)| s).collect()
    }

    /// Insert or replace a single key, preserving existing ordering; a new
    /// key is appended after the last entry of its section (or at the end
    /// if the section doesn't exist yet).
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        if let Some(e) = self
            .entries
            .iter_mut()
            .find(|e| e.section == section && e.key == key)
        {
            e.value = value.to_string();
            return;
        }
        let insert_at = self
            .entries
            .iter()
            .rposition(|e| e.section == section)
            .map(|i| i + 1)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            insert_at,
            IniEntry {
                section: section.to_string(),
                key: key.to_string(),
                value: value.to_string(),
            },
        );
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut current = "";
        for e in &self.entries {
            if e.section != current {
                if !current.is_empty() {
                    out.push('\n');
                }
                if !e.section.is_empty() {
                    out.push('[');
                    out.push_str(&e.section);
                    out.push_str("]\n");
                }
                current = &e.section;
            }
            out.push_str(&e.key);
            out.push_str(" = ");
            out.push_str(&e.value);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_comments() {
        let doc = IniDocument::parse(
            "[general]\n# a comment\nwlan = wlan0 ; inline comment\n\n[class.video]\nmark=1\n",
        );
        assert_eq!(doc.get("general", "wlan"), Some("wlan0"));
        assert_eq!(doc.get_parsed::<i32>("class.video", "mark"), Some(1));
    }

    #[test]
    fn missing_key_is_none() {
        let doc = IniDocument::parse("[general]\nwlan=wlan0\n");
        assert_eq!(doc.get("general", "missing"), None);
    }

    #[test]
    fn numbered_sections_sort_numerically() {
        let doc = IniDocument::parse("[sta10]\nip=1\n[sta2]\nip=2\n[sta1]\nip=3\n");
        assert_eq!(doc.numbered_sections("sta"), vec!["sta1", "sta2", "sta10"]);
    }

    #[test]
    fn set_replaces_existing_value_in_place() {
        let mut doc = IniDocument::parse("[general]\nwlan=wlan0\nsample_hz=10\n");
        doc.set("general", "wlan", "wlan1");
        assert_eq!(doc.get("general", "wlan"), Some("wlan1"));
        assert_eq!(doc.get("general", "sample_hz"), Some("10"));
    }

    #[test]
    fn set_appends_new_key_to_its_section() {
        let mut doc = IniDocument::parse("[general]\nwlan=wlan0\n[other]\nx=1\n");
        doc.set("general", "headroom_pct", "20");
        let rendered = doc.render();
        let general_block = rendered.split("[other]").next().unwrap();
        assert!(general_block.contains("headroom_pct = 20"));
    }

    #[test]
    fn round_trip_preserves_values() {
        let original = "[general]\nwlan = wlan0\nsample_hz = 10\n\n[class.video]\nmark = 1\n";
        let doc = IniDocument::parse(original);
        let rendered = doc.render();
        let reparsed = IniDocument::parse(&rendered);
        assert_eq!(reparsed.get("general", "wlan"), Some("wlan0"));
        assert_eq!(reparsed.get("class.video", "mark"), Some("1"));
    }
}
