//! MAC-address parsing/formatting shared by the link controller (comparing
//! configured station MACs) and the sniffer (matching BSSID/dest MAC and
//! deriving multicast group MACs).

pub type Mac = [u8; 6];

pub fn parse_mac(s: &str) -> Option<Mac> {
    let mut out = [0u8; 6];
    let mut parts = s.split(':');
    for byte in out.iter_mut() {
        let p = parts.next()?;
        *byte = u8::from_str_radix(p, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

pub fn format_mac(mac: &Mac) -> String {
    mac.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

pub fn mac_eq_ci(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Derives the standard Ethernet multicast MAC for an IPv4 multicast group:
/// `01:00:5E` followed by the low 23 bits of the group address.
pub fn multicast_group_mac(group: std::net::Ipv4Addr) -> Mac {
    let o = group.octets();
    [0x01, 0x00, 0x5e, o[1] & 0x7f, o[2], o[3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn parses_and_formats_round_trip() {
        let mac = parse_mac("AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(mac, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(format_mac(&mac), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn rejects_malformed_mac() {
        assert!(parse_mac("AA:BB:CC:DD:EE").is_none());
        assert!(parse_mac("not-a-mac").is_none());
    }

    #[test]
    fn multicast_group_mac_matches_standard_derivation() {
        // 239.1.2.3 -> 01:00:5e:01:02:03
        let mac = multicast_group_mac(Ipv4Addr::new(239, 1, 2, 3));
        assert_eq!(mac, [0x01, 0x00, 0x5e, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn multicast_group_mac_masks_high_bit_of_second_octet() {
        // high bit of the second IP octet is dropped (only low 23 bits of the group used)
        let mac = multicast_group_mac(Ipv4Addr::new(239, 0x81, 2, 3));
        assert_eq!(mac[3], 0x01);
    }
}
