//! 802.11 frame validation and UDP payload extraction, applied to the bytes
//! that follow the radiotap header. Mirrors the capture's filter chain:
//! to-DS only, BSSID match, optional destination/group MAC match, QoS header
//! length adjustment, then IPv4/IPv6 + UDP parsing.

use fpv_common::net::Mac;

pub struct Filters<'a> {
    pub bssid: &'a Mac,
    pub dest_mac: Option<&'a Mac>,
    pub group_mac: Option<&'a Mac>,
    pub udp_port: Option<u16>,
}

/// A forwarding-ready UDP datagram (header + payload), as a byte range into
/// the original capture buffer.
pub struct Extracted<'a> {
    pub datagram: &'a [u8],
}

const MAC_HDR_LEN: usize = 24;
const LLC_SNAP_LEN: usize = 8;
const MAX_PKT: usize = 1600;

pub fn extract<'a>(mac_frame: &'a [u8], filters: &Filters) -> Option<Extracted<'a>> {
    if mac_frame.len() < MAC_HDR_LEN {
        return None;
    }
    let fc = u16::from(mac_frame[0]) | (u16::from(mac_frame[1]) << 8);
    let to_ds = (fc >> 8) & 1 == 1;
    let from_ds = (fc >> 9) & 1 == 1;
    if !to_ds || from_ds {
        return None;
    }

    let addr1: Mac = mac_frame[4..10].try_into().ok()?;
    let addr2: Mac = mac_frame[10..16].try_into().ok()?;
    if &addr2 != filters.bssid {
        return None;
    }
    if let Some(dest) = filters.dest_mac {
        if &addr1 != dest {
            return None;
        }
    }
    if let Some(group) = filters.group_mac {
        if &addr1 != group {
            return None;
        }
    }

    let is_qos = (fc >> 7) & 1 == 1 && (fc & 0x0c) == 0x08;
    let mut off = MAC_HDR_LEN + if is_qos { 2 } else { 0 };
    off += LLC_SNAP_LEN; // LLC/SNAP header, unconditionally skipped like the original
    if off >= mac_frame.len() {
        return None;
    }

    let ip = &mac_frame[off..];
    let version = ip[0] >> 4;
    let (udp_off, udp_dst_port, udp_len) = match version {
        4 => {
            let ihl = ((ip[0] & 0x0f) as usize) * 4;
            if ihl < 20 || ip.len() < ihl + 8 {
                return None;
            }
            let udp = &ip[ihl..];
            (off + ihl, u16::from_be_bytes([udp[2], udp[3]]), u16::from_be_bytes([udp[4], udp[5]]))
        }
        6 => {
            if ip.len() < 40 + 8 {
                return None;
            }
            let udp = &ip[40..];
            (off + 40, u16::from_be_bytes([udp[2], udp[3]]), u16::from_be_bytes([udp[4], udp[5]]))
        }
        _ => return None,
    };

    if let Some(port) = filters.udp_port {
        if udp_dst_port != port {
            return None;
        }
    }
    if udp_len as usize + 8 > MAX_PKT {
        return None;
    }

    let end = udp_off + udp_len as usize;
    if end > mac_frame.len() {
        return None;
    }
    Some(Extracted { datagram: &mac_frame[udp_off..end] })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_frame(qos: bool, bssid: Mac, dest: Mac, udp_port: u16, payload: &[u8]) -> Vec<u8> {
        // bit8 = to-DS, bit7+bits2-3 = QoS Data subtype marker.
        let fc: u16 = if qos { 0x0100 | 0x0080 | 0x0008 } else { 0x0100 };
        let mut buf = vec![0u8; MAC_HDR_LEN + if qos { 2 } else { 0 } + LLC_SNAP_LEN];
        buf[0..2].copy_from_slice(&fc.to_le_bytes());
        buf[4..10].copy_from_slice(&dest);
        buf[10..16].copy_from_slice(&bssid);

        let mut udp = vec![0u8; 8 + payload.len()];
        udp[0..2].copy_from_slice(&1234u16.to_be_bytes()); // src port
        udp[2..4].copy_from_slice(&udp_port.to_be_bytes());
        udp[4..6].copy_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
        udp[8..].copy_from_slice(payload);

        let mut ip = vec![0u8; 20];
        ip[0] = 0x45;
        ip.extend_from_slice(&udp);

        buf.extend_from_slice(&ip);
        buf
    }

    #[test]
    fn extracts_udp_datagram_from_non_qos_to_ds_frame() {
        let bssid = [1, 2, 3, 4, 5, 6];
        let dest = [0xaa; 6];
        let frame = build_frame(false, bssid, dest, 5600, b"hello");
        let filters = Filters { bssid: &bssid, dest_mac: None, group_mac: None, udp_port: None };
        let extracted = extract(&frame, &filters).unwrap();
        assert_eq!(&extracted.datagram[8..], b"hello");
    }

    #[test]
    fn rejects_frame_with_mismatched_bssid() {
        let bssid = [1, 2, 3, 4, 5, 6];
        let other = [9, 9, 9, 9, 9, 9];
        let dest = [0xaa; 6];
        let frame = build_frame(false, other, dest, 5600, b"x");
        let filters = Filters { bssid: &bssid, dest_mac: None, group_mac: None, udp_port: None };
        assert!(extract(&frame, &filters).is_none());
    }

    #[test]
    fn udp_port_filter_rejects_non_matching_destination_port() {
        let bssid = [1, 2, 3, 4, 5, 6];
        let dest = [0xaa; 6];
        let frame = build_frame(false, bssid, dest, 5600, b"x");
        let filters = Filters { bssid: &bssid, dest_mac: None, group_mac: None, udp_port: Some(9999) };
        assert!(extract(&frame, &filters).is_none());
    }

    #[test]
    fn rejects_datagram_whose_udp_len_plus_header_exceeds_max_pkt() {
        let bssid = [1, 2, 3, 4, 5, 6];
        let dest = [0xaa; 6];
        let oversized = vec![0u8; MAX_PKT];
        let frame = build_frame(false, bssid, dest, 5600, &oversized);
        let filters = Filters { bssid: &bssid, dest_mac: None, group_mac: None, udp_port: None };
        assert!(extract(&frame, &filters).is_none());
    }

    #[test]
    fn qos_frame_skips_the_extra_two_byte_qos_control_field() {
        let bssid = [1, 2, 3, 4, 5, 6];
        let dest = [0xaa; 6];
        let frame = build_frame(true, bssid, dest, 5600, b"qos-ok");
        let filters = Filters { bssid: &bssid, dest_mac: None, group_mac: None, udp_port: None };
        let extracted = extract(&frame, &filters).unwrap();
        assert_eq!(&extracted.datagram[8..], b"qos-ok");
    }
}
