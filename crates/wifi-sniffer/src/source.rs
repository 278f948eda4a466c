//! Capture abstraction: `FrameSource` decouples the packet loop from the
//! specific mechanism that yields radiotap-prefixed 802.11 frames, so the
//! filter/forward pipeline can be exercised with synthetic frames in tests
//! instead of a live monitor-mode interface.

use std::time::Duration;

pub trait FrameSource {
    /// Blocks up to `timeout` for the next captured frame (radiotap header
    /// included). Returns `None` on timeout; an empty capture is not an
    /// error state on a monitor-mode interface.
    fn next_frame(&mut self, timeout: Duration, buf: &mut [u8]) -> Option<usize>;
}

/// Monitor-mode capture over a raw `AF_PACKET` socket bound to `iface`. The
/// interface must already be switched to monitor mode out of band (e.g. via
/// `iw dev <iface> set type monitor`); this type only reads from it.
pub struct PacketSocketSource {
    fd: std::os::fd::OwnedFd,
}

impl PacketSocketSource {
    pub fn bind(iface: &str) -> std::io::Result<Self> {
        use std::os::fd::FromRawFd;

        let raw = unsafe { libc::socket(libc::AF_PACKET, libc::SOCK_RAW, (libc::ETH_P_ALL as u16).to_be() as i32) };
        if raw < 0 {
            return Err(std::io::Error::last_os_error());
        }
        let fd = unsafe { std::os::fd::OwnedFd::from_raw_fd(raw) };

        let idx = interface_index(iface)?;
        let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as u16;
        addr.sll_protocol = (libc::ETH_P_ALL as u16).to_be();
        addr.sll_ifindex = idx;
        let rc = unsafe {
            libc::bind(
                raw,
                &addr as *const _ as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(Self { fd })
    }
}

fn interface_index(iface: &str) -> std::io::Result<i32> {
    let cname = std::ffi::CString::new(iface).map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
    let idx = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if idx == 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(idx as i32)
}

impl FrameSource for PacketSocketSource {
    fn next_frame(&mut self, timeout: Duration, buf: &mut [u8]) -> Option<usize> {
        use std::os::fd::AsRawFd;
        let raw = self.fd.as_raw_fd();

        let mut pfd = libc::pollfd { fd: raw, events: libc::POLLIN, revents: 0 };
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout.as_millis() as libc::c_int) };
        if rc <= 0 {
            return None;
        }
        let n = unsafe { libc::recv(raw, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
        if n <= 0 {
            return None;
        }
        Some(n as usize)
    }
}

/// A queue of pre-built frames, used by tests to drive the capture loop
/// without touching the network stack.
#[derive(Default)]
pub struct SyntheticSource {
    frames: std::collections::VecDeque<Vec<u8>>,
}

impl SyntheticSource {
    pub fn push(&mut self, frame: Vec<u8>) {
        self.frames.push_back(frame);
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self, _timeout: Duration, buf: &mut [u8]) -> Option<usize> {
        let frame = self.frames.pop_front()?;
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_yields_queued_frames_in_order() {
        let mut src = SyntheticSource::default();
        src.push(vec![1, 2, 3]);
        src.push(vec![4, 5]);
        let mut buf = [0u8; 16];
        let n = src.next_frame(Duration::from_millis(1), &mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
        let n = src.next_frame(Duration::from_millis(1), &mut buf).unwrap();
        assert_eq!(&buf[..n], &[4, 5]);
        assert!(src.next_frame(Duration::from_millis(1), &mut buf).is_none());
    }
}
