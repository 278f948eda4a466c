//! Real-time scheduling hardening: SCHED_FIFO priority 20, locked memory,
//! pinned to CPU 0. Every step is best-effort: an unprivileged process
//! still runs correctly, just without the latency guarantees.

use tracing::warn;

pub fn apply() {
    unsafe {
        let sp = libc::sched_param { sched_priority: 20 };
        if libc::sched_setscheduler(0, libc::SCHED_FIFO, &sp) != 0 {
            warn!("SCHED_FIFO unavailable, continuing with default scheduling");
        }
        if libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) != 0 {
            warn!("mlockall failed, pages may be swapped");
        }
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(0, &mut set);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
            warn!("failed to pin to cpu 0");
        }
    }
}
