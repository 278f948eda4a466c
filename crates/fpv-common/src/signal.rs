//! Synchronous signal delivery: block a dedicated thread in `sigwait` on a
//! fixed set of signals and invoke a caller-supplied dispatch function for
//! each one received. The dispatch function must only touch atomics; it
//! runs on the signal thread, not inside a real signal handler, so it is
//! not restricted to async-signal-safe calls, but the whole point of this
//! module is that the *main loop* never blocks inside a handler: it polls
//! the atomics the dispatch function sets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static HANDLER_SET: AtomicBool = AtomicBool::new(false);

/// Spawn the signal-delivery thread for `signals`, blocking all of them on
/// every other thread first (so only the dedicated thread ever receives
/// them via `sigwait`). Panics if called more than once per process.
pub fn spawn_sigwait_thread<F>(signals: &[libc::c_int], mut dispatch: F)
where
    F: FnMut(libc::c_int) + Send + 'static,
{
    if HANDLER_SET.swap(true, Ordering::SeqCst) {
        panic!("spawn_sigwait_thread called more than once");
    }

    let mut set: libc::sigset_t = unsafe { std::mem::zeroed() };
    unsafe {
        libc::sigemptyset(&mut set);
        for &sig in signals {
            libc::sigaddset(&mut set, sig);
        }
        // Block on the calling thread (and therefore all threads spawned
        // after this point inherit the mask) so delivery is funneled to
        // the dedicated sigwait thread below.
        libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
    }

    let set = Arc::new(set);
    std::thread::Builder::new()
        .name("signal".into())
        .spawn(move || loop {
            let mut received: libc::c_int = 0;
            let rc = unsafe { libc::sigwait(&*set, &mut received) };
            if rc == 0 {
                dispatch(received);
            }
        })
        .expect("failed to spawn signal thread");
}

/// Flags a cooperative loop polls once per tick. All setters run on the
/// signal thread; all getters/clears run on the main loop thread.
#[derive(Default)]
pub struct ShutdownFlag(AtomicBool);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct ReloadFlag(AtomicBool);

impl ReloadFlag {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    /// Returns true (once) if a reload was requested, clearing the flag.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}
