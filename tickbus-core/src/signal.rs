//! Process shutdown flag wired to SIGINT and SIGTERM.
//!
//! Handlers only flip an atomic; every polling loop in the process is
//! expected to check [`shutdown_requested`] between frames and wind down on
//! its own.

use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(_signum: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Installs the SIGINT and SIGTERM handlers. Call once at process start.
pub fn install() {
    unsafe {
        libc::signal(libc::SIGINT, handle_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_signal as libc::sighandler_t);
    }
}

/// True once any shutdown signal has been observed.
pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Flips the flag programmatically, as the signals would.
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::SeqCst);
}
