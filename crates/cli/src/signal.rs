// Ctrl-C handling for batch runs
//
// The first SIGINT only raises the cancel flag; the batch loop finishes the
// current record, writes a final checkpoint and stops. The handler then
// restores the default action, so a second Ctrl-C kills the process.

use std::sync::OnceLock;

use ncm_recon::CancelToken;

static CANCEL: OnceLock<CancelToken> = OnceLock::new();

#[cfg(unix)]
extern "C" fn on_sigint(_sig: libc::c_int) {
    if let Some(token) = CANCEL.get() {
        token.cancel();
    }
    // SAFETY: signal() is async-signal-safe.
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
}

/// Route SIGINT to `token`. Only the first call per process takes effect.
pub fn install(token: &CancelToken) {
    if CANCEL.set(token.clone()).is_err() {
        return;
    }
    #[cfg(unix)]
    {
        let handler: extern "C" fn(libc::c_int) = on_sigint;
        // SAFETY: the handler only touches an atomic flag and resets itself.
        unsafe {
            libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        }
    }
    #[cfg(not(unix))]
    log::debug!("interrupt handling not available on this platform");
}
