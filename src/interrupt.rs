//! SIGINT as a cooperative stop flag for the batch exporter.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT into [`flag`] instead of terminating the process.
pub fn install() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // The handler only stores to an atomic, which is async-signal-safe.
    unsafe { signal::sigaction(Signal::SIGINT, &action) }.context("install SIGINT handler")?;
    Ok(())
}

pub fn flag() -> &'static AtomicBool {
    &INTERRUPTED
}
