//! Shutdown signalling.
//!
//! A single [`CancellationToken`] is the process-wide "keep running" flag.
//! SIGINT, SIGTERM and SIGHUP cancel it from a dedicated signal thread;
//! cancellation is one-way, so once cancelled the server only winds down.

use std::os::raw::c_int;
use std::time::Duration;

use anyhow::{Context, Result};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use tokio_util::sync::CancellationToken;

/// Register termination signals to cancel `shutdown`.
///
/// Must be called before the endpoint is created so a signal arriving
/// during startup still tears the server down cleanly.
pub fn install_signal_handlers(shutdown: CancellationToken) -> Result<()> {
    cancel_on_signals(&[SIGINT, SIGTERM, SIGHUP], shutdown)?;
    Ok(())
}

/// Cancel `shutdown` when any of `signals` arrives.
///
/// The returned handle stops the signal thread when closed.
pub fn cancel_on_signals(signals: &[c_int], shutdown: CancellationToken) -> Result<Handle> {
    let mut signals = Signals::new(signals).context("Failed to register signal handlers")?;
    let handle = signals.handle();

    std::thread::Builder::new()
        .name("motionctl-signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                if !shutdown.is_cancelled() {
                    log::info!("[Controller] Shutdown signal received ({signal})");
                }
                shutdown.cancel();
            }
        })
        .context("Failed to spawn signal thread")?;

    Ok(handle)
}

/// Sleep for `duration` unless `shutdown` fires first.
///
/// Returns `true` if the sleep was cut short by cancellation.
pub async fn sleep_or_cancel(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => true,
        () = tokio::time::sleep(duration) => false,
    }
}
