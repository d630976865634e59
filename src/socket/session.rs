//! One connected client, from connect to disconnect.
//!
//! The session reads a frame, dispatches it, and (in duplex mode) writes
//! the reply before reading the next one, so replies leave in exactly the
//! order commands arrived. The shutdown token is checked between commands
//! and interrupts a blocked read.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

use super::channel::{is_disconnect, FrameChannel};
use super::framing;
use crate::config::{Direction, ReadRetryPolicy};
use crate::dispatch::Dispatcher;

/// Why a session returned control to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed the connection.
    PeerDisconnected,
    /// The shutdown token was cancelled.
    Shutdown,
    /// Too many consecutive read errors under a bounded retry policy.
    ErrorLimit,
}

/// Per-connection state.
#[derive(Debug)]
pub struct Session<C> {
    id: String,
    channel: C,
    direction: Direction,
    retry: ReadRetryPolicy,
    connected: bool,
    commands: u64,
}

impl<C: FrameChannel> Session<C> {
    /// Create a session over a connected channel.
    pub fn new(id: String, channel: C, direction: Direction, retry: ReadRetryPolicy) -> Self {
        Self {
            id,
            channel,
            direction,
            retry,
            connected: true,
            commands: 0,
        }
    }

    /// Session identifier used in logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `false` once [`serve`](Self::serve) has returned.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Number of commands dispatched so far.
    pub fn commands(&self) -> u64 {
        self.commands
    }

    /// Consume the session and return the channel.
    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Run the read → dispatch → reply loop until the session ends.
    pub async fn serve(&mut self, dispatcher: &Dispatcher, shutdown: &CancellationToken) -> SessionEnd {
        let mut consecutive_errors: u32 = 0;

        loop {
            if shutdown.is_cancelled() {
                return self.finish(SessionEnd::Shutdown);
            }

            let read = tokio::select! {
                biased;
                () = shutdown.cancelled() => None,
                read = self.channel.read_frame() => Some(read),
            };
            let Some(read) = read else {
                return self.finish(SessionEnd::Shutdown);
            };

            let frame = match read {
                Ok(Some(frame)) => {
                    consecutive_errors = 0;
                    frame
                }
                Ok(None) => {
                    log::info!("[Session] Client disconnected: {}", self.id);
                    return self.finish(SessionEnd::PeerDisconnected);
                }
                Err(e) if is_disconnect(&e) => {
                    log::info!("[Session] Client disconnected: {} ({e})", self.id);
                    return self.finish(SessionEnd::PeerDisconnected);
                }
                Err(e) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    log::warn!(
                        "[Session] Read error for {} ({} in a row): {e}",
                        self.id,
                        consecutive_errors
                    );
                    if self.retry.exhausted(consecutive_errors) {
                        log::error!("[Session] Giving up on {} after {consecutive_errors} read errors", self.id);
                        return self.finish(SessionEnd::ErrorLimit);
                    }
                    if crate::shutdown::sleep_or_cancel(self.retry.delay(), shutdown).await {
                        return self.finish(SessionEnd::Shutdown);
                    }
                    continue;
                }
            };

            let command = framing::decode(&frame);
            log::debug!("[Session] << {:?} from {}", command.token(), self.id);

            let outcome = dispatcher.dispatch(command);
            self.commands += 1;

            if self.direction.replies() {
                // A failed write doesn't end the session; the next read
                // tells us whether the peer is really gone.
                match self.channel.write_frame(&framing::encode(&outcome)).await {
                    Ok(()) => log::debug!("[Session] >> {} to {}", outcome.response, self.id),
                    Err(e) => log::warn!("[Session] Write error for {}: {e}", self.id),
                }
            }
        }
    }

    fn finish(&mut self, end: SessionEnd) -> SessionEnd {
        self.connected = false;
        end
    }
}

/// Generate a unique session ID using a monotonic counter + random suffix.
pub fn generate_session_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let rand: u16 = rand::random();
    format!("session:{seq:x}{rand:04x}")
}
