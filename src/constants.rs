//! Application-wide constants for motionctl.
//!
//! Centralizes the timing and sizing knobs of the command channel so the
//! controller, session and client agree on them.
//!
//! # Categories
//!
//! - **Timeouts**: backoff and retry delays
//! - **Endpoint**: socket path and frame sizing
//! - **Defaults**: values for the reserved CLI options

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// Backoff after the endpoint could not be created.
///
/// Endpoint creation failures are never fatal; the controller waits this
/// long and tries again.
pub const ENDPOINT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Pause after a failed `accept()` before the endpoint is recreated.
pub const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Default delay between retries after a transient read error.
pub const READ_RETRY_DELAY: Duration = Duration::from_millis(100);

/// How long the client waits for a reply before giving up.
pub const CLIENT_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Default cooldown for repeated identical commands from a front end.
pub const COMMAND_COOLDOWN: Duration = Duration::from_millis(300);

// ============================================================================
// Endpoint
// ============================================================================

/// File name of the default socket inside the runtime directory.
pub const DEFAULT_SOCKET_NAME: &str = "motionctl.sock";

/// Largest socket path accepted by `bind`.
///
/// `sun_path` is 104 bytes on macOS and 108 on Linux; the smaller limit
/// keeps paths portable.
pub const MAX_SOCKET_PATH: usize = 104;

/// Default maximum frame size in bytes.
///
/// Commands are a handful of ASCII bytes, so a small buffer is plenty.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 256;

/// Read buffer used by stream channels.
pub const READ_BUFFER_SIZE: usize = 4 * 1024;

// ============================================================================
// Defaults
// ============================================================================

/// Default client/game label.
pub const DEFAULT_GAME: &str = "default";

/// Default sensitivity threshold (reserved for the action executor).
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Default target frame rate (reserved for the action executor).
pub const DEFAULT_FPS: u32 = 30;
