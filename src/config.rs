//! Server configuration.
//!
//! Configuration is assembled in three layers: built-in defaults, then
//! `MOTIONCTL_*` environment variables, then command-line flags (applied by
//! the binary). The result is immutable for the lifetime of the server.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FPS, DEFAULT_GAME, DEFAULT_MAX_FRAME_SIZE, DEFAULT_SOCKET_NAME, DEFAULT_THRESHOLD,
    READ_RETRY_DELAY,
};

/// Which way replies flow on a session.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Commands in, status replies out.
    #[default]
    Duplex,
    /// Commands in only; the client never gets a reply.
    InboundOnly,
}

impl Direction {
    /// Returns `true` when the session writes replies.
    pub fn replies(self) -> bool {
        self == Self::Duplex
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplex => f.write_str("duplex"),
            Self::InboundOnly => f.write_str("inbound-only"),
        }
    }
}

/// Everything needed to (re)create the listening endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Filesystem path of the Unix domain socket.
    pub path: PathBuf,
    /// Largest frame handed to the decoder; longer input is split.
    pub max_frame_size: usize,
    /// Reply direction.
    pub direction: Direction,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            path: default_socket_path(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            direction: Direction::Duplex,
        }
    }
}

/// How a session reacts to read errors that are not a disconnect.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadRetryPolicy {
    /// Delay before the next read attempt, in milliseconds.
    pub delay_ms: u64,
    /// End the session after this many consecutive errors. `None` retries
    /// for as long as the session is running.
    pub max_consecutive_errors: Option<u32>,
}

impl ReadRetryPolicy {
    /// Delay between attempts.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Returns `true` once `errors` consecutive failures exhaust the policy.
    pub fn exhausted(&self, errors: u32) -> bool {
        self.max_consecutive_errors.is_some_and(|max| errors >= max)
    }
}

impl Default for ReadRetryPolicy {
    fn default() -> Self {
        Self {
            delay_ms: u64::try_from(READ_RETRY_DELAY.as_millis()).unwrap_or(100),
            max_consecutive_errors: None,
        }
    }
}

/// Configuration for `motionctl serve`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ServerConfig {
    /// Client/game label, used to tag executed actions.
    pub game: String,
    /// Sensitivity threshold. Accepted for the action executor; unused by
    /// the protocol engine.
    pub threshold: f64,
    /// Target frame rate. Accepted for the action executor; unused by the
    /// protocol engine.
    pub fps: u32,
    /// Listening endpoint.
    pub endpoint: EndpointConfig,
    /// Verbose logging.
    pub debug: bool,
    /// Optional audit log file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Transient read error handling.
    pub read_retry: ReadRetryPolicy,
    /// Recreate the endpoint when no client connects within this many
    /// seconds. `None` waits indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            game: DEFAULT_GAME.to_string(),
            threshold: DEFAULT_THRESHOLD,
            fps: DEFAULT_FPS,
            endpoint: EndpointConfig::default(),
            debug: false,
            log_file: None,
            read_retry: ReadRetryPolicy::default(),
            accept_timeout_secs: None,
        }
    }
}

impl ServerConfig {
    /// Defaults with environment overrides applied.
    pub fn load() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply `MOTIONCTL_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable values are ignored and the previous setting kept.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("MOTIONCTL_SOCKET") {
            self.endpoint.path = PathBuf::from(path);
        }

        if let Some(path) = lookup("MOTIONCTL_LOG_FILE") {
            self.log_file = Some(PathBuf::from(path));
        }

        if let Some(game) = lookup("MOTIONCTL_GAME") {
            self.game = game;
        }

        if let Some(debug) = lookup("MOTIONCTL_DEBUG") {
            match debug.as_str() {
                "1" | "true" | "yes" => self.debug = true,
                "0" | "false" | "no" => self.debug = false,
                _ => {}
            }
        }
    }

    /// Accept timeout as a `Duration`.
    pub fn accept_timeout(&self) -> Option<Duration> {
        self.accept_timeout_secs.map(Duration::from_secs)
    }
}

/// Default socket location.
///
/// Prefers the per-user runtime directory (`$XDG_RUNTIME_DIR`) and falls
/// back to the system temp directory.
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(DEFAULT_SOCKET_NAME)
}
