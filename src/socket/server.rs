//! Unix domain socket endpoint and the serving lifecycle.
//!
//! The [`Controller`] owns the listening endpoint and serves one client at
//! a time:
//!
//! ```text
//! bind endpoint ─► accept ─► Session::serve ─► close endpoint ─┐
//!      ▲                                                      │
//!      └──────────────── until shutdown is cancelled ◄────────┘
//! ```
//!
//! The endpoint is recreated for every client and is always released
//! (socket file removed) when the session ends, however it ends.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use super::channel::StreamChannel;
use super::session::{generate_session_id, Session, SessionEnd};
use crate::config::{EndpointConfig, ServerConfig};
use crate::constants::{ACCEPT_ERROR_PAUSE, ENDPOINT_RETRY_BACKOFF, MAX_SOCKET_PATH};
use crate::dispatch::Dispatcher;
use crate::shutdown::sleep_or_cancel;

/// A bound listening socket.
#[derive(Debug)]
pub struct Endpoint {
    /// Path to the socket file (for cleanup).
    path: PathBuf,
    listener: UnixListener,
}

impl Endpoint {
    /// Bind the endpoint described by `config`.
    ///
    /// Validates the path length, creates the parent directory, clears a
    /// stale socket file, binds, and restricts the socket to its owner.
    ///
    /// # Errors
    ///
    /// Fails if the path is too long, is occupied by something other than a
    /// socket, another server is already listening on it, or the socket
    /// cannot be bound.
    pub fn bind(config: &EndpointConfig) -> Result<Self> {
        let path = config.path.clone();

        let path_len = path.as_os_str().len();
        if path_len >= MAX_SOCKET_PATH {
            anyhow::bail!(
                "Socket path too long ({path_len} bytes, max {}): {}",
                MAX_SOCKET_PATH - 1,
                path.display()
            );
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create socket directory: {}", parent.display())
                })?;
            }
        }

        if let Ok(meta) = std::fs::symlink_metadata(&path) {
            use std::os::unix::fs::FileTypeExt;
            if !meta.file_type().is_socket() {
                anyhow::bail!("Path exists and is not a socket: {}", path.display());
            }
            if std::os::unix::net::UnixStream::connect(&path).is_ok() {
                anyhow::bail!("Socket already in use: {}", path.display());
            }
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove stale socket: {}", path.display()))?;
        }

        let listener = std::os::unix::net::UnixListener::bind(&path)
            .with_context(|| format!("Failed to bind socket: {}", path.display()))?;

        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&path, perms)
                .with_context(|| format!("Failed to set socket permissions: {}", path.display()))?;
        }

        listener.set_nonblocking(true)?;
        let listener = UnixListener::from_std(listener)?;

        log::info!("[Controller] Listening on {}", path.display());
        Ok(Self { path, listener })
    }

    /// Wait for the next client.
    pub async fn accept(&self) -> io::Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(stream)
    }

    /// Path to the socket file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop listening and remove the socket file.
    pub fn close(self) {
        let Self { path, listener } = self;
        drop(listener);
        match std::fs::remove_file(&path) {
            Ok(()) => log::debug!("[Controller] Removed socket {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("[Controller] Failed to remove socket {}: {e}", path.display()),
        }
    }
}

/// Result of waiting for a client.
#[derive(Debug)]
enum Accepted {
    Client(UnixStream),
    Cancelled,
    TimedOut,
    Failed(io::Error),
}

/// Serves clients one after another until shutdown.
#[derive(Debug)]
pub struct Controller {
    config: ServerConfig,
    dispatcher: Dispatcher,
}

impl Controller {
    /// Create a controller for `config` dispatching through `dispatcher`.
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        Self { config, dispatcher }
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run until `shutdown` is cancelled. Returns the process exit code.
    ///
    /// Endpoint and I/O failures are logged and retried; only cancellation
    /// ends the loop.
    pub async fn run(&self, shutdown: CancellationToken) -> i32 {
        let mut sessions: u64 = 0;

        while !shutdown.is_cancelled() {
            let endpoint = match Endpoint::bind(&self.config.endpoint) {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    log::warn!("[Controller] Failed to create endpoint: {e:#}");
                    if sleep_or_cancel(ENDPOINT_RETRY_BACKOFF, &shutdown).await {
                        break;
                    }
                    continue;
                }
            };
            let endpoint = scopeguard::guard(endpoint, Endpoint::close);

            log::info!("[Controller] Waiting for connection...");
            let stream = match self.wait_for_client(&endpoint, &shutdown).await {
                Accepted::Client(stream) => stream,
                Accepted::Cancelled => break,
                Accepted::TimedOut => {
                    log::debug!("[Controller] No client within accept timeout, recreating endpoint");
                    continue;
                }
                Accepted::Failed(e) => {
                    log::error!("[Controller] Accept error: {e}");
                    if sleep_or_cancel(ACCEPT_ERROR_PAUSE, &shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            let session_id = generate_session_id();
            log::info!("[Controller] Client connected: {session_id}");

            let channel = StreamChannel::new(stream, self.config.endpoint.max_frame_size);
            let mut session = Session::new(
                session_id,
                channel,
                self.config.endpoint.direction,
                self.config.read_retry,
            );
            let end = session.serve(&self.dispatcher, &shutdown).await;
            sessions += 1;

            match end {
                SessionEnd::PeerDisconnected => log::info!(
                    "[Controller] Session {} ended after {} command(s)",
                    session.id(),
                    session.commands()
                ),
                SessionEnd::Shutdown => {
                    log::info!("[Controller] Session {} interrupted by shutdown", session.id());
                }
                SessionEnd::ErrorLimit => {
                    log::warn!("[Controller] Session {} dropped after repeated errors", session.id());
                }
            }
        }

        log::info!("[Controller] Shutting down after {sessions} session(s)");
        0
    }

    async fn wait_for_client(&self, endpoint: &Endpoint, shutdown: &CancellationToken) -> Accepted {
        let accept = async {
            match self.config.accept_timeout() {
                Some(limit) => match tokio::time::timeout(limit, endpoint.accept()).await {
                    Ok(result) => Some(result),
                    Err(_elapsed) => None,
                },
                None => Some(endpoint.accept().await),
            }
        };

        tokio::select! {
            biased;
            () = shutdown.cancelled() => Accepted::Cancelled,
            result = accept => match result {
                Some(Ok(stream)) => Accepted::Client(stream),
                Some(Err(e)) => Accepted::Failed(e),
                None => Accepted::TimedOut,
            },
        }
    }
}
