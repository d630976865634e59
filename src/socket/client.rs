//! Sending side of the command channel.
//!
//! Used by `motionctl send` and by front ends that feed gestures to a
//! running server. A [`CommandClient`] holds one connection open and
//! writes one command per line; in duplex mode it reads one reply line per
//! command.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

use super::framing;

/// Connected command sender.
#[derive(Debug)]
pub struct CommandClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    reply_timeout: Duration,
}

impl CommandClient {
    /// Connect to the server listening on `path`.
    pub async fn connect(path: &Path, reply_timeout: Duration) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .await
            .with_context(|| format!("Failed to connect to {}", path.display()))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            reply_timeout,
        })
    }

    /// Send one command without waiting for a reply.
    pub async fn send(&mut self, command: &str) -> Result<()> {
        self.writer
            .write_all(&framing::encode_response(command))
            .await
            .context("Failed to send command")?;
        self.writer.flush().await.context("Failed to flush command")?;
        log::debug!("[Client] >> {command}");
        Ok(())
    }

    /// Send one command and wait for its reply line.
    pub async fn request(&mut self, command: &str) -> Result<String> {
        self.send(command).await?;

        let mut line = String::new();
        let n = tokio::time::timeout(self.reply_timeout, self.reader.read_line(&mut line))
            .await
            .with_context(|| format!("No reply to {command:?} within {:?}", self.reply_timeout))?
            .context("Failed to read reply")?;
        if n == 0 {
            bail!("Server closed the connection before replying to {command:?}");
        }

        let reply = String::from_utf8_lossy(framing::trim_terminator(line.as_bytes())).into_owned();
        log::debug!("[Client] << {reply}");
        Ok(reply)
    }

    /// Close the write side so the server sees a clean disconnect.
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await.context("Failed to close connection")
    }
}

/// Send `commands` over one connection.
///
/// With `expect_reply`, returns one reply per command in order; otherwise
/// returns an empty list.
pub async fn send_commands(
    path: &Path,
    commands: &[String],
    expect_reply: bool,
    reply_timeout: Duration,
) -> Result<Vec<String>> {
    let mut client = CommandClient::connect(path, reply_timeout).await?;
    let mut replies = Vec::with_capacity(if expect_reply { commands.len() } else { 0 });

    for command in commands {
        if expect_reply {
            replies.push(client.request(command).await?);
        } else {
            client.send(command).await?;
        }
    }

    client.close().await?;
    Ok(replies)
}

/// Returns `true` if a server is accepting connections on `path`.
pub async fn probe(path: &Path) -> bool {
    match UnixStream::connect(path).await {
        Ok(_stream) => true,
        Err(e) => {
            log::debug!("[Client] Probe of {} failed: {e}", path.display());
            false
        }
    }
}

/// Suppresses rapid repeats of the same command.
///
/// A command passes if it differs from the last one sent, or if the
/// cooldown has elapsed since the last one was sent.
#[derive(Debug, Clone)]
pub struct CommandThrottle {
    cooldown: Duration,
    last: Option<(String, Instant)>,
}

impl CommandThrottle {
    /// Create a throttle with the given cooldown.
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown, last: None }
    }

    /// Decide whether `command` should be sent at `now`, remembering it if so.
    pub fn should_send(&mut self, command: &str, now: Instant) -> bool {
        if let Some((last, at)) = &self.last {
            if last == command && now.saturating_duration_since(*at) < self.cooldown {
                return false;
            }
        }
        self.last = Some((command.to_string(), now));
        true
    }
}
