//! Transport abstraction for sessions.
//!
//! A [`FrameChannel`] hands out whole frames and accepts whole reply
//! frames, so the session loop doesn't care whether it is talking to a Unix
//! socket, an in-memory pipe, or anything else that moves bytes.

use std::collections::VecDeque;
use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::framing::FrameDecoder;
use crate::constants::READ_BUFFER_SIZE;

/// Bidirectional frame transport.
#[async_trait]
pub trait FrameChannel: Send {
    /// Read the next frame.
    ///
    /// Returns `Ok(None)` when the peer has closed its side.
    async fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Write one encoded frame and flush it.
    async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;
}

/// Returns `true` if `err` means the peer went away rather than a glitch.
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

/// [`FrameChannel`] over any async byte stream.
#[derive(Debug)]
pub struct StreamChannel<S> {
    stream: S,
    decoder: FrameDecoder,
    pending: VecDeque<Vec<u8>>,
    buf: Vec<u8>,
}

impl<S> StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap `stream`, splitting reads into frames of at most `max_frame_size`.
    pub fn new(stream: S, max_frame_size: usize) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(max_frame_size),
            pending: VecDeque::new(),
            buf: vec![0u8; READ_BUFFER_SIZE],
        }
    }

    /// Recover the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

#[async_trait]
impl<S> FrameChannel for StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }

            let n = self.stream.read(&mut self.buf).await?;
            if n == 0 {
                return Ok(self.decoder.flush());
            }
            self.pending.extend(self.decoder.feed(&self.buf[..n]));

            // A short read means the client has nothing more queued, so an
            // unterminated tail is a whole message.
            if n < self.buf.len() {
                self.pending.extend(self.decoder.flush());
            }
        }
    }

    async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await
    }
}
