//! Wire protocol codec for the command channel.
//!
//! Plain text, one command per frame:
//!
//! ```text
//! client → server:  UP\n   (LF or CRLF optional)
//! server → client:  OK:UP\n
//! ```
//!
//! Frames carry no length prefix and no escaping. [`FrameDecoder`] splits
//! received bytes on LF so several coalesced writes still map 1:1 to
//! commands. An unterminated tail is held until the next read completes it,
//! or flushed as its own frame once the client has nothing more queued.

use crate::dispatch::{Command, Outcome};

/// Decode one raw frame into a command.
///
/// A single trailing LF, then a single trailing CR, are stripped. The rest
/// is the token verbatim: case-sensitive, inner whitespace untouched.
/// Invalid UTF-8 is replaced lossily.
pub fn decode(raw: &[u8]) -> Command {
    let text = String::from_utf8_lossy(trim_terminator(raw));
    Command::parse(&text)
}

/// Encode a reply frame for `outcome`.
pub fn encode(outcome: &Outcome) -> Vec<u8> {
    encode_response(&outcome.response)
}

/// Encode reply text: the text plus one trailing LF.
pub fn encode_response(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(text.len() + 1);
    buf.extend_from_slice(text.as_bytes());
    buf.push(b'\n');
    buf
}

/// Strip one trailing `\n` then one trailing `\r`.
pub fn trim_terminator(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

/// Splits received bytes into frames.
///
/// Each LF closes a frame (the LF stays attached). Bytes after the last LF
/// are carried into the next [`feed`](Self::feed) until a LF arrives or
/// [`flush`](Self::flush) is called. Frames longer than the size limit are
/// cut into limit-sized pieces.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_frame_size: usize,
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Create a decoder with the given frame size limit (at least 1).
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.max(1),
            buf: Vec::new(),
        }
    }

    /// Frame size limit.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Bytes held back waiting for a terminator.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Feed received bytes, returning every frame they complete.
    ///
    /// An unterminated tail stays buffered.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();

        for piece in data.split_inclusive(|b| *b == b'\n') {
            self.buf.extend_from_slice(piece);

            if piece.ends_with(b"\n") {
                frames.extend(self.buf.chunks(self.max_frame_size).map(<[u8]>::to_vec));
                self.buf.clear();
            } else {
                while self.buf.len() >= self.max_frame_size {
                    frames.push(self.buf.drain(..self.max_frame_size).collect());
                }
            }
        }

        frames
    }

    /// Take the buffered tail as a final frame, if any.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}
