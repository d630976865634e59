//! Unix domain socket IPC for the command channel.
//!
//! A front end connects, writes one command per line, and (in duplex mode)
//! reads back one status line per command. One client is served at a time.
//!
//! # Architecture
//!
//! ```text
//! Front end (motionctl send)            Server (motionctl serve)
//! ┌──────────────────┐                ┌──────────────────────────┐
//! │ CommandClient    │                │ Controller               │
//! │  UnixStream      │◄──────────────►│  Endpoint (UnixListener) │
//! │                  │  "UP\n"        │  Session ─► Dispatcher   │
//! │                  │  "OK:UP\n"     │               └► AuditSink│
//! └──────────────────┘                └──────────────────────────┘
//! ```
//!
//! # Wire Protocol
//!
//! Plain text lines. See [`framing`] for the exact rules.

pub mod channel;
pub mod client;
pub mod framing;
pub mod server;
pub mod session;
