//! motionctl - local command channel between a motion front end and a
//! game controller.
//!
//! A long-running server listens on a Unix domain socket, accepts one
//! client at a time, and turns each line the client sends (`UP`, `DOWN`,
//! `LEFT`, `RIGHT`) into an action, replying `OK:<CMD>` or `ERROR:UNKNOWN`.
//!
//! # Architecture
//!
//! - **Controller** - owns the endpoint, accepts clients one after another
//! - **Session** - read → dispatch → reply loop for one client
//! - **Framing** - line codec between bytes and commands
//! - **Dispatcher** - command → outcome, calls the action executor
//! - **AuditSink** - timestamped record of every outcome
//!
//! # Modules
//!
//! - [`socket`] - endpoint, sessions, framing and the sending client
//! - [`dispatch`] - command vocabulary and the executor seam
//! - [`audit`] - audit trail
//! - [`config`] - configuration loading
//! - [`shutdown`] - signal handling and cancellation helpers

pub mod audit;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod shutdown;
pub mod socket;

// Re-export commonly used types
pub use audit::AuditSink;
pub use config::{Direction, EndpointConfig, ReadRetryPolicy, ServerConfig};
pub use dispatch::{ActionExecutor, ActionLabel, Command, ConsoleExecutor, Dispatcher, Outcome};
pub use socket::server::Controller;
pub use socket::session::SessionEnd;
