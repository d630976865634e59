//! Command vocabulary and dispatch.
//!
//! [`Dispatcher::dispatch`] is total: every token, recognized or not, maps
//! to an [`Outcome`]. Recognized movement commands are handed to an
//! [`ActionExecutor`] (the seam where real game input would be driven) and
//! every outcome is recorded by the [`AuditSink`] before it is returned.

use std::fmt;

use chrono::{DateTime, Local};

use crate::audit::AuditSink;

/// A decoded command token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `UP`
    Up,
    /// `DOWN`
    Down,
    /// `LEFT`
    Left,
    /// `RIGHT`
    Right,
    /// Anything outside the vocabulary, kept verbatim.
    Unknown(String),
}

impl Command {
    /// Map a token to a command. Matching is exact and case-sensitive.
    pub fn parse(token: &str) -> Self {
        match token {
            "UP" => Self::Up,
            "DOWN" => Self::Down,
            "LEFT" => Self::Left,
            "RIGHT" => Self::Right,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The token as received.
    pub fn token(&self) -> &str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Unknown(raw) => raw,
        }
    }

    /// Returns `true` for the four movement commands.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// What happened to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionLabel {
    /// The command was in the vocabulary and was executed.
    Executed,
    /// The command was not recognized.
    Unknown,
}

impl ActionLabel {
    /// Wire/audit spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executed => "executed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of dispatching one command.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// The command that was dispatched.
    pub command: Command,
    /// Action label recorded in the audit trail.
    pub action: ActionLabel,
    /// Reply text, e.g. `OK:UP` or `ERROR:UNKNOWN`.
    pub response: String,
    /// When the command was dispatched.
    pub timestamp: DateTime<Local>,
}

/// Performs the real-world effect of a command.
///
/// Called once per dispatch, before the outcome is finalized.
pub trait ActionExecutor: Send + Sync + fmt::Debug {
    /// Carry out `command`.
    fn execute(&self, command: &Command, action: ActionLabel);
}

/// Executor that only reports the movement on the log.
#[derive(Debug, Clone)]
pub struct ConsoleExecutor {
    game: String,
}

impl ConsoleExecutor {
    /// Tag log lines with the given game label.
    pub fn new(game: impl Into<String>) -> Self {
        Self { game: game.into() }
    }
}

impl ActionExecutor for ConsoleExecutor {
    fn execute(&self, command: &Command, action: ActionLabel) {
        match action {
            ActionLabel::Executed => log::info!("[{}] Moving {}", self.game, command),
            ActionLabel::Unknown => {
                log::warn!("[{}] Unknown command: {:?}", self.game, command.token());
            }
        }
    }
}

/// Maps commands to outcomes.
#[derive(Debug)]
pub struct Dispatcher {
    audit: AuditSink,
    executor: Box<dyn ActionExecutor>,
}

impl Dispatcher {
    /// Create a dispatcher with the given audit sink and executor.
    pub fn new(audit: AuditSink, executor: Box<dyn ActionExecutor>) -> Self {
        Self { audit, executor }
    }

    /// The audit sink outcomes are recorded to.
    pub fn audit(&self) -> &AuditSink {
        &self.audit
    }

    /// Dispatch one command. Never fails.
    pub fn dispatch(&self, command: Command) -> Outcome {
        let (action, response) = if command.is_known() {
            (ActionLabel::Executed, format!("OK:{}", command.token()))
        } else {
            (ActionLabel::Unknown, "ERROR:UNKNOWN".to_string())
        };

        let timestamp = Local::now();
        self.executor.execute(&command, action);
        self.audit.record_at(timestamp, command.token(), action);

        Outcome {
            command,
            action,
            response,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Executor that remembers what it was asked to do.
    #[derive(Debug, Default, Clone)]
    struct RecordingExecutor {
        calls: Arc<Mutex<Vec<(String, ActionLabel)>>>,
    }

    impl ActionExecutor for RecordingExecutor {
        fn execute(&self, command: &Command, action: ActionLabel) {
            self.calls
                .lock()
                .unwrap()
                .push((command.token().to_string(), action));
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(AuditSink::console(), Box::new(ConsoleExecutor::new("test")))
    }

    #[test]
    fn test_vocabulary_is_executed() {
        let d = dispatcher();
        for token in ["UP", "DOWN", "LEFT", "RIGHT"] {
            let outcome = d.dispatch(Command::parse(token));
            assert_eq!(outcome.action, ActionLabel::Executed);
            assert_eq!(outcome.response, format!("OK:{token}"));
            assert_eq!(outcome.command.token(), token);
        }
    }

    #[test]
    fn test_everything_else_is_unknown() {
        let d = dispatcher();
        for token in ["", "up", "Up", " UP", "UP ", "JUMP", "UP\tDOWN", "ÜP"] {
            let outcome = d.dispatch(Command::parse(token));
            assert_eq!(outcome.action, ActionLabel::Unknown, "token {token:?}");
            assert_eq!(outcome.response, "ERROR:UNKNOWN");
            assert_eq!(outcome.command, Command::Unknown(token.to_string()));
        }
    }

    #[test]
    fn test_executor_called_once_per_dispatch() {
        let executor = RecordingExecutor::default();
        let d = Dispatcher::new(AuditSink::console(), Box::new(executor.clone()));

        d.dispatch(Command::Left);
        d.dispatch(Command::parse("BOGUS"));

        let calls = executor.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                ("LEFT".to_string(), ActionLabel::Executed),
                ("BOGUS".to_string(), ActionLabel::Unknown),
            ]
        );
    }

    #[test]
    fn test_dispatch_audits_each_call() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log_path = tmp.path().join("audit.log");
        let d = Dispatcher::new(
            AuditSink::new(Some(log_path.clone())),
            Box::new(ConsoleExecutor::new("test")),
        );

        d.dispatch(Command::Up);
        d.dispatch(Command::parse("nope"));

        let contents = std::fs::read_to_string(log_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] UP -> executed"));
        assert!(lines[1].ends_with("] nope -> unknown"));
    }

    #[test]
    fn test_audit_line_carries_outcome_timestamp() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log_path = tmp.path().join("audit.log");
        let d = Dispatcher::new(
            AuditSink::new(Some(log_path.clone())),
            Box::new(ConsoleExecutor::new("test")),
        );

        let outcome = d.dispatch(Command::Down);

        let contents = std::fs::read_to_string(log_path).unwrap();
        let expected = crate::audit::format_line(outcome.timestamp, "DOWN", ActionLabel::Executed);
        assert_eq!(contents.lines().collect::<Vec<_>>(), [expected.as_str()]);
    }

    #[test]
    fn test_labels_and_display() {
        assert_eq!(ActionLabel::Executed.to_string(), "executed");
        assert_eq!(ActionLabel::Unknown.to_string(), "unknown");
        assert_eq!(Command::Right.to_string(), "RIGHT");
        assert_eq!(Command::Unknown("x y".into()).to_string(), "x y");
    }
}
