//! Append-only audit trail of command outcomes.
//!
//! Every dispatched command produces one line:
//!
//! ```text
//! [2024-05-01 12:00:00] UP -> executed
//! ```
//!
//! The line always goes to stdout. When a log file is configured it is also
//! appended there, opening and closing the file on every call so no handle
//! outlives a single write. Failures to write the file are swallowed; the
//! audit trail must never stop a command from executing.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::dispatch::ActionLabel;

/// Timestamp format for audit lines (local time, second resolution).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Best-effort recorder of command outcomes.
#[derive(Debug, Clone, Default)]
pub struct AuditSink {
    log_file: Option<PathBuf>,
}

impl AuditSink {
    /// Create a sink, optionally mirroring lines into `log_file`.
    pub fn new(log_file: Option<PathBuf>) -> Self {
        Self { log_file }
    }

    /// Console-only sink.
    pub fn console() -> Self {
        Self::default()
    }

    /// Configured log file, if any.
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Record one outcome stamped with the current local time.
    ///
    /// Returns the formatted line (without trailing newline).
    pub fn record(&self, command: &str, action: ActionLabel) -> String {
        self.record_at(Local::now(), command, action)
    }

    /// Record one outcome with an explicit timestamp.
    pub fn record_at(&self, at: DateTime<Local>, command: &str, action: ActionLabel) -> String {
        let line = format_line(at, command, action);

        if let Some(path) = &self.log_file {
            if let Err(e) = append_line(path, &line) {
                log::debug!("[Audit] Could not write {}: {e}", path.display());
            }
        }

        println!("{line}");
        line
    }
}

/// Format an audit line.
pub fn format_line(at: DateTime<Local>, command: &str, action: ActionLabel) -> String {
    format!("[{}] {} -> {}", at.format(TIMESTAMP_FORMAT), command, action)
}

/// Open, append, close.
fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    /// Check a line against `[YYYY-MM-DD HH:MM:SS] <token> -> (executed|unknown)`.
    fn assert_audit_shape(line: &str) {
        assert!(line.starts_with('['), "missing '[': {line}");
        let (stamp, rest) = line[1..].split_once("] ").expect("missing '] '");
        NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .unwrap_or_else(|e| panic!("bad timestamp {stamp:?}: {e}"));
        assert_eq!(stamp.len(), 19, "timestamp should be second resolution: {stamp}");
        let (command, label) = rest.split_once(" -> ").expect("missing ' -> '");
        assert!(!command.is_empty() && !command.contains(char::is_whitespace));
        assert!(label == "executed" || label == "unknown", "bad label: {label}");
    }

    #[test]
    fn test_console_only_record_does_not_fail() {
        let sink = AuditSink::console();
        let line = sink.record("UP", ActionLabel::Executed);
        assert_audit_shape(&line);
        assert!(line.ends_with("UP -> executed"));
    }

    #[test]
    fn test_file_gets_one_line_per_call() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log_path = tmp.path().join("controller.log");
        let sink = AuditSink::new(Some(log_path.clone()));

        sink.record("UP", ActionLabel::Executed);
        sink.record("LEFT", ActionLabel::Executed);
        sink.record("BOGUS", ActionLabel::Unknown);

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in &lines {
            assert_audit_shape(line);
        }
        assert!(lines[2].ends_with("BOGUS -> unknown"));
    }

    #[test]
    fn test_appends_to_existing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log_path = tmp.path().join("controller.log");
        std::fs::write(&log_path, "previous run\n").unwrap();

        AuditSink::new(Some(log_path.clone())).record("DOWN", ActionLabel::Executed);

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.starts_with("previous run\n"));
    }

    #[test]
    fn test_unwritable_file_degrades_to_console() {
        let tmp = tempfile::TempDir::new().unwrap();
        // A directory cannot be opened for appending.
        let sink = AuditSink::new(Some(tmp.path().to_path_buf()));
        let line = sink.record("RIGHT", ActionLabel::Executed);
        assert_audit_shape(&line);
    }

    #[test]
    fn test_format_line_uses_fixed_timestamp() {
        let at = NaiveDateTime::parse_from_str("2024-05-01 09:08:07", TIMESTAMP_FORMAT)
            .unwrap()
            .and_local_timezone(Local)
            .unwrap();
        assert_eq!(
            format_line(at, "UP", ActionLabel::Executed),
            "[2024-05-01 09:08:07] UP -> executed"
        );
    }
}
