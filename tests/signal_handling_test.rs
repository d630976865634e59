// Integration tests for the serve lifecycle under real signals
//
// These tests verify that:
// 1. `motionctl serve` answers commands over its socket
// 2. SIGTERM / SIGINT end the process with exit code 0
// 3. The socket file is removed on the way out
// 4. The audit trail lands in the log file and on stdout
//
// Run with: cargo test --test signal_handling_test

use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

/// Send a signal to a process
fn kill_process(child: &Child, signal: i32) {
    let pid = libc::pid_t::try_from(child.id()).expect("pid fits in pid_t");
    // SAFETY: kill(2) on a pid we spawned; no memory is shared.
    unsafe {
        libc::kill(pid, signal);
    }
}

/// Wait for process to exit with timeout
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<std::process::ExitStatus> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {
                if start.elapsed() > timeout {
                    return None;
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(_) => return None,
        }
    }
}

fn spawn_server(sock: &Path, extra: &[&str]) -> Child {
    Command::new(env!("CARGO_BIN_EXE_motionctl"))
        .arg("serve")
        .arg("-p")
        .arg(sock)
        .args(extra)
        .env_remove("MOTIONCTL_SOCKET")
        .env_remove("MOTIONCTL_LOG_FILE")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn motionctl serve")
}

fn connect_with_retry(sock: &Path) -> UnixStream {
    for _ in 0..100 {
        if let Ok(stream) = UnixStream::connect(sock) {
            return stream;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("server never listened on {}", sock.display());
}

fn read_stdout(child: &mut Child) -> String {
    let mut out = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout.read_to_string(&mut out).unwrap();
    }
    out
}

#[test]
fn test_sigterm_after_session_exits_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let sock = temp_dir.path().join("ctl.sock");
    let log = temp_dir.path().join("controller.log");
    let mut child = spawn_server(&sock, &["-l", log.to_str().unwrap()]);

    let stream = connect_with_retry(&sock);
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    let mut replies = Vec::new();
    for command in ["UP", "LEFT", "BOGUS"] {
        writer.write_all(format!("{command}\r\n").as_bytes()).unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        replies.push(line);
    }
    assert_eq!(replies, ["OK:UP\n", "OK:LEFT\n", "ERROR:UNKNOWN\n"]);
    drop(writer);
    drop(reader);

    kill_process(&child, libc::SIGTERM);
    let status = wait_with_timeout(&mut child, Duration::from_secs(5));
    if status.is_none() {
        let _ = child.kill();
    }
    let status = status.expect("server did not exit after SIGTERM");
    assert!(status.success(), "expected exit code 0, got {status:?}");
    assert!(!sock.exists(), "socket file should be removed on shutdown");

    let contents = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3, "one audit line per command: {contents}");
    assert!(lines[0].ends_with("] UP -> executed"));
    assert!(lines[1].ends_with("] LEFT -> executed"));
    assert!(lines[2].ends_with("] BOGUS -> unknown"));

    let stdout = read_stdout(&mut child);
    assert!(stdout.contains("] UP -> executed"), "audit should reach stdout: {stdout}");
}

#[test]
fn test_sigint_with_connected_client_exits_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let sock = temp_dir.path().join("ctl.sock");
    let mut child = spawn_server(&sock, &[]);

    // Keep an idle client attached so the server is blocked in a read.
    let _idle = connect_with_retry(&sock);
    thread::sleep(Duration::from_millis(100));

    kill_process(&child, libc::SIGINT);
    let status = wait_with_timeout(&mut child, Duration::from_secs(5));
    if status.is_none() {
        let _ = child.kill();
    }
    let status = status.expect("server did not exit after SIGINT");
    assert!(status.success(), "expected exit code 0, got {status:?}");
    assert!(!sock.exists());
}

#[test]
fn test_inbound_only_server_stays_silent() {
    let temp_dir = TempDir::new().unwrap();
    let sock = temp_dir.path().join("ctl.sock");
    let mut child = spawn_server(&sock, &["--inbound-only"]);

    let mut stream = connect_with_retry(&sock);
    stream.write_all(b"UP\n").unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    let mut received = Vec::new();
    stream.read_to_end(&mut received).unwrap();
    assert!(received.is_empty(), "inbound-only must not reply: {received:?}");

    kill_process(&child, libc::SIGTERM);
    let status = wait_with_timeout(&mut child, Duration::from_secs(5));
    if status.is_none() {
        let _ = child.kill();
    }
    assert!(status.expect("server did not exit").success());
}
