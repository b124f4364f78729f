//! End-to-end tests: run the `pylftpd` binary and stop it with real signals.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const BIN: &str = env!("CARGO_BIN_EXE_pylftpd");

fn spawn(args: &[&str]) -> Child {
    Command::new(BIN)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn pylftpd")
}

fn send(child: &Child, signal: Signal) {
    kill(Pid::from_raw(child.id() as i32), signal).expect("failed to signal pylftpd");
}

/// Poll until the child exits; kill it and panic past the deadline.
fn wait_with_deadline(child: &mut Child, deadline: Duration) -> ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if start.elapsed() > deadline {
            let _ = child.kill();
            panic!("pylftpd did not exit within {deadline:?}");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// Poll the log file until it contains `needle`.
fn wait_for_log(path: &Path, needle: &str, deadline: Duration) -> String {
    let start = Instant::now();
    loop {
        let contents = std::fs::read_to_string(path).unwrap_or_default();
        if contents.contains(needle) {
            return contents;
        }
        assert!(
            start.elapsed() < deadline,
            "log never contained {needle:?}: {contents:?}"
        );
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("missing {needle:?} in log:\n{haystack}"))
}

#[test]
fn test_sigterm_with_debug_logdir() {
    let tmp = tempfile::tempdir().unwrap();
    let logdir = tmp.path().to_str().unwrap();
    let log_file = tmp.path().join("pylftp.log");

    let mut child = spawn(&["--debug", "--logdir", logdir]);
    wait_for_log(&log_file, "Starting pylftpd", Duration::from_secs(10));
    std::thread::sleep(Duration::from_secs(1));

    send(&child, Signal::SIGTERM);
    let status = wait_with_deadline(&mut child, Duration::from_secs(5));
    assert_eq!(status.code(), Some(0));

    let contents = std::fs::read_to_string(&log_file).unwrap();
    let debug = position(&contents, " - DEBUG - ");
    let start = position(&contents, "Starting pylftpd");
    let caught = position(&contents, "Caught signal SIGTERM");
    let finish = position(&contents, "Finished pylftpd");
    assert!(debug < start, "debug entries precede the run loop");
    assert!(
        contents.contains(" - DEBUG - main.rs:run - parsed CLI arguments"),
        "startup debug lines carry the function name:\n{contents}"
    );
    assert!(start < caught && caught < finish);
    assert_eq!(contents.matches("Finished pylftpd").count(), 1);
}

#[test]
fn test_sigint_logs_to_stdout_without_logdir() {
    let mut child = spawn(&[]);
    let mut stdout = BufReader::new(child.stdout.take().unwrap());

    let mut line = String::new();
    loop {
        line.clear();
        let read = stdout.read_line(&mut line).unwrap();
        assert!(read > 0, "stdout closed before the start message");
        if line.contains("Starting pylftpd") {
            break;
        }
    }
    assert!(line.contains(" - INFO - runner.rs:run - Starting pylftpd"));

    send(&child, Signal::SIGINT);
    let status = wait_with_deadline(&mut child, Duration::from_secs(5));
    assert!(status.success());

    let mut rest = String::new();
    for line in stdout.lines() {
        rest.push_str(&line.unwrap());
        rest.push('\n');
    }
    let caught = position(&rest, "Caught signal SIGINT");
    let finish = position(&rest, "Finished pylftpd");
    assert!(caught < finish);
    assert!(!rest.contains(" - DEBUG - "), "debug output without --debug");
}

#[test]
fn test_shutdown_latency_within_one_interval() {
    let tmp = tempfile::tempdir().unwrap();
    let logdir = tmp.path().to_str().unwrap();
    let log_file = tmp.path().join("pylftp.log");

    let mut child = spawn(&["--logdir", logdir]);
    wait_for_log(&log_file, "Starting pylftpd", Duration::from_secs(10));

    let sent = Instant::now();
    send(&child, Signal::SIGTERM);
    wait_for_log(&log_file, "Finished pylftpd", Duration::from_secs(5));
    assert!(sent.elapsed() <= Duration::from_millis(500));

    wait_with_deadline(&mut child, Duration::from_secs(5));
}

#[test]
fn test_config_file_sets_log_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let logdir = tmp.path().join("logs");
    std::fs::create_dir(&logdir).unwrap();
    let config = tmp.path().join("pylftpd.toml");
    std::fs::write(
        &config,
        format!("[logging]\ndir = {:?}\n", logdir.to_str().unwrap()),
    )
    .unwrap();

    let mut child = spawn(&["--config", config.to_str().unwrap()]);
    wait_for_log(
        &logdir.join("pylftp.log"),
        "Starting pylftpd",
        Duration::from_secs(10),
    );

    send(&child, Signal::SIGTERM);
    let status = wait_with_deadline(&mut child, Duration::from_secs(5));
    assert!(status.success());
}

#[test]
fn test_missing_logdir_fails_at_startup() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope");

    let output = Command::new(BIN)
        .args(["--logdir", missing.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("pylftpd: "), "stderr: {stderr}");
    assert!(stderr.contains("pylftp.log"));
}

#[test]
fn test_malformed_config_fails_at_startup() {
    let tmp = tempfile::tempdir().unwrap();
    let config = tmp.path().join("pylftpd.toml");
    std::fs::write(&config, "[logging\n").unwrap();

    let output = Command::new(BIN)
        .args(["--config", config.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid config"));
}
