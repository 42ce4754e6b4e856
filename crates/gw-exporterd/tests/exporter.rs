//! End-to-end tests against the built `gw-exporterd` binary.

#![cfg(unix)]

use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const BIN: &str = env!("CARGO_BIN_EXE_gw-exporterd");

fn exporter(inverter_ip: &str) -> Command {
    let mut cmd = Command::new(BIN);
    cmd.env_remove("METRICS_PORT")
        .env("INVERTER_IP", inverter_ip)
        .env("RUST_LOG", "info")
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Write an executable reader script into a per-test directory.
fn reader_script(test: &str, body: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gw-exporterd-{test}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("gw");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn wait_with_timeout(child: &mut Child, limit: Duration) -> ExitStatus {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("exporter did not exit within {limit:?}");
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Minimal HTTP/1.0 GET; returns the raw response.
fn http_get(port: u16, path: &str) -> Option<String> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).ok()?;
    stream.set_read_timeout(Some(Duration::from_secs(2))).ok()?;
    write!(stream, "GET {path} HTTP/1.0\r\nHost: localhost\r\n\r\n").ok()?;
    let mut response = String::new();
    stream.read_to_string(&mut response).ok()?;
    Some(response)
}

fn poll_until(port: u16, path: &str, limit: Duration, done: impl Fn(&str) -> bool) -> String {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(response) = http_get(port, path) {
            if done(&response) {
                return response;
            }
        }
        if Instant::now() > deadline {
            panic!("condition not met on {path} within {limit:?}");
        }
        thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn invalid_inverter_ip_exits_with_one() {
    let status = exporter("not-an-ip").status().unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn missing_inverter_ip_exits_with_one() {
    let status = exporter("").env_remove("INVERTER_IP").status().unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn missing_reader_exits_with_one() {
    let port = free_port();
    let mut child = exporter("192.168.1.20")
        .env("METRICS_PORT", port.to_string())
        .args(["--script", "/nonexistent/scripts/gw"])
        .spawn()
        .unwrap();

    let status = wait_with_timeout(&mut child, Duration::from_secs(10));
    assert_eq!(status.code(), Some(1));
}

#[test]
fn serves_reader_values_and_stops_on_sigterm() {
    let port = free_port();
    let script = reader_script(
        "serve",
        r#"while read cmd; do echo '[{"Id":"1","Name":"PV1 Voltage","Value":"245.3","Unit":"V"}]'; done"#,
    );

    let mut child = exporter("192.168.1.20")
        .env("METRICS_PORT", port.to_string())
        .arg("--script")
        .arg(&script)
        .spawn()
        .unwrap();

    let metrics = poll_until(port, "/metrics", Duration::from_secs(10), |r| {
        r.contains("gw_sensor{")
    });
    assert!(metrics.starts_with("HTTP/1.0 200") || metrics.starts_with("HTTP/1.1 200"));
    assert!(metrics.contains("gw_sensor{id=\"1\",name=\"PV1 Voltage\"} 245.3"));

    let root = http_get(port, "/").unwrap();
    assert!(root.contains(" 307 "), "response was: {root}");
    assert!(root.to_ascii_lowercase().contains("location: /metrics"));

    let forbidden = http_get(port, "/unknown").unwrap();
    assert!(forbidden.contains(" 403 "), "response was: {forbidden}");
    assert!(forbidden.ends_with("403 HTTP status code returned!"));

    let pid = libc::pid_t::try_from(child.id()).unwrap();
    assert_eq!(unsafe { libc::kill(pid, libc::SIGTERM) }, 0);

    let status = wait_with_timeout(&mut child, Duration::from_secs(10));
    assert_eq!(status.code(), Some(1));
}

#[test]
fn reader_receives_inverter_ip() {
    let port = free_port();
    let script = reader_script(
        "env",
        r#"while read cmd; do echo "[{\"Id\":\"ip\",\"Name\":\"$INVERTER_IP\",\"Value\":\"1\",\"Unit\":\"\"}]"; done"#,
    );

    let mut child = exporter("10.0.0.7")
        .env("METRICS_PORT", port.to_string())
        .arg("--script")
        .arg(&script)
        .spawn()
        .unwrap();

    let metrics = poll_until(port, "/metrics", Duration::from_secs(10), |r| {
        r.contains("gw_sensor{")
    });
    assert!(metrics.contains("gw_sensor{id=\"ip\",name=\"10.0.0.7\"} 1"));

    let pid = libc::pid_t::try_from(child.id()).unwrap();
    assert_eq!(unsafe { libc::kill(pid, libc::SIGINT) }, 0);
    let status = wait_with_timeout(&mut child, Duration::from_secs(10));
    assert_eq!(status.code(), Some(1));
}

#[test]
fn half_sent_request_does_not_hold_off_sigterm() {
    let port = free_port();
    let script = reader_script("stall", "while read cmd; do echo '[]'; done");

    let mut child = exporter("192.168.1.20")
        .env("METRICS_PORT", port.to_string())
        .arg("--script")
        .arg(&script)
        .spawn()
        .unwrap();

    poll_until(port, "/metrics", Duration::from_secs(10), |r| r.contains(" 200 "));

    // Headers without the terminating blank line, kept open.
    let mut stalled = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stalled.write_all(b"GET /metrics HTTP/1.1\r\nHost: x\r\n").unwrap();
    thread::sleep(Duration::from_millis(500));

    let pid = libc::pid_t::try_from(child.id()).unwrap();
    let signalled = Instant::now();
    assert_eq!(unsafe { libc::kill(pid, libc::SIGTERM) }, 0);

    let status = wait_with_timeout(&mut child, Duration::from_secs(15));
    assert_eq!(status.code(), Some(1));
    assert!(
        signalled.elapsed() < Duration::from_secs(12),
        "exit took {:?}",
        signalled.elapsed()
    );
    drop(stalled);
}
