#![cfg(feature = "cli")]

use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use mtbridge::endpoint::RequestSocket;

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("ephemeral bind should succeed");
    listener
        .local_addr()
        .expect("listener should have an address")
        .port()
}

fn wait_for_endpoint(port: u16, timeout: Duration) {
    let start = Instant::now();
    loop {
        if RequestSocket::connect("127.0.0.1", port).is_ok() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("endpoint did not come up on port {port}");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn spawn_serve(port: u16, extra: &[&str]) -> Child {
    Command::new(env!("CARGO_BIN_EXE_mtbridge"))
        .args(["--log-level", "error", "serve", "--host", "127.0.0.1"])
        .args(["--port", &port.to_string()])
        .args(extra)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("serve command should start")
}

fn mtbridge(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mtbridge"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .output()
        .expect("mtbridge should run")
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::process::ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("child status should be readable") {
            return status;
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            panic!("serve did not exit after its request count");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn serve_echoes_global_and_indicator_requests() {
    let port = free_port();
    let mut child = spawn_serve(port, &["--count", "2", "--indicator", "MA:EURUSD:60"]);
    wait_for_endpoint(port, Duration::from_secs(3));
    let port_arg = port.to_string();

    let probe = mtbridge(&["probe", "--host", "127.0.0.1", "--port", &port_arg]);
    assert!(probe.status.success());
    assert!(String::from_utf8_lossy(&probe.stdout).contains("\"ok\":true"));

    let global = mtbridge(&[
        "send", "--host", "127.0.0.1", "--port", &port_arg, "--ints", "1,2,3",
    ]);
    assert!(global.status.success());
    let stdout = String::from_utf8_lossy(&global.stdout);
    assert!(stdout.contains("\"ints\":[1,2,3]"), "unexpected reply: {stdout}");

    let addressed = mtbridge(&[
        "send",
        "--host",
        "127.0.0.1",
        "--port",
        &port_arg,
        "--json",
        r#"[[600,1],[1.5,2.5],["ok"]]"#,
    ]);
    assert!(addressed.status.success());
    let stdout = String::from_utf8_lossy(&addressed.stdout);
    assert!(stdout.contains("\"ints\":[600,1]"), "unexpected reply: {stdout}");
    assert!(stdout.contains("\"reals\":[1.5,2.5]"));
    assert!(stdout.contains("\"texts\":[\"ok\"]"));

    let status = wait_with_deadline(&mut child, Duration::from_secs(5));
    assert!(status.success());
}

#[test]
fn unknown_indicator_is_answered_with_global_buffer() {
    let port = free_port();
    let mut child = spawn_serve(port, &["--count", "2"]);
    wait_for_endpoint(port, Duration::from_secs(3));
    let port_arg = port.to_string();

    let first = mtbridge(&[
        "send", "--host", "127.0.0.1", "--port", &port_arg, "--texts", "kept",
    ]);
    assert!(first.status.success());

    let rejected = mtbridge(&[
        "send", "--host", "127.0.0.1", "--port", &port_arg, "--ints", "600,7",
    ]);
    assert!(rejected.status.success());
    let stdout = String::from_utf8_lossy(&rejected.stdout);
    assert!(stdout.contains("\"texts\":[\"kept\"]"), "unexpected reply: {stdout}");
    assert!(stdout.contains("\"ints\":[]"));

    assert!(wait_with_deadline(&mut child, Duration::from_secs(5)).success());
}

#[test]
fn native_framing_serves_matching_clients() {
    let port = free_port();
    let mut child = spawn_serve(port, &["--count", "1", "--wire", "native"]);
    let start = Instant::now();
    while TcpStream::connect(("127.0.0.1", port)).is_err() {
        assert!(start.elapsed() < Duration::from_secs(3), "endpoint did not come up");
        thread::sleep(Duration::from_millis(25));
    }
    let port_arg = port.to_string();

    let probe = mtbridge(&["probe", "--port", &port_arg, "--wire", "native"]);
    assert!(probe.status.success());

    let reply = mtbridge(&[
        "send", "--port", &port_arg, "--wire", "native", "--reals", "0.5",
    ]);
    assert!(reply.status.success());
    let stdout = String::from_utf8_lossy(&reply.stdout);
    assert!(stdout.contains("\"reals\":[0.5]"), "unexpected reply: {stdout}");

    assert!(wait_with_deadline(&mut child, Duration::from_secs(5)).success());
}

#[test]
fn send_to_closed_port_fails_with_exit_1() {
    let port = free_port();
    let output = mtbridge(&["send", "--port", &port.to_string(), "--ints", "1"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
}

#[test]
fn invalid_json_is_usage_error() {
    let output = mtbridge(&["send", "--port", "1", "--json", "{\"a\":1}"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_package_version() {
    let output = mtbridge(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("mtbridge {}", env!("CARGO_PKG_VERSION"))
    );
}
