#![cfg(feature = "cli")]

use std::net::TcpListener;
use std::process::{Command, Output};
use std::thread;

use serde_json::{json, Value};
use tungstenite::Message;

/// Serve connections until the test exits, answering with `reply(request)`;
/// `None` leaves a request unanswered.
fn daemon(reply: fn(&Value) -> Option<Value>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { return };
            thread::spawn(move || {
                let Ok(mut socket) = tungstenite::accept(stream) else {
                    return;
                };
                while let Ok(message) = socket.read() {
                    let Message::Text(text) = message else {
                        continue;
                    };
                    let request: Value =
                        serde_json::from_str(&text).expect("client sends JSON");
                    if let Some(answer) = reply(&request) {
                        if socket.send(Message::Text(answer.to_string())).is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });
    port
}

fn raspio(port: u16, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_raspio"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .env("RASPIO_PORT", port.to_string())
        .env_remove("RASPIO_TIMEOUT")
        .output()
        .expect("raspio should run")
}

fn stdout_json(output: &Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).expect("stdout should be one JSON object")
}

fn answer_everything(request: &Value) -> Option<Value> {
    let data = match request["handle"].as_str() {
        Some("read" | "xfer" | "xfer2") => json!("AQI="),
        Some("write") => json!(request["data"].as_str().map_or(0, |d| d.len() / 4 * 3)),
        _ => json!(""),
    };
    Some(json!({ "handle": request["handle"], "ack": true, "data": data }))
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_raspio"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("raspio {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn i2c_read_prints_bytes() {
    let port = daemon(answer_everything);
    let output = raspio(
        port,
        &["i2c", "read", "127.0.0.1", "--addr", "0x48", "--size", "2"],
    );

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report = stdout_json(&output);
    assert_eq!(report["operation"], "i2c.read");
    assert_eq!(report["size"], 2);
    assert_eq!(report["hex"], "0102");
    assert_eq!(report["base64"], "AQI=");
}

#[test]
fn spi_write_prints_count() {
    let port = daemon(answer_everything);
    let output = raspio(port, &["spi", "write", "127.0.0.1", "--data", "a1b2c3"]);

    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["operation"], "spi.write");
    assert_eq!(report["written"], 3);
}

#[test]
fn call_prints_each_ack() {
    let port = daemon(answer_everything);
    let output = raspio(
        port,
        &[
            "call",
            "127.0.0.1",
            "--path",
            "gpio",
            "--open",
            r#"{"handle":"open","pin":18}"#,
            "--close",
            r#"{"handle":"close","pin":18}"#,
            "--request",
            r#"{"handle":"read","size":2}"#,
        ],
    );

    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["operation"], "read");
    assert_eq!(report["ack"], true);
    assert_eq!(report["data"], "AQI=");
}

#[test]
fn rejected_open_exits_1_with_reason() {
    let port = daemon(|_| Some(json!({ "ack": false, "data": "device busy" })));
    let output = raspio(
        port,
        &["serial", "read", "127.0.0.1", "--device", "/dev/ttyS0"],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("device busy"), "stderr: {stderr}");
}

#[test]
fn silent_daemon_exits_124() {
    let port = daemon(|request| match request["handle"].as_str() {
        Some("read") => None,
        _ => Some(json!({ "ack": true, "data": "" })),
    });
    let output = raspio(
        port,
        &["i2c", "read", "127.0.0.1", "--addr", "0x48", "--size", "1", "--timeout", "200ms"],
    );

    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn unreachable_daemon_exits_3() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        listener.local_addr().expect("local addr").port()
    };
    let output = raspio(
        port,
        &["spi", "read", "127.0.0.1", "--size", "1", "--connect-timeout", "1s"],
    );

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn malformed_reply_exits_60() {
    let port = daemon(|request| match request["handle"].as_str() {
        Some("read") => Some(json!({ "ack": true, "data": "b'AQI='" })),
        _ => Some(json!({ "ack": true, "data": "" })),
    });
    let output = raspio(port, &["spi", "read", "127.0.0.1", "--size", "2"]);

    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn invalid_request_json_exits_64() {
    let output = raspio(
        1,
        &[
            "call",
            "127.0.0.1",
            "--path",
            "i2c",
            "--open",
            "{not json",
            "--close",
            r#"{"handle":"close"}"#,
            "--request",
            r#"{"handle":"read"}"#,
        ],
    );

    assert_eq!(output.status.code(), Some(64));
}
