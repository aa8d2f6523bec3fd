//! Integration tests for the gateway-chat binary.
//! Uses assert_cmd to run the binary, a real temp config, and an in-process
//! gateway that walks through challenge, hello-ok, history and one reply.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write as _;
use std::net::TcpListener as StdTcpListener;

/// Pick a free port by binding to :0 and extracting the assigned port.
fn free_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Write a minimal YAML config to a temp file pointing at `port`.
fn write_config(dir: &tempfile::TempDir, port: u16) -> std::path::PathBuf {
    let path = dir.path().join("config.yaml");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(
        f,
        "gateway:\n  url: ws://127.0.0.1:{}\n  token: test-token\nchat:\n  model: test/model",
        port
    )
    .unwrap();
    path
}

fn gateway_chat() -> Command {
    let mut cmd = Command::from(cargo_bin_cmd!("gateway-chat"));
    cmd.env_remove("GATEWAY_CHAT_URL")
        .env_remove("GATEWAY_CHAT_TOKEN")
        .env_remove("GATEWAY_CHAT_CONFIG")
        .timeout(std::time::Duration::from_secs(20));
    cmd
}

/// Spawn a gateway that serves one connection: handshake, empty history,
/// then a streamed reply to the first `chat.send`.
fn spawn_test_gateway(port: u16) -> std::thread::JoinHandle<()> {
    spawn_gateway_with_history(port, serde_json::json!([]))
}

fn spawn_gateway_with_history(
    port: u16,
    history: serde_json::Value,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            use futures_util::{SinkExt, StreamExt};
            use tokio_tungstenite::tungstenite::Message;

            let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
                .await
                .unwrap();
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let (mut write, mut read) = ws.split();

            write
                .send(Message::Text(r#"{"type":"event","event":"connect.challenge"}"#.into()))
                .await
                .unwrap();

            while let Some(Ok(message)) = read.next().await {
                let Message::Text(text) = message else { continue };
                let request: serde_json::Value = serde_json::from_str(&text).unwrap();
                let id = request["id"].clone();
                match request["method"].as_str() {
                    Some("connect") => {
                        assert_eq!(request["params"]["auth"]["token"], "test-token");
                        let res = serde_json::json!({"type": "res", "id": id, "payload": {"type": "hello-ok"}});
                        write.send(Message::Text(res.to_string())).await.unwrap();
                    }
                    Some("chat.history") => {
                        let res = serde_json::json!({"type": "res", "id": id, "payload": {"messages": history.clone()}});
                        write.send(Message::Text(res.to_string())).await.unwrap();
                    }
                    Some("chat.send") => {
                        assert_eq!(request["params"]["model"], "test/model");
                        for chunk in ["Test ", "answer."] {
                            let event = serde_json::json!({"type": "event", "event": "chat", "payload": {
                                "message": {"role": "assistant", "content": chunk}, "streaming": true
                            }});
                            write.send(Message::Text(event.to_string())).await.unwrap();
                        }
                        let event = serde_json::json!({"type": "event", "event": "chat", "payload": {
                            "message": {"role": "assistant", "content": "Test answer."}
                        }});
                        write.send(Message::Text(event.to_string())).await.unwrap();
                    }
                    _ => {}
                }
            }
        });
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn positional_message_prints_streamed_reply() {
    let port = free_port();
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, port);

    let _server = spawn_test_gateway(port);
    std::thread::sleep(std::time::Duration::from_millis(100));

    let mut cmd = gateway_chat();
    cmd.arg("--config").arg(&config_path).arg("What is the answer?");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("assistant: Test answer."));
}

#[test]
fn history_reply_does_not_end_one_shot_session() {
    let port = free_port();
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, port);

    let history = serde_json::json!([
        {"role": "user", "content": "earlier question"},
        {"role": "assistant", "content": "earlier answer"}
    ]);
    let _server = spawn_gateway_with_history(port, history);
    std::thread::sleep(std::time::Duration::from_millis(100));

    let mut cmd = gateway_chat();
    cmd.arg("--config").arg(&config_path).arg("What is the answer?");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("assistant: earlier answer"))
        .stdout(predicate::str::contains("assistant: Test answer."));
}

#[test]
fn stdin_message_with_config_env_var() {
    let port = free_port();
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, port);

    let _server = spawn_test_gateway(port);
    std::thread::sleep(std::time::Duration::from_millis(100));

    let mut cmd = gateway_chat();
    cmd.env("GATEWAY_CHAT_CONFIG", &config_path)
        .write_stdin("What is the answer?\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Test answer."));
}

#[test]
fn url_flag_overrides_missing_config_file() {
    let port = free_port();
    let dir = tempfile::tempdir().unwrap();

    let _server = spawn_test_gateway(port);
    std::thread::sleep(std::time::Duration::from_millis(100));

    let mut cmd = gateway_chat();
    cmd.arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .arg("--url")
        .arg(format!("ws://127.0.0.1:{}", port))
        .arg("--token")
        .arg("test-token")
        .arg("--model")
        .arg("test/model")
        .arg("hello");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Test answer."));
}

#[test]
fn gateway_down_shows_error() {
    let port = free_port();
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, port);

    let mut cmd = gateway_chat();
    cmd.arg("--config").arg(&config_path).write_stdin("hello\n");

    cmd.assert()
        .failure()
        .stderr(predicate::str::is_match("(?i)(connect|error|refused|disconnected)").unwrap());
}

#[test]
fn invalid_url_is_reported() {
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = gateway_chat();
    cmd.arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .arg("--url")
        .arg("not a url")
        .arg("hello");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("disconnected"));
}
