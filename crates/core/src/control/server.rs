//! Stdio framing for the control surface
//!
//! Newline-delimited JSON: one request object per line in, one response
//! object per line out. Requests run concurrently in their own tasks; a
//! single writer task keeps response lines whole. Queries answer with
//! structured JSON, actions with human-readable text; failures carry the
//! error-kind prefix in the content.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::control::{action, query};
use crate::error::BridgeError;
use crate::state::GameState;

#[derive(Debug, Deserialize)]
struct ToolRequest {
    #[serde(default)]
    id: Option<Value>,
    tool: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct ToolResponse {
    id: Value,
    ok: bool,
    content: Value,
}

/// Serve tool requests over the process stdio. Returns on stdin EOF or
/// shutdown.
pub async fn run_control_server(
    state: Arc<GameState>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    tracing::info!("control server starting on stdio");
    serve(tokio::io::stdin(), tokio::io::stdout(), state, shutdown).await
}

/// The framing loop, generic over transport for testability.
pub async fn serve<R, W>(
    input: R,
    output: W,
    state: Arc<GameState>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (response_tx, mut response_rx) = mpsc::channel::<ToolResponse>(16);
    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(response) = response_rx.recv().await {
            let mut line = match serde_json::to_vec(&response) {
                Ok(line) => line,
                Err(err) => {
                    tracing::error!("unserializable response: {err}");
                    continue;
                }
            };
            line.push(b'\n');
            if output.write_all(&line).await.is_err() {
                break;
            }
            let _ = output.flush().await;
        }
    });

    let mut lines = BufReader::new(input).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.changed() => break,
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };
        if line.trim().is_empty() {
            continue;
        }

        let request: ToolRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                let _ = response_tx
                    .send(ToolResponse {
                        id: Value::Null,
                        ok: false,
                        content: Value::String(format!("InvalidArgument: malformed request: {err}")),
                    })
                    .await;
                continue;
            }
        };

        let id = request
            .id
            .unwrap_or_else(|| Value::String(Uuid::new_v4().to_string()));
        let state = Arc::clone(&state);
        let response_tx = response_tx.clone();
        let cancel = shutdown.clone();
        tokio::spawn(async move {
            let response = match dispatch(&request.tool, &request.arguments, &state, cancel).await {
                Ok(content) => ToolResponse {
                    id,
                    ok: true,
                    content,
                },
                Err(err) => ToolResponse {
                    id,
                    ok: false,
                    content: Value::String(err.to_string()),
                },
            };
            let _ = response_tx.send(response).await;
        });
    }

    drop(response_tx);
    let _ = writer.await;
    Ok(())
}

/// Route one tool invocation.
pub async fn dispatch(
    tool: &str,
    args: &Map<String, Value>,
    state: &GameState,
    cancel: watch::Receiver<bool>,
) -> Result<Value, BridgeError> {
    match tool {
        "get_status" => Ok(query::get_status(state)),
        "get_position" => query::get_position(state),
        "get_inventory" => query::get_inventory(state),
        "get_players" => query::get_players(state),
        "get_chat_history" => query::get_chat_history(state, opt_usize(args, "count")?),
        "get_world_info" => query::get_world_info(state),

        "chat" => action::chat(state, require_str(args, "message")?)
            .await
            .map(Value::String),
        "command" => action::command(state, require_str(args, "command")?)
            .await
            .map(Value::String),
        "teleport" => {
            let x = require_f64(args, "x")?;
            let y = require_f64(args, "y")?;
            let z = require_f64(args, "z")?;
            action::teleport(state, x, y, z).await.map(Value::String)
        }
        "upload_structure" => action::upload_structure(
            state,
            require_str(args, "file")?,
            opt_u64(args, "delay_ms")?,
            cancel,
        )
        .await
        .map(Value::String),
        "place_blocks" => action::place_blocks(
            state,
            require_str(args, "blocks")?,
            opt_u64(args, "delay_ms")?,
            cancel,
        )
        .await
        .map(Value::String),
        "toggle_packet_logging" => Ok(Value::String(action::toggle_packet_logging(
            state,
            require_bool(args, "enabled")?,
        ))),

        other => Err(BridgeError::invalid_argument(format!(
            "unknown tool {other:?}"
        ))),
    }
}

fn require_str<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str, BridgeError> {
    args.get(name).and_then(Value::as_str).ok_or_else(|| {
        BridgeError::invalid_argument(format!("missing or invalid string parameter {name:?}"))
    })
}

fn require_f64(args: &Map<String, Value>, name: &str) -> Result<f64, BridgeError> {
    args.get(name).and_then(Value::as_f64).ok_or_else(|| {
        BridgeError::invalid_argument(format!("missing or invalid number parameter {name:?}"))
    })
}

fn require_bool(args: &Map<String, Value>, name: &str) -> Result<bool, BridgeError> {
    args.get(name).and_then(Value::as_bool).ok_or_else(|| {
        BridgeError::invalid_argument(format!("missing or invalid boolean parameter {name:?}"))
    })
}

fn opt_u64(args: &Map<String, Value>, name: &str) -> Result<Option<u64>, BridgeError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            BridgeError::invalid_argument(format!("invalid number parameter {name:?}"))
        }),
    }
}

fn opt_usize(args: &Map<String, Value>, name: &str) -> Result<Option<usize>, BridgeError> {
    Ok(opt_u64(args, name)?.map(|v| v as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    use crate::state::Status;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn no_cancel() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        std::mem::forget(tx);
        rx
    }

    #[tokio::test]
    async fn test_dispatch_get_status() {
        let state = GameState::new();
        let value = dispatch("get_status", &Map::new(), &state, no_cancel())
            .await
            .unwrap();
        assert_eq!(value["status"], "starting");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let state = GameState::new();
        let err = dispatch("summon_dragon", &Map::new(), &state, no_cancel())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("InvalidArgument:"));
    }

    #[tokio::test]
    async fn test_dispatch_missing_argument() {
        let state = GameState::new();
        state.set_status(Status::Connected);
        let err = dispatch("chat", &Map::new(), &state, no_cancel())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("message"));

        let err = dispatch(
            "teleport",
            &args(json!({"x": 1.0, "y": "not a number", "z": 3.0})),
            &state,
            no_cancel(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().starts_with("InvalidArgument:"));
    }

    #[tokio::test]
    async fn test_dispatch_toggle_packet_logging() {
        let state = GameState::new();
        let value = dispatch(
            "toggle_packet_logging",
            &args(json!({"enabled": true})),
            &state,
            no_cancel(),
        )
        .await
        .unwrap();
        assert_eq!(value, "verbose packet logging enabled");
        assert!(state.verbose_packet_log());
    }

    #[tokio::test]
    async fn test_serve_framing_roundtrip() {
        let state = Arc::new(GameState::new());
        let (client, server) = tokio::io::duplex(4096);
        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (server_read, server_write) = tokio::io::split(server);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let serve_task = tokio::spawn(serve(server_read, server_write, state, shutdown_rx));

        client_write
            .write_all(b"{\"id\": 1, \"tool\": \"get_status\"}\n")
            .await
            .unwrap();
        client_write
            .write_all(b"not json at all\n")
            .await
            .unwrap();
        client_write
            .write_all(b"{\"id\": 2, \"tool\": \"get_position\"}\n")
            .await
            .unwrap();

        // Read until all three response lines arrived.
        let mut received = String::new();
        let mut buf = [0u8; 1024];
        while received.lines().count() < 3 {
            let n = client_read.read(&mut buf).await.unwrap();
            assert!(n > 0, "stream closed early: {received}");
            received.push_str(std::str::from_utf8(&buf[..n]).unwrap());
        }

        let responses: Vec<Value> = received
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        let by_id = |id: i64| {
            responses
                .iter()
                .find(|r| r["id"] == id)
                .unwrap_or_else(|| panic!("no response with id {id}"))
        };
        let status = by_id(1);
        assert_eq!(status["ok"], true);
        assert_eq!(status["content"]["status"], "starting");

        let position = by_id(2);
        assert_eq!(position["ok"], false);
        assert!(position["content"]
            .as_str()
            .unwrap()
            .starts_with("NotConnected:"));

        let malformed = responses.iter().find(|r| r["id"].is_null()).unwrap();
        assert_eq!(malformed["ok"], false);

        shutdown_tx.send(true).unwrap();
        serve_task.await.unwrap().unwrap();
    }
}
