// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Line-delimited JSON-RPC server for editor hosts.
//!
//! Each request runs in its own task, so a slow tool never blocks other
//! requests and responses go out in completion order. `$/cancelRequest`
//! kills the tool behind an in-flight request.

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::types::{
    CancelParams, DeclarationParams, FORMAT_FAILED, FormattingCapability, FormattingParams,
    INTERNAL_ERROR, INVALID_PARAMS, InitializeParams, InitializeResult, METHOD_NOT_FOUND,
    Notification, REQUEST_CANCELLED, Request, RequestId, Response, ServerCapabilities, ServerInfo,
};
use crate::bridge::{
    AUTO_FORMAT_TRIGGER_CHARACTERS, Bridge, CancelHandle, CancelSignal, DeclarationError,
    FormatError, cancellation,
};

type InFlight = Arc<Mutex<HashMap<RequestId, CancelHandle>>>;

/// Serves declaration and formatting requests for one editor connection.
pub struct RpcServer {
    bridge: Arc<Bridge>,
    in_flight: InFlight,
}

/// Whether the read loop should keep going after a message.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Shutdown,
}

impl RpcServer {
    pub fn new(bridge: Bridge) -> Self {
        Self {
            bridge: Arc::new(bridge),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs the server until `reader` closes or `shutdown` is received.
    ///
    /// Requests still running when input ends are allowed to finish and
    /// their responses are written before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or writing a response fails.
    pub async fn run<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<Response>();
        let writer_task = tokio::spawn(write_responses(rx, writer));

        info!("Server starting, waiting for requests on stdin");

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read from stdin")?
        {
            if line.trim().is_empty() {
                continue;
            }

            trace!("Received: {}", line);

            if self.handle_message(&line, &tx) == Flow::Shutdown {
                info!("Shutdown requested");
                break;
            }
        }

        info!("Input closed, waiting for in-flight requests");
        drop(tx);
        writer_task
            .await
            .context("Response writer panicked")??;
        info!("Server shut down");
        Ok(())
    }

    fn handle_message(&self, line: &str, tx: &mpsc::UnboundedSender<Response>) -> Flow {
        // Try to parse as request first
        if let Ok(request) = serde_json::from_str::<Request>(line) {
            return self.handle_request(request, tx);
        }

        if let Ok(notification) = serde_json::from_str::<Notification>(line) {
            self.handle_notification(notification);
            return Flow::Continue;
        }

        warn!("Failed to parse message as request or notification");
        let _ = tx.send(Response::parse_error(
            "Failed to parse message as request or notification",
        ));
        Flow::Continue
    }

    fn handle_request(&self, request: Request, tx: &mpsc::UnboundedSender<Response>) -> Flow {
        debug!("Handling request: {} (id={:?})", request.method, request.id);

        let response = match request.method.as_str() {
            "initialize" => Self::handle_initialize(request),
            "ping" => success(request.id, serde_json::json!({})),
            "shutdown" => {
                self.cancel_all();
                let _ = tx.send(success(request.id, serde_json::Value::Null));
                return Flow::Shutdown;
            }
            "resolveDeclaration" => {
                self.spawn_declaration(request, tx);
                return Flow::Continue;
            }
            "formatDocument" => {
                self.spawn_formatting(request, tx);
                return Flow::Continue;
            }
            _ => {
                warn!("Unknown method: {}", request.method);
                Response::error(
                    request.id,
                    METHOD_NOT_FOUND,
                    format!("Unknown method: {}", request.method),
                )
            }
        };

        let _ = tx.send(response);
        Flow::Continue
    }

    fn handle_notification(&self, notification: Notification) {
        debug!("Handling notification: {}", notification.method);

        match notification.method.as_str() {
            "$/cancelRequest" => match parse_params::<CancelParams>(notification.params) {
                Ok(params) => self.cancel(&params.id),
                Err(e) => warn!("Ignoring malformed cancel: {e}"),
            },
            "initialized" => info!("Client initialized"),
            _ => debug!("Ignoring unknown notification: {}", notification.method),
        }
    }

    fn handle_initialize(request: Request) -> Response {
        let params: InitializeParams = parse_params(request.params).unwrap_or_default();
        if let Some(client) = &params.client_info {
            info!(
                "Client connecting: {} v{}",
                client.name,
                client.version.as_deref().unwrap_or("unknown")
            );
        }

        let result = InitializeResult {
            capabilities: ServerCapabilities {
                declaration_provider: true,
                document_formatting_provider: FormattingCapability {
                    auto_format_trigger_characters: AUTO_FORMAT_TRIGGER_CHARACTERS
                        .iter()
                        .map(|c| (*c).to_string())
                        .collect(),
                },
            },
            server_info: ServerInfo {
                name: "toolbridge".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
        };

        success(request.id, result)
    }

    fn spawn_declaration(&self, request: Request, tx: &mpsc::UnboundedSender<Response>) {
        let params: DeclarationParams = match parse_params(request.params) {
            Ok(params) => params,
            Err(e) => {
                let _ = tx.send(Response::error(request.id, INVALID_PARAMS, e.to_string()));
                return;
            }
        };

        let id = request.id;
        let Some(signal) = self.register(&id) else {
            let _ = tx.send(duplicate_id(id));
            return;
        };
        let bridge = Arc::clone(&self.bridge);
        let in_flight = Arc::clone(&self.in_flight);
        let tx = tx.clone();

        tokio::spawn(async move {
            let result = bridge
                .resolve_declaration(&params.path, &params.text, params.position, &signal)
                .await;
            unregister(&in_flight, &id);

            let response = match result {
                Ok(location) => success(id, location),
                Err(DeclarationError::InvalidPosition(e)) => {
                    Response::error(id, INVALID_PARAMS, e.to_string())
                }
                Err(DeclarationError::Cancelled) => {
                    Response::error(id, REQUEST_CANCELLED, "Request cancelled")
                }
                Err(e @ DeclarationError::MalformedOutput { .. }) => {
                    error!("{e}");
                    Response::error(id, INTERNAL_ERROR, e.to_string())
                }
            };
            let _ = tx.send(response);
        });
    }

    fn spawn_formatting(&self, request: Request, tx: &mpsc::UnboundedSender<Response>) {
        let params: FormattingParams = match parse_params(request.params) {
            Ok(params) => params,
            Err(e) => {
                let _ = tx.send(Response::error(request.id, INVALID_PARAMS, e.to_string()));
                return;
            }
        };

        let id = request.id;
        let Some(signal) = self.register(&id) else {
            let _ = tx.send(duplicate_id(id));
            return;
        };
        let bridge = Arc::clone(&self.bridge);
        let in_flight = Arc::clone(&self.in_flight);
        let tx = tx.clone();

        tokio::spawn(async move {
            let result = bridge
                .format_document(&params.path, &params.text, &params.options, &signal)
                .await;
            unregister(&in_flight, &id);

            let response = match result {
                Ok(edits) => success(id, edits),
                Err(FormatError::Cancelled) => {
                    Response::error(id, REQUEST_CANCELLED, "Request cancelled")
                }
                Err(e) => {
                    if let FormatError::SyntaxErrors { detail } = &e {
                        info!("Formatting {} failed: {detail}", params.path.display());
                    }
                    Response::error(id, FORMAT_FAILED, e.to_string())
                }
            };
            let _ = tx.send(response);
        });
    }

    /// Tracks `id` as in flight. Returns `None` if a request with the same
    /// id is still running.
    fn register(&self, id: &RequestId) -> Option<CancelSignal> {
        let (handle, signal) = cancellation();
        if let Ok(mut in_flight) = self.in_flight.lock() {
            if in_flight.contains_key(id) {
                warn!("Request id {:?} is already in flight", id);
                return None;
            }
            in_flight.insert(id.clone(), handle);
        }
        Some(signal)
    }

    fn cancel(&self, id: &RequestId) {
        let handle = self
            .in_flight
            .lock()
            .ok()
            .and_then(|mut in_flight| in_flight.remove(id));
        match handle {
            Some(handle) => {
                debug!("Cancelling request {:?}", id);
                handle.cancel();
            }
            None => debug!("Cancel for unknown or finished request {:?}", id),
        }
    }

    fn cancel_all(&self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            for (_, handle) in in_flight.drain() {
                handle.cancel();
            }
        }
    }
}

fn unregister(in_flight: &InFlight, id: &RequestId) {
    if let Ok(mut in_flight) = in_flight.lock() {
        in_flight.remove(id);
    }
}

fn duplicate_id(id: RequestId) -> Response {
    Response::error(id, INVALID_PARAMS, "Request id is already in flight")
}

fn parse_params<T: DeserializeOwned>(params: Option<serde_json::Value>) -> Result<T> {
    let params = params.ok_or_else(|| anyhow!("Missing params"))?;
    serde_json::from_value(params).context("Invalid params")
}

fn success(id: RequestId, result: impl Serialize) -> Response {
    Response::success(id.clone(), result)
        .unwrap_or_else(|e| Response::error(id, INTERNAL_ERROR, e.to_string()))
}

async fn write_responses<W>(mut rx: mpsc::UnboundedReceiver<Response>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let response_json = serde_json::to_string(&response)?;
        trace!("Sending: {}", response_json);
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DeclarationConfig, FormatConfig};
    use crate::rpc::types::PARSE_ERROR;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::io::{DuplexStream, Lines};

    struct TestClient {
        input: DuplexStream,
        output: Lines<BufReader<DuplexStream>>,
        server: tokio::task::JoinHandle<Result<()>>,
    }

    impl TestClient {
        fn start(declaration_script: &str, format_script: &str) -> Self {
            let config = Config {
                declaration: DeclarationConfig {
                    command: "sh".to_string(),
                    args: vec!["-c".to_string(), declaration_script.to_string(), "godef".to_string()],
                    ..DeclarationConfig::default()
                },
                format: FormatConfig {
                    command: "sh".to_string(),
                    flags: vec!["-c".to_string(), format_script.to_string(), "gofmt".to_string()],
                    ..FormatConfig::default()
                },
                ..Config::default()
            };

            let (input, server_in) = tokio::io::duplex(64 * 1024);
            let (server_out, output) = tokio::io::duplex(64 * 1024);
            let server = tokio::spawn(RpcServer::new(Bridge::new(config)).run(server_in, server_out));

            Self {
                input,
                output: BufReader::new(output).lines(),
                server,
            }
        }

        async fn send(&mut self, message: &Value) {
            let line = format!("{message}\n");
            self.input.write_all(line.as_bytes()).await.unwrap();
        }

        async fn recv(&mut self) -> Value {
            let line = tokio::time::timeout(Duration::from_secs(10), self.output.next_line())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    fn declaration_request(id: i64, line: u32, column: u32) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "resolveDeclaration",
            "params": {
                "path": "/work/main.go",
                "text": "package main\n\nfunc main() {\n\tx := 1\n}\n",
                "position": {"line": line, "column": column}
            }
        })
    }

    #[tokio::test]
    async fn test_initialize() {
        let mut client = TestClient::start("true", "true");
        client
            .send(&json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "clientInfo": {"name": "test-editor"}
            }}))
            .await;

        let response = client.recv().await;
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["capabilities"]["declarationProvider"], true);
        assert_eq!(
            response["result"]["capabilities"]["documentFormattingProvider"]["autoFormatTriggerCharacters"],
            json!([";", "}", "\n"])
        );
        assert_eq!(response["result"]["serverInfo"]["name"], "toolbridge");
    }

    #[tokio::test]
    async fn test_resolve_declaration_found() {
        let mut client = TestClient::start("cat > /dev/null; echo /work/lib.go:7:2", "true");
        client.send(&declaration_request(2, 4, 2)).await;

        let response = client.recv().await;
        assert_eq!(response["id"], 2);
        assert_eq!(response["result"]["uri"], "file:///work/lib.go");
        assert_eq!(
            response["result"]["range"],
            json!({"startLine": 7, "startCol": 2, "endLine": 7, "endCol": 3})
        );
    }

    #[tokio::test]
    async fn test_resolve_declaration_tool_failure_is_null() {
        let mut client = TestClient::start("cat > /dev/null; exit 1", "true");
        client.send(&declaration_request(3, 1, 1)).await;

        let response = client.recv().await;
        assert_eq!(response["id"], 3);
        assert!(response["result"].is_null());
        assert!(response.get("error").is_none());
    }

    #[tokio::test]
    async fn test_resolve_declaration_malformed_is_error() {
        let mut client = TestClient::start("cat > /dev/null; echo garbage", "true");
        client.send(&declaration_request(4, 1, 1)).await;

        let response = client.recv().await;
        assert_eq!(response["error"]["code"], INTERNAL_ERROR);
        assert!(
            response["error"]["message"]
                .as_str()
                .unwrap()
                .contains("malformed")
        );
    }

    #[tokio::test]
    async fn test_resolve_declaration_invalid_position() {
        let mut client = TestClient::start("true", "true");
        client.send(&declaration_request(5, 99, 1)).await;

        let response = client.recv().await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_missing_params() {
        let mut client = TestClient::start("true", "true");
        client
            .send(&json!({"jsonrpc": "2.0", "id": 6, "method": "formatDocument"}))
            .await;

        let response = client.recv().await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_format_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("main.go");
        std::fs::write(&path, "package main\n").unwrap();

        let mut client = TestClient::start("true", "cat \"$1\"");
        client
            .send(&json!({"jsonrpc": "2.0", "id": 7, "method": "formatDocument", "params": {
                "path": path,
                "text": "package  main",
                "options": {"tabSize": 4, "insertSpaces": false}
            }}))
            .await;

        let response = client.recv().await;
        assert_eq!(
            response["result"],
            json!([{
                "replacementText": "package main\n",
                "range": {"startLine": 1, "startCol": 1, "endLine": 1, "endCol": 14}
            }])
        );
    }

    #[tokio::test]
    async fn test_format_document_failure() {
        let mut client = TestClient::start("true", "exit 2");
        client
            .send(&json!({"jsonrpc": "2.0", "id": 8, "method": "formatDocument", "params": {
                "path": "/work/main.go",
                "text": "func {"
            }}))
            .await;

        let response = client.recv().await;
        assert_eq!(response["error"]["code"], FORMAT_FAILED);
        assert_eq!(
            response["error"]["message"],
            "Cannot format due to syntax errors."
        );
    }

    #[tokio::test]
    async fn test_cancel_request() {
        let mut client = TestClient::start("sleep 10; echo late.go:1:1", "true");
        client.send(&declaration_request(9, 1, 1)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        client
            .send(&json!({"jsonrpc": "2.0", "method": "$/cancelRequest", "params": {"id": 9}}))
            .await;

        let response = client.recv().await;
        assert_eq!(response["id"], 9);
        assert_eq!(response["error"]["code"], REQUEST_CANCELLED);
    }

    #[tokio::test]
    async fn test_overlapping_requests_use_own_offsets() {
        // The tool reports offset + 1 as the line; the first request sleeps
        // longer so responses arrive out of order.
        let script = "cat > /dev/null; if [ \"$6\" = 0 ]; then sleep 0.5; fi; echo \"/work/main.go:$(($6 + 1)):1\"";
        let mut client = TestClient::start(script, "true");

        client.send(&declaration_request(10, 1, 1)).await;
        client.send(&declaration_request(11, 4, 2)).await;

        let first = client.recv().await;
        let second = client.recv().await;

        assert_eq!(first["id"], 11);
        // Offset 29: "package main" (13) + "" (1) + "func main() {" (14) + 1
        assert_eq!(first["result"]["range"]["startLine"], 30);
        assert_eq!(second["id"], 10);
        assert_eq!(second["result"]["range"]["startLine"], 1);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let mut client = TestClient::start("true", "true");
        client
            .send(&json!({"jsonrpc": "2.0", "id": 12, "method": "textDocument/hover"}))
            .await;

        let response = client.recv().await;
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_shutdown_stops_server() {
        let mut client = TestClient::start("true", "true");
        client
            .send(&json!({"jsonrpc": "2.0", "id": 13, "method": "shutdown"}))
            .await;

        let response = client.recv().await;
        assert_eq!(response["id"], 13);
        assert!(response["result"].is_null());

        let result = tokio::time::timeout(Duration::from_secs(5), client.server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_garbage_line_gets_parse_error() {
        let mut client = TestClient::start("true", "true");
        client.input.write_all(b"not json\n").await.unwrap();
        client
            .send(&json!({"jsonrpc": "2.0", "id": 14, "method": "ping"}))
            .await;

        let response = client.recv().await;
        assert!(response["id"].is_null(), "{response}");
        assert_eq!(response["error"]["code"], PARSE_ERROR);

        let response = client.recv().await;
        assert_eq!(response["id"], 14);
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn test_duplicate_in_flight_id_is_rejected() {
        let mut client = TestClient::start("sleep 10; echo late.go:1:1", "true");
        client.send(&declaration_request(15, 1, 1)).await;
        client.send(&declaration_request(15, 4, 2)).await;

        let response = client.recv().await;
        assert_eq!(response["id"], 15);
        assert_eq!(response["error"]["code"], INVALID_PARAMS);

        // The first request is still tracked and can be cancelled
        client
            .send(&json!({"jsonrpc": "2.0", "method": "$/cancelRequest", "params": {"id": 15}}))
            .await;
        let response = client.recv().await;
        assert_eq!(response["id"], 15);
        assert_eq!(response["error"]["code"], REQUEST_CANCELLED);
    }

    #[tokio::test]
    async fn test_id_reusable_after_completion() {
        let mut client = TestClient::start("cat > /dev/null; echo /work/lib.go:7:2", "true");
        for _ in 0..2 {
            client.send(&declaration_request(16, 4, 2)).await;
            let response = client.recv().await;
            assert_eq!(response["id"], 16);
            assert_eq!(response["result"]["range"]["startLine"], 7, "{response}");
        }
    }
}
