/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! JSON-RPC message and parameter types for the editor protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::bridge::{FormattingOptions, Position};

/// JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(
    dead_code,
    reason = "Fields required by JSON-RPC protocol but not all are read"
)]
pub struct Request {
    /// The JSON-RPC version.
    pub jsonrpc: String,
    /// The request ID.
    pub id: RequestId,
    /// The method name.
    pub method: String,
    /// The request parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(
    dead_code,
    reason = "Fields required by JSON-RPC protocol but not all are read"
)]
pub struct Notification {
    /// The JSON-RPC version.
    pub jsonrpc: String,
    /// The method name.
    pub method: String,
    /// The notification parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Request ID can be string or number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    /// A numeric ID.
    Number(i64),
    /// A string ID.
    String(String),
}

/// JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The JSON-RPC version.
    pub jsonrpc: String,
    /// The request ID. `null` when the request could not be parsed.
    pub id: Option<RequestId>,
    /// The result of the request, if successful. `null` is a valid result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error, if the request failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    /// Creates a successful response.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the result cannot be converted to JSON.
    pub fn success(id: RequestId, result: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            result: Some(serde_json::to_value(result)?),
            error: None,
        })
    }

    /// Creates an error response.
    pub fn error(id: RequestId, code: i64, message: impl Into<String>) -> Self {
        Self::error_for(Some(id), code, message)
    }

    /// Creates the error response for a line that is not a valid message.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error_for(None, PARSE_ERROR, message)
    }

    fn error_for(id: Option<RequestId>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(ResponseError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// JSON-RPC response error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    /// The error code.
    pub code: i64,
    /// The error message.
    pub message: String,
    /// Additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// The line was not a JSON-RPC message.
pub const PARSE_ERROR: i64 = -32700;
/// The params were missing or did not match the method.
pub const INVALID_PARAMS: i64 = -32602;
/// The method was not found.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// An internal error occurred.
pub const INTERNAL_ERROR: i64 = -32603;
/// The formatter rejected the document.
pub const FORMAT_FAILED: i64 = -32001;
/// The client cancelled the request.
pub const REQUEST_CANCELLED: i64 = -32800;

/// `initialize` params. Everything is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Information about the client.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Information about the editor.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    /// The name of the client.
    pub name: String,
    /// The version of the client.
    #[serde(default)]
    pub version: Option<String>,
}

/// `initialize` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// The capabilities of the server.
    pub capabilities: ServerCapabilities,
    /// Information about the server.
    pub server_info: ServerInfo,
}

/// What this server can do.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    /// `resolveDeclaration` is available.
    pub declaration_provider: bool,
    /// `formatDocument` is available.
    pub document_formatting_provider: FormattingCapability,
}

/// Formatting capability details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattingCapability {
    /// Typed characters after which the editor may request a reformat.
    pub auto_format_trigger_characters: Vec<String>,
}

/// Information about the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// The name of the server.
    pub name: String,
    /// The version of the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// `resolveDeclaration` params.
#[derive(Debug, Clone, Deserialize)]
pub struct DeclarationParams {
    /// File the buffer belongs to.
    pub path: PathBuf,
    /// Current buffer contents, unsaved edits included.
    pub text: String,
    /// Cursor position, 1-based.
    pub position: Position,
}

/// `formatDocument` params.
#[derive(Debug, Clone, Deserialize)]
pub struct FormattingParams {
    /// File to format.
    pub path: PathBuf,
    /// Current buffer contents.
    pub text: String,
    /// Editor preferences, unused.
    #[serde(default)]
    pub options: FormattingOptions,
}

/// `$/cancelRequest` params.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelParams {
    /// The request to cancel.
    pub id: RequestId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn test_deserialize_initialize_params() -> Result<()> {
        let json = r#"{
            "clientInfo": {
                "name": "test-editor",
                "version": "1.0.0"
            }
        }"#;

        let params: InitializeParams = serde_json::from_str(json)?;
        let client = params.client_info.context("missing client info")?;
        assert_eq!(client.name, "test-editor");
        assert_eq!(client.version.as_deref(), Some("1.0.0"));

        let empty: InitializeParams = serde_json::from_str("{}")?;
        assert!(empty.client_info.is_none());
        Ok(())
    }

    #[test]
    fn test_serialize_initialize_result() -> Result<()> {
        let result = InitializeResult {
            capabilities: ServerCapabilities {
                declaration_provider: true,
                document_formatting_provider: FormattingCapability {
                    auto_format_trigger_characters: vec![";".to_string()],
                },
            },
            server_info: ServerInfo {
                name: "toolbridge".to_string(),
                version: Some("0.1.0".to_string()),
            },
        };

        let json = serde_json::to_value(&result)?;
        assert_eq!(json["capabilities"]["declarationProvider"], true);
        assert_eq!(
            json["capabilities"]["documentFormattingProvider"]["autoFormatTriggerCharacters"][0],
            ";"
        );
        assert_eq!(json["serverInfo"]["name"], "toolbridge");
        Ok(())
    }

    #[test]
    fn test_response_success_null_result_is_kept() -> Result<()> {
        let response = Response::success(RequestId::Number(1), Option::<u32>::None)?;
        let json = serde_json::to_string(&response)?;
        assert!(json.contains(r#""result":null"#), "{json}");
        assert!(!json.contains("error"));
        Ok(())
    }

    #[test]
    fn test_response_error() -> Result<()> {
        let response = Response::error(RequestId::String("a".to_string()), FORMAT_FAILED, "nope");
        let json = serde_json::to_value(&response)?;
        assert_eq!(json["id"], "a");
        assert_eq!(json["error"]["code"], -32001);
        assert!(json.get("result").is_none());
        Ok(())
    }

    #[test]
    fn test_parse_error_has_null_id() -> Result<()> {
        let json = serde_json::to_string(&Response::parse_error("Parse error"))?;
        assert!(json.contains(r#""id":null"#), "{json}");
        assert!(json.contains(r#""code":-32700"#), "{json}");
        Ok(())
    }

    #[test]
    fn test_deserialize_declaration_params() -> Result<()> {
        let params: DeclarationParams = serde_json::from_value(serde_json::json!({
            "path": "/work/main.go",
            "text": "package main\n",
            "position": {"line": 1, "column": 9}
        }))?;
        assert_eq!(params.position, Position::new(1, 9));
        assert_eq!(params.path, PathBuf::from("/work/main.go"));
        Ok(())
    }

    #[test]
    fn test_deserialize_formatting_params_without_options() -> Result<()> {
        let params: FormattingParams = serde_json::from_value(serde_json::json!({
            "path": "/work/main.go",
            "text": ""
        }))?;
        assert!(params.options.tab_size.is_none());
        Ok(())
    }

    #[test]
    fn test_request_id_untagged() -> Result<()> {
        let cancel: CancelParams = serde_json::from_str(r#"{"id": 7}"#)?;
        assert_eq!(cancel.id, RequestId::Number(7));
        let cancel: CancelParams = serde_json::from_str(r#"{"id": "req-7"}"#)?;
        assert_eq!(cancel.id, RequestId::String("req-7".to_string()));
        Ok(())
    }
}
