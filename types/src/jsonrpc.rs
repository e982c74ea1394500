//! JSON-RPC 2.0 wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard and implementation-defined JSON-RPC error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Transport-level failures (bad session, bad headers).
    pub const SERVER_ERROR: i32 = -32000;
    /// Request reached a session that has already closed.
    pub const SESSION_NOT_FOUND: i32 = -32001;
}

/// JSON-RPC 2.0 Request or notification.
///
/// A request without an `id` is a notification and never gets a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a request with the given id.
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// Create a notification (no id, no response expected).
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params,
        }
    }

    /// Whether this message is a notification.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Whether this message is a well-formed `initialize` handshake.
    ///
    /// Only a request (with an id) whose params carry the required handshake
    /// fields qualifies.
    pub fn is_initialize(&self) -> bool {
        if self.method != "initialize" || self.id.is_none() {
            return false;
        }
        self.params
            .as_ref()
            .and_then(|p| serde_json::from_value::<crate::InitializeParams>(p.clone()).ok())
            .is_some()
    }
}

/// JSON-RPC 2.0 Response.
///
/// `id` is always serialized; transport-level errors carry `"id": null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// JSON-RPC 2.0 Error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Any single message a client may send.
///
/// Responses arrive when the client answers a server-initiated request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
}

impl JsonRpcMessage {
    /// The request, if this message is one.
    pub fn as_request(&self) -> Option<&JsonRpcRequest> {
        match self {
            JsonRpcMessage::Request(req) => Some(req),
            JsonRpcMessage::Response(_) => None,
        }
    }
}

/// A POST body: one message or a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum JsonRpcPayload {
    Batch(Vec<JsonRpcMessage>),
    Single(JsonRpcMessage),
}

impl JsonRpcPayload {
    /// Whether any message in the payload is an `initialize` handshake.
    pub fn contains_initialize(&self) -> bool {
        self.messages()
            .iter()
            .filter_map(|m| m.as_request())
            .any(JsonRpcRequest::is_initialize)
    }

    /// Borrow the messages in order.
    pub fn messages(&self) -> &[JsonRpcMessage] {
        match self {
            JsonRpcPayload::Batch(messages) => messages,
            JsonRpcPayload::Single(message) => std::slice::from_ref(message),
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, JsonRpcPayload::Batch(_))
    }

    pub fn into_messages(self) -> Vec<JsonRpcMessage> {
        match self {
            JsonRpcPayload::Batch(messages) => messages,
            JsonRpcPayload::Single(message) => vec![message],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn init_body() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": { "name": "test", "version": "1.0" }
            }
        })
    }

    #[test]
    fn test_initialize_detection() {
        let payload: JsonRpcPayload = serde_json::from_value(init_body()).unwrap();
        assert!(payload.contains_initialize());
        assert!(!payload.is_batch());
    }

    #[test]
    fn test_initialize_without_client_info_is_not_handshake() {
        let payload: JsonRpcPayload = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {}
        }))
        .unwrap();
        assert!(!payload.contains_initialize());
    }

    #[test]
    fn test_initialize_notification_is_not_handshake() {
        let req = JsonRpcRequest::notification("initialize", Some(init_body()["params"].clone()));
        assert!(!req.is_initialize());
    }

    #[test]
    fn test_batch_parsing() {
        let payload: JsonRpcPayload = serde_json::from_value(json!([
            { "jsonrpc": "2.0", "id": 1, "method": "ping" },
            { "jsonrpc": "2.0", "method": "notifications/initialized" },
            { "jsonrpc": "2.0", "id": 7, "result": {} }
        ]))
        .unwrap();
        assert!(payload.is_batch());
        let messages = payload.into_messages();
        assert_eq!(messages.len(), 3);
        assert!(!messages[0].as_request().unwrap().is_notification());
        assert!(messages[1].as_request().unwrap().is_notification());
        assert!(matches!(messages[2], JsonRpcMessage::Response(_)));
    }

    #[test]
    fn test_error_envelope_serializes_null_id() {
        let resp = JsonRpcResponse::error(None, error_codes::SERVER_ERROR, "nope");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "error": { "code": -32000, "message": "nope" },
                "id": null
            })
        );
    }
}
