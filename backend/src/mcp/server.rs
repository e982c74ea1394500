//! MCP JSON-RPC request handler.
//!
//! Handles MCP protocol methods and dispatches tool calls and resource reads
//! through the static registry.

use super::error::CapabilityError;
use super::registry::{Resource, Tool};
use super::{resources, tools, Peer};
use crate::config::CapabilityConfig;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tether_types::jsonrpc::error_codes;
use tether_types::mcp::{
    CallToolResult, Implementation, InitializeResult, ServerCapabilities, SetLevelParams,
};
use tether_types::{
    negotiate_protocol_version, CallToolParams, InitializeParams, JsonRpcRequest,
    JsonRpcResponse, LogLevel, ReadResourceParams,
};
use tracing::{debug, error, info, warn};

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "tether";

/// Protocol server shared by every session.
pub struct McpServer {
    config: CapabilityConfig,
    http: reqwest::Client,
}

impl McpServer {
    pub fn new(config: CapabilityConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Handle an MCP JSON-RPC request.
    ///
    /// Notifications yield `None`; everything else yields exactly one
    /// response, errors included.
    pub async fn handle_request(
        &self,
        peer: &dyn Peer,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        debug!("MCP: Handling method {} on session {}", request.method, peer.session_id());

        if request.is_notification() {
            self.handle_notification(peer, &request);
            return None;
        }

        let id = request.id.clone();
        let params = request.params.unwrap_or_else(|| json!({}));

        let response = match request.method.as_str() {
            "initialize" => match parse_params::<InitializeParams>(params) {
                Ok(params) => JsonRpcResponse::success(id, Self::initialize_result(&params)),
                Err(e) => JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, e.to_string()),
            },
            "ping" => JsonRpcResponse::success(id, json!({})),
            "logging/setLevel" => match parse_params::<SetLevelParams>(params) {
                Ok(SetLevelParams { level }) => {
                    peer.set_log_level(level);
                    JsonRpcResponse::success(id, json!({}))
                }
                Err(e) => JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, e.to_string()),
            },
            "tools/list" => JsonRpcResponse::success(id, Self::list_tools()),
            "tools/call" => match self.call_tool(peer, params).await {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) if e.is_client_error() => {
                    JsonRpcResponse::error(id, e.code(), e.to_string())
                }
                Err(e) => JsonRpcResponse::error(id, e.code(), format!("Tool call failed: {}", e)),
            },
            "resources/list" => JsonRpcResponse::success(id, Self::list_resources()),
            "resources/templates/list" => {
                JsonRpcResponse::success(id, Self::list_resource_templates())
            }
            "resources/read" => match Self::read_resource(params) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) if e.is_client_error() => {
                    JsonRpcResponse::error(id, e.code(), e.to_string())
                }
                Err(e) => {
                    JsonRpcResponse::error(id, e.code(), format!("Resource read failed: {}", e))
                }
            },
            _ => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        };
        Some(response)
    }

    fn handle_notification(&self, peer: &dyn Peer, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => {
                info!("MCP: Client ready on session {}", peer.session_id());
            }
            "notifications/cancelled" => {
                // Requests complete within one POST, nothing to cancel
                debug!("MCP: Client cancelled a request: {:?}", request.params);
            }
            other => debug!("MCP: Ignoring notification {}", other),
        }
    }

    fn initialize_result(params: &InitializeParams) -> Value {
        let result = InitializeResult {
            protocol_version: negotiate_protocol_version(&params.protocol_version).to_string(),
            capabilities: ServerCapabilities {
                tools: Some(json!({})),
                resources: Some(json!({})),
                logging: Some(json!({})),
            },
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        serde_json::to_value(result).unwrap_or_else(|_| json!({}))
    }

    fn list_tools() -> Value {
        let tools: Vec<_> = Tool::ALL.iter().map(|tool| tool.descriptor()).collect();
        json!({ "tools": tools })
    }

    fn list_resources() -> Value {
        let resources: Vec<_> = Resource::ALL
            .iter()
            .filter_map(|resource| resource.descriptor())
            .collect();
        json!({ "resources": resources })
    }

    fn list_resource_templates() -> Value {
        let templates: Vec<_> = Resource::ALL
            .iter()
            .filter_map(|resource| resource.template_descriptor())
            .collect();
        json!({ "resourceTemplates": templates })
    }

    /// Handle a tools/call request.
    ///
    /// Unknown tools and malformed arguments are protocol errors. A tool that
    /// fails while running yields a result with `isError` set, and the
    /// session carries on.
    async fn call_tool(&self, peer: &dyn Peer, params: Value) -> Result<Value, CapabilityError> {
        let params: CallToolParams = parse_params(params)?;
        let tool = Tool::from_name(&params.name).ok_or_else(|| {
            error!("MCP: Unknown tool: {}", params.name);
            CapabilityError::UnknownTool(params.name.clone())
        })?;
        let args = params.arguments.unwrap_or_else(|| json!({}));

        info!("MCP: Calling tool {} on session {}", tool.name(), peer.session_id());
        log_to_peer(peer, LogLevel::Info, format!("Executing tool {}", tool.name()));

        let result = match self.run_tool(tool, args).await {
            Ok(result) => result,
            Err(e) if e.is_client_error() => return Err(e),
            Err(e) => {
                warn!("MCP: Tool {} failed on session {}: {}", tool.name(), peer.session_id(), e);
                CallToolResult::error(e.to_string())
            }
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn run_tool(&self, tool: Tool, args: Value) -> Result<CallToolResult, CapabilityError> {
        match tool {
            Tool::ListDatabases => {
                let args = tools::parse_args(args)?;
                tools::list_databases(self.config.database_url.as_deref(), args).await
            }
            Tool::FetchPokemon => {
                let args = tools::parse_args(args)?;
                tools::fetch_pokemon(&self.http, &self.config.pokeapi_base_url, args).await
            }
        }
    }

    /// Handle a resources/read request.
    fn read_resource(params: Value) -> Result<Value, CapabilityError> {
        let params: ReadResourceParams = parse_params(params)?;
        let resource = Resource::resolve(&params.uri)
            .ok_or_else(|| CapabilityError::ResourceNotFound(params.uri.clone()))?;
        debug!("MCP: Reading resource {}", params.uri);
        Ok(serde_json::to_value(resources::read(&params.uri, &resource))?)
    }
}

impl Default for McpServer {
    fn default() -> Self {
        Self::new(CapabilityConfig::default())
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, CapabilityError> {
    serde_json::from_value(params).map_err(|e| CapabilityError::InvalidArguments(e.to_string()))
}

/// Send a `notifications/message` to the peer if it wants this level.
fn log_to_peer(peer: &dyn Peer, level: LogLevel, message: String) {
    if level < peer.log_level() {
        return;
    }
    peer.notify(JsonRpcRequest::notification(
        "notifications/message",
        Some(json!({
            "level": level,
            "logger": SERVER_NAME,
            "data": message,
        })),
    ));
}
