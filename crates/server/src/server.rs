#![forbid(unsafe_code)]

use crate::PmServer;
use pm_storage::{HsmClient, SqliteStore};
use serde_json::{Value, json};

impl PmServer {
    pub(crate) fn new(store: SqliteStore, hsm: Box<dyn HsmClient>) -> Self {
        Self {
            initialized: false,
            store,
            hsm,
        }
    }

    pub(crate) fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut SqliteStore {
        &mut self.store
    }

    /// Store and signer together, for the one operation that needs both.
    pub(crate) fn store_and_hsm(&mut self) -> (&mut SqliteStore, &dyn HsmClient) {
        (&mut self.store, self.hsm.as_ref())
    }

    pub(crate) fn handle(&mut self, request: crate::JsonRpcRequest) -> Option<Value> {
        let method = request.method.as_str();

        if method == "initialize" {
            return Some(crate::json_rpc_response(
                request.id,
                json!({
                    "protocolVersion": crate::MCP_VERSION,
                    "serverInfo": { "name": crate::SERVER_NAME, "version": crate::SERVER_VERSION },
                    "capabilities": { "tools": {} }
                }),
            ));
        }

        if !self.initialized && method != "notifications/initialized" {
            return Some(crate::json_rpc_error(
                request.id,
                -32002,
                "Server not initialized",
            ));
        }

        if method == "notifications/initialized" {
            self.initialized = true;
            return None;
        }

        if method == "ping" {
            return Some(crate::json_rpc_response(request.id, json!({})));
        }

        if method == "tools/list" {
            return Some(crate::json_rpc_response(
                request.id,
                json!({ "tools": crate::tools::tool_definitions() }),
            ));
        }

        if method == "tools/call" {
            let Some(params_obj) = request.params.as_ref().and_then(|v| v.as_object()) else {
                return Some(crate::json_rpc_error(
                    request.id,
                    -32602,
                    "params must be an object",
                ));
            };

            let tool_name = params_obj
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let args = params_obj
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| json!({}));
            let response_body = self.call_tool(&tool_name, args);
            let succeeded = response_body
                .get("success")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

            return Some(crate::json_rpc_response(
                request.id,
                json!({
                    "content": [crate::tool_text_content(&response_body)],
                    "isError": !succeeded
                }),
            ));
        }

        Some(crate::json_rpc_error(
            request.id,
            -32601,
            &format!("Method not found: {method}"),
        ))
    }

    pub(crate) fn call_tool(&mut self, name: &str, args: Value) -> Value {
        let op = args
            .get("op")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let Some(resp) = crate::tools::dispatch_tool(self, name, args) else {
            return crate::ai_error("UNKNOWN_TOOL", &format!("Unknown tool: {name}"));
        };
        if let Some(code) = resp
            .get("error")
            .and_then(|err| err.get("code"))
            .and_then(|v| v.as_str())
        {
            tracing::info!(tool = name, %op, code, "tool call refused");
        } else {
            tracing::debug!(tool = name, %op, "tool call ok");
        }
        resp
    }
}
