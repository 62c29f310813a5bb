//! 远程工具服务器（JSON-RPC 2.0 over HTTP）
//!
//! tools/list 与 tools/call 两个方法，POST 到固定端点；
//! 工具结果取 result.content[0].text。连接握手与会话协商不在本层。

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::tools::{ToolDescriptor, ToolServer};

/// JSON-RPC 工具服务器客户端
pub struct RemoteToolServer {
    client: Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl RemoteToolServer {
    pub fn new(endpoint: impl Into<String>, request_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, String> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let response: Value = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("{method}: {e}"))?
            .json()
            .await
            .map_err(|e| format!("{method}: invalid response: {e}"))?;

        if let Some(err) = response.get("error") {
            return Err(format!("{method}: {err}"));
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| format!("{method}: missing result"))
    }
}

#[async_trait]
impl ToolServer for RemoteToolServer {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, String> {
        let result = self.rpc("tools/list", json!({})).await?;
        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .ok_or_else(|| "tools/list: missing tools array".to_string())?;

        Ok(tools
            .iter()
            .map(|t| ToolDescriptor {
                name: t.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                description: t
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                parameters: t
                    .get("inputSchema")
                    .cloned()
                    .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<String, String> {
        let result = self
            .rpc("tools/call", json!({ "name": name, "arguments": args }))
            .await?;

        // 文本内容在 content[0].text；非文本结果退回整个 result 的 JSON 文本
        if let Some(text) = result
            .get("content")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(|c| c.get("text"))
            .and_then(Value::as_str)
        {
            return Ok(text.to_string());
        }
        Ok(result.to_string())
    }
}
