//! 工具执行器
//!
//! invoke 对单次调用施加超时；超时与失败一律转为文本结果写回对话，
//! 绝不向会话循环抛错。每次调用输出结构化审计日志（JSON），
//! 记录前先对参数脱敏（疑似敏感或超长的字符串替换为长度标记）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::session::{ToolCallRequest, ToolRecord};
use crate::tools::ToolServer;

/// 日志中保留的参数字符串最大长度，超过即以 `<N chars>` 代替
const ARG_PREVIEW_MAX_CHARS: usize = 200;

/// 工具执行器：持有工具服务器与单次调用超时
pub struct ToolExecutor {
    server: Arc<dyn ToolServer>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(server: Arc<dyn ToolServer>, timeout_secs: u64) -> Self {
        Self {
            server,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行单个工具调用；返回的 ToolRecord 永远存在，失败体现在 failed 与 content 上
    pub async fn invoke(&self, call: &ToolCallRequest, args: Value) -> ToolRecord {
        let start = Instant::now();
        let result = timeout(self.timeout, self.server.call_tool(&call.name, args.clone())).await;

        let (content, failed, outcome) = match result {
            Ok(Ok(content)) => (content, false, "ok"),
            Ok(Err(e)) => (
                format!("Error executing tool {}: {}", call.name, e),
                true,
                "error",
            ),
            Err(_) => (
                AgentError::ToolTimeout(format!(
                    "{} after {}s",
                    call.name,
                    self.timeout.as_secs()
                ))
                .to_string(),
                true,
                "timeout",
            ),
        };

        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "tool_call_id": call.id,
            "ok": !failed,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args": redact_args(&args),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        ToolRecord {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            arguments: args,
            content,
            failed,
        }
    }
}

/// 参数脱敏：`*_text` 键（通常为整篇文档）与超长字符串替换为 `<N chars>`
pub fn redact_args(args: &Value) -> Value {
    match args {
        Value::Object(map) => {
            let redacted = map
                .iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) if k.ends_with("_text") || s.chars().count() > ARG_PREVIEW_MAX_CHARS => {
                            Value::String(format!("<{} chars>", s.chars().count()))
                        }
                        other => other.clone(),
                    };
                    (k.clone(), v)
                })
                .collect();
            Value::Object(redacted)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct SlowServer;

    #[async_trait]
    impl ToolServer for SlowServer {
        async fn list_tools(&self) -> Result<Vec<crate::tools::ToolDescriptor>, String> {
            Ok(Vec::new())
        }

        async fn call_tool(&self, name: &str, _args: Value) -> Result<String, String> {
            match name {
                "sleepy" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("late".to_string())
                }
                "broken" => Err("boom".to_string()),
                _ => Ok("fine".to_string()),
            }
        }
    }

    fn call(name: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_invoke_timeout_becomes_text() {
        let exec = ToolExecutor::new(Arc::new(SlowServer), 1);
        let record = exec.invoke(&call("sleepy"), serde_json::json!({})).await;
        assert!(record.failed);
        assert!(record.content.contains("timeout"));
        assert!(record.content.contains("sleepy"));
        assert_eq!(record.tool_call_id, "call_sleepy");
    }

    #[tokio::test]
    async fn test_invoke_error_becomes_text() {
        let exec = ToolExecutor::new(Arc::new(SlowServer), 1);
        let record = exec.invoke(&call("broken"), serde_json::json!({})).await;
        assert!(record.failed);
        assert!(record.content.contains("Error executing tool broken"));
        assert!(record.content.contains("boom"));
    }

    #[test]
    fn test_redact_args_text_key_and_long_value() {
        let args = serde_json::json!({
            "kak_tor_text": "isi dokumen yang sangat panjang",
            "note": "x".repeat(300),
            "name": "alpha",
        });
        let redacted = redact_args(&args);
        assert_eq!(redacted["kak_tor_text"], "<31 chars>");
        assert_eq!(redacted["note"], "<300 chars>");
        assert_eq!(redacted["name"], "alpha");
    }
}
