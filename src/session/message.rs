//! 会话消息模型
//!
//! 与 LLM Chat API 对齐的四种角色；Assistant 消息可携带零或多个工具调用请求，
//! Tool 消息通过 tool_call_id 与请求精确对应。消息序列在单轮内只追加，
//! 流水线状态边界处可整体重置（见 pipeline 模块）。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// LLM 发出的工具调用请求；arguments 为原始 JSON 文本，延迟到分发时解析
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// 单条工具调用结果：按 tool_call_id 与请求一一对应，每个请求恰好一条
#[derive(Clone, Debug)]
pub struct ToolRecord {
    pub tool_call_id: String,
    pub name: String,
    /// 分发时实际使用的参数（已合并默认值）
    pub arguments: serde_json::Value,
    pub content: String,
    pub failed: bool,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// 携带工具调用请求的 Assistant 消息（对应 LLM 返回的 tool_calls）
    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// 工具结果消息；tool_call_id 必须取自此前 Assistant 消息中的请求 id
    pub fn tool(tool_call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            name: None,
            tool_calls: Vec::new(),
        }
    }
}

impl From<&ToolRecord> for Message {
    fn from(record: &ToolRecord) -> Self {
        Message::tool(record.tool_call_id.clone(), record.name.clone(), record.content.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_message_correlation() {
        let record = ToolRecord {
            tool_call_id: "call_1".to_string(),
            name: "echo".to_string(),
            arguments: serde_json::json!({}),
            content: "ok".to_string(),
            failed: false,
        };
        let msg = Message::from(&record);
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.name.as_deref(), Some("echo"));
    }

    #[test]
    fn test_assistant_with_calls() {
        let msg = Message::assistant_with_calls(
            "",
            vec![ToolCallRequest {
                id: "c1".to_string(),
                name: "read".to_string(),
                arguments: "{}".to_string(),
            }],
        );
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.tool_calls.len(), 1);
    }
}
