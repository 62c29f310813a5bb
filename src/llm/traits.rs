//! LLM 客户端抽象
//!
//! ChatClient：chat（带工具清单与 tool_choice 策略的对话补全）与
//! complete_structured（schema 约束输出，意图路由使用）。
//! 所有后端（OpenAI 兼容 / Mock）实现此 trait。

use async_trait::async_trait;
use serde_json::Value;

use crate::session::{Message, ToolCallRequest};
use crate::tools::ToolDescriptor;

/// 工具选择策略：模型自选 / 禁止调用 / 强制调用指定工具
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
    Forced(String),
}

/// 一次 chat 调用返回的 Assistant 回合：文本与零或多个工具调用请求
#[derive(Clone, Debug, Default)]
pub struct AssistantTurn {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantTurn {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn to_message(&self) -> Message {
        Message::assistant_with_calls(self.content.clone(), self.tool_calls.clone())
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// 对话补全；tools 为空时后端应省略工具字段
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        tool_choice: &ToolChoice,
    ) -> Result<AssistantTurn, String>;

    /// schema 约束的结构化输出，返回原始 JSON 文本
    async fn complete_structured(
        &self,
        messages: &[Message],
        schema_name: &str,
        schema: Value,
    ) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
