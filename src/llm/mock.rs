//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本依序返回预设回合：chat 与 complete_structured 各自一个队列，
//! 队列耗尽后 chat 返回固定文本、structured 返回 Err，便于测试兜底路径。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{AssistantTurn, ChatClient, ToolChoice};
use crate::session::{Message, ToolCallRequest};
use crate::tools::ToolDescriptor;

/// 脚本化 Mock 客户端
#[derive(Default)]
pub struct MockChatClient {
    chat_script: Mutex<VecDeque<Result<AssistantTurn, String>>>,
    structured_script: Mutex<VecDeque<Result<String, String>>>,
    recorded: Mutex<Vec<Vec<Message>>>,
    /// chat 被调用的次数
    pub chat_calls: AtomicUsize,
    /// structured 被调用的次数
    pub structured_calls: AtomicUsize,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条 chat 脚本回合
    pub fn push_turn(&self, turn: AssistantTurn) {
        self.chat_script.lock().unwrap().push_back(Ok(turn));
    }

    /// 追加一条 chat 失败
    pub fn push_chat_error(&self, err: impl Into<String>) {
        self.chat_script.lock().unwrap().push_back(Err(err.into()));
    }

    /// 追加一条纯文本回合
    pub fn push_text(&self, text: impl Into<String>) {
        self.push_turn(AssistantTurn::text(text));
    }

    /// 追加一条携带工具调用的回合
    pub fn push_tool_call(&self, id: &str, name: &str, arguments: &str) {
        self.push_turn(AssistantTurn {
            content: String::new(),
            tool_calls: vec![ToolCallRequest {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
        });
    }

    /// 追加一条结构化输出脚本
    pub fn push_structured(&self, raw: impl Into<String>) {
        self.structured_script.lock().unwrap().push_back(Ok(raw.into()));
    }

    /// 追加一条结构化输出失败
    pub fn push_structured_error(&self, err: impl Into<String>) {
        self.structured_script.lock().unwrap().push_back(Err(err.into()));
    }

    /// 每次 chat 调用收到的完整消息序列（断言对话构造用）
    pub fn recorded(&self) -> Vec<Vec<Message>> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn chat(
        &self,
        messages: &[Message],
        _tools: &[ToolDescriptor],
        _tool_choice: &ToolChoice,
    ) -> Result<AssistantTurn, String> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().unwrap().push(messages.to_vec());
        self.chat_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AssistantTurn::text("(mock script exhausted)")))
    }

    async fn complete_structured(
        &self,
        _messages: &[Message],
        _schema_name: &str,
        _schema: Value,
    ) -> Result<String, String> {
        self.structured_calls.fetch_add(1, Ordering::SeqCst);
        self.structured_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("mock: structured script exhausted".to_string()))
    }
}
