//! 通用多轮会话循环
//!
//! 每轮：LLM 调用（带工具清单与 tool_choice）-> 追加 Assistant 消息 ->
//! 无工具调用则以其文本终止；否则并发分发全部工具调用（Semaphore 限流，
//! join 齐全后才进入下一轮），按 id 写回 Tool 消息。轮数上限耗尽返回
//! TurnLimit 结果而非错误。两个流水线（analysis / docgen）以本循环的
//! run_turn 为原语叠加各自的状态机。

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, ToolScheduler};
use crate::llm::{AssistantTurn, ChatClient, ToolChoice};
use crate::session::{Message, ToolCallRequest, ToolRecord};
use crate::tools::{ToolCatalog, ToolExecutor};

/// 无文本回复时的兜底答案
pub const NO_ANSWER: &str = "没有得到回答。";

/// 按工具名注入的默认参数（仅补缺失键，不覆盖模型给出的值）
pub type ArgDefaults = HashMap<String, Map<String, Value>>;

/// 会话上下文：一次查询的全部协作组件；消息历史由调用方独占持有
pub struct Session {
    pub llm: Arc<dyn ChatClient>,
    pub catalog: ToolCatalog,
    pub executor: ToolExecutor,
    pub scheduler: ToolScheduler,
    pub cancel_token: CancellationToken,
}

/// 一轮的产物：Assistant 回合与（可能为空的）工具结果
pub struct TurnOutcome {
    pub assistant: AssistantTurn,
    pub records: Vec<ToolRecord>,
}

/// 循环结果：最终回答，或轮数耗尽
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Final(String),
    TurnLimit(String),
}

impl SessionOutcome {
    pub fn into_text(self) -> String {
        match self {
            SessionOutcome::Final(s) | SessionOutcome::TurnLimit(s) => s,
        }
    }
}

/// 执行一轮：LLM 调用 + 工具并发分发 + 结果写回
///
/// 工具清单拉取失败不致命（降级为空清单继续对话）；
/// Tool 消息保证在下一次 LLM 调用前全部就位，相互顺序不作保证。
pub async fn run_turn(
    session: &Session,
    messages: &mut Vec<Message>,
    tool_choice: &ToolChoice,
    arg_defaults: &ArgDefaults,
) -> Result<TurnOutcome, AgentError> {
    if session.cancel_token.is_cancelled() {
        return Err(AgentError::Cancelled);
    }

    let tools = match session.catalog.tools().await {
        Ok(tools) => tools,
        Err(e) => {
            tracing::warn!(error = %e, "tool catalog unavailable, continuing without tools");
            Arc::new(Vec::new())
        }
    };

    let assistant = session
        .llm
        .chat(messages, &tools, tool_choice)
        .await
        .map_err(AgentError::LlmError)?;
    messages.push(assistant.to_message());

    if assistant.tool_calls.is_empty() {
        return Ok(TurnOutcome {
            assistant,
            records: Vec::new(),
        });
    }

    let records = dispatch_tool_calls(session, &assistant.tool_calls, arg_defaults).await;
    for record in &records {
        messages.push(Message::from(record));
    }

    Ok(TurnOutcome { assistant, records })
}

/// 并发分发一轮内的全部工具调用
///
/// 每个调用先取得调度器许可再执行，各自独立超时；join 所有结果后返回，
/// 单个失败不影响兄弟调用。
pub async fn dispatch_tool_calls(
    session: &Session,
    calls: &[ToolCallRequest],
    arg_defaults: &ArgDefaults,
) -> Vec<ToolRecord> {
    let futures = calls.iter().map(|call| {
        let scheduler = session.scheduler.clone();
        async move {
            let _permit = scheduler.acquire().await;
            let args = resolve_args(call, arg_defaults);
            session.executor.invoke(call, args).await
        }
    });
    futures_util::future::join_all(futures).await
}

/// 解析调用参数并合并默认值；无法解析的参数退回空对象
fn resolve_args(call: &ToolCallRequest, arg_defaults: &ArgDefaults) -> Value {
    let mut args: Map<String, Value> = serde_json::from_str(&call.arguments).unwrap_or_default();
    if let Some(defaults) = arg_defaults.get(&call.name) {
        for (key, value) in defaults {
            args.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    Value::Object(args)
}

/// 通用会话循环：tool_choice 固定策略，轮数上限由调用方给定
pub struct SessionLoop<'a> {
    session: &'a Session,
    max_turns: usize,
}

impl<'a> SessionLoop<'a> {
    pub fn new(session: &'a Session, max_turns: usize) -> Self {
        Self { session, max_turns }
    }

    pub async fn run(
        &self,
        mut messages: Vec<Message>,
        tool_choice: ToolChoice,
    ) -> Result<SessionOutcome, AgentError> {
        let defaults = ArgDefaults::new();
        let mut last_output = String::new();

        for turn in 0..self.max_turns {
            tracing::debug!(turn = turn + 1, max_turns = self.max_turns, "session turn");
            let outcome = run_turn(self.session, &mut messages, &tool_choice, &defaults).await?;

            if outcome.assistant.tool_calls.is_empty() {
                let text = outcome.assistant.content.trim().to_string();
                return Ok(SessionOutcome::Final(if text.is_empty() {
                    NO_ANSWER.to_string()
                } else {
                    text
                }));
            }
            last_output = outcome.assistant.content.clone();
        }

        Ok(SessionOutcome::TurnLimit(format!(
            "达到最大轮数限制 ({})，最后输出：\n{}",
            self.max_turns, last_output
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::llm::MockChatClient;
    use crate::tools::{ToolDescriptor, ToolServer};

    struct EchoServer;

    #[async_trait]
    impl ToolServer for EchoServer {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, String> {
            Ok(vec![ToolDescriptor {
                name: "echo".to_string(),
                description: "echo back".to_string(),
                parameters: json!({}),
            }])
        }

        async fn call_tool(&self, _name: &str, args: serde_json::Value) -> Result<String, String> {
            Ok(format!("echo:{}", args["text"].as_str().unwrap_or("")))
        }
    }

    fn make_session(llm: Arc<MockChatClient>) -> Session {
        let server: Arc<dyn ToolServer> = Arc::new(EchoServer);
        Session {
            llm,
            catalog: ToolCatalog::new(server.clone()),
            executor: ToolExecutor::new(server, 5),
            scheduler: ToolScheduler::default(),
            cancel_token: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_final_answer_without_tool_calls() {
        let llm = Arc::new(MockChatClient::new());
        llm.push_text("jawaban langsung");
        let session = make_session(llm);

        let outcome = SessionLoop::new(&session, 3)
            .run(vec![Message::user("halo")], ToolChoice::Auto)
            .await
            .unwrap();
        assert_eq!(outcome, SessionOutcome::Final("jawaban langsung".to_string()));
    }

    #[tokio::test]
    async fn test_tool_round_trip_correlated_by_id() {
        let llm = Arc::new(MockChatClient::new());
        llm.push_tool_call("call_7", "echo", r#"{"text":"hi"}"#);
        llm.push_text("done");
        let session = make_session(llm);

        let mut messages = vec![Message::user("panggil echo")];
        let outcome = run_turn(&session, &mut messages, &ToolChoice::Auto, &ArgDefaults::new())
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].tool_call_id, "call_7");
        assert_eq!(outcome.records[0].content, "echo:hi");
        // 工具结果消息已在下一次 LLM 调用前写回历史
        let tool_msg = messages.last().unwrap();
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_7"));
    }

    #[tokio::test]
    async fn test_turn_limit_is_outcome_not_error() {
        let llm = Arc::new(MockChatClient::new());
        llm.push_tool_call("c1", "echo", r#"{"text":"a"}"#);
        llm.push_tool_call("c2", "echo", r#"{"text":"b"}"#);
        let session = make_session(llm);

        let outcome = SessionLoop::new(&session, 2)
            .run(vec![Message::user("loop")], ToolChoice::Auto)
            .await
            .unwrap();
        assert!(matches!(outcome, SessionOutcome::TurnLimit(_)));
    }

    #[tokio::test]
    async fn test_replay_is_deterministic() {
        for _ in 0..2 {
            let llm = Arc::new(MockChatClient::new());
            llm.push_tool_call("c1", "echo", r#"{"text":"x"}"#);
            llm.push_text("final-x");
            let session = make_session(llm);

            let outcome = SessionLoop::new(&session, 5)
                .run(vec![Message::user("sama")], ToolChoice::Auto)
                .await
                .unwrap();
            assert_eq!(outcome, SessionOutcome::Final("final-x".to_string()));
        }
    }

    #[test]
    fn test_resolve_args_merges_defaults_without_overwrite() {
        let call = ToolCallRequest {
            id: "c".to_string(),
            name: "read".to_string(),
            arguments: r#"{"project_name":"explicit"}"#.to_string(),
        };
        let mut defaults = ArgDefaults::new();
        let mut map = Map::new();
        map.insert("project_name".to_string(), json!("default"));
        map.insert("extra".to_string(), json!(1));
        defaults.insert("read".to_string(), map);

        let args = resolve_args(&call, &defaults);
        assert_eq!(args["project_name"], "explicit");
        assert_eq!(args["extra"], 1);
    }
}
