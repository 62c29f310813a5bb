//! KAK/TOR 招标分析流水线
//!
//! INITIAL -> PAYLOAD_SENT -> SUMMARY_OBTAINED -> SAVED。
//! INITIAL 首次强制调用 payload 构建工具，payload 校验失败保留一次重试，
//! 连续两次失败即中止；payload 成功后对话重置为 instruction(system) +
//! context(user)，随后禁用工具直到模型给出自由文本摘要；摘要非空再重置为
//! system + 原始往来 + 摘要，等待保存工具。轮数耗尽返回已知的最佳摘要。

use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::AgentError;
use crate::llm::ToolChoice;
use crate::session::{run_turn, ArgDefaults, Message, Session, ToolRecord};

/// 构建摘要 payload 的工具名（工具服务器侧约定）
pub const BUILD_PAYLOAD_TOOL: &str = "build_summary_tender_payload";
/// 保存摘要的工具名
pub const SAVE_SUMMARY_TOOL: &str = "save_summary_markdown";

/// 摘要为空时的终态答案
pub const EMPTY_SUMMARY: &str = "摘要为空。";
const TURN_LIMIT_FALLBACK: &str = "流程已达最大轮数，未得到最终摘要。";

/// 连续校验失败达到此次数即中止
const MAX_PAYLOAD_FAILURES: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AnalysisState {
    Initial,
    PayloadSent,
    SummaryObtained,
    Saved,
}

/// payload 工具的合法输出
#[derive(Debug, Deserialize)]
struct SummaryPayload {
    instruction: String,
    context: String,
}

/// 一次分析请求的输入
pub struct AnalysisRequest<'a> {
    pub user_query: &'a str,
    /// payload 工具缺省使用的 prompt 名
    pub prompt_instruction_name: &'a str,
    /// payload 工具缺省读取的 KAK/TOR 文档名（无扩展名）
    pub kak_doc_name: &'a str,
}

/// 分析流水线
pub struct AnalysisPipeline<'a> {
    session: &'a Session,
    system_prompt: String,
    max_turns: usize,
}

impl<'a> AnalysisPipeline<'a> {
    pub fn new(session: &'a Session, system_prompt: impl Into<String>, max_turns: usize) -> Self {
        Self {
            session,
            system_prompt: system_prompt.into(),
            max_turns,
        }
    }

    pub async fn run(&self, request: AnalysisRequest<'_>) -> Result<String, AgentError> {
        let system = Message::system(self.system_prompt.clone());
        let mut messages = vec![system.clone(), Message::user(request.user_query)];

        let mut state = AnalysisState::Initial;
        let mut summary: Option<String> = None;
        let mut payload_failures: u32 = 0;
        // payload 成功时捕获的原始往来，用于摘要后的第二次重置
        let mut original_exchange: Vec<Message> = Vec::new();

        let mut defaults = ArgDefaults::new();
        defaults.insert(
            BUILD_PAYLOAD_TOOL.to_string(),
            to_map(json!({
                "prompt_instruction_name": request.prompt_instruction_name,
                "kak_tor_md_name": request.kak_doc_name,
            })),
        );

        for turn in 0..self.max_turns {
            tracing::info!(turn = turn + 1, max_turns = self.max_turns, state = ?state, "analysis turn");

            let tool_choice = match state {
                AnalysisState::Initial if payload_failures == 0 => {
                    ToolChoice::Forced(BUILD_PAYLOAD_TOOL.to_string())
                }
                AnalysisState::PayloadSent => ToolChoice::None,
                _ => ToolChoice::Auto,
            };

            let outcome = run_turn(self.session, &mut messages, &tool_choice, &defaults).await?;

            if outcome.assistant.tool_calls.is_empty() {
                let text = outcome.assistant.content.trim().to_string();
                match state {
                    AnalysisState::PayloadSent => {
                        if text.is_empty() {
                            return Ok(EMPTY_SUMMARY.to_string());
                        }
                        summary = Some(text.clone());
                        // 第二次重置：system + 原始往来 + 摘要
                        messages = vec![system.clone()];
                        messages.extend(original_exchange.iter().cloned());
                        messages.push(Message::assistant(text));
                        state = AnalysisState::SummaryObtained;
                        continue;
                    }
                    // 模型未走工具流程，直接把文本当回答
                    _ => {
                        return Ok(if text.is_empty() {
                            crate::session::NO_ANSWER.to_string()
                        } else {
                            text
                        });
                    }
                }
            }

            let mut reset_after_payload = false;
            for record in &outcome.records {
                match record.name.as_str() {
                    BUILD_PAYLOAD_TOOL => match parse_payload(record) {
                        Ok(payload) => {
                            original_exchange = vec![
                                Message::user(request.user_query),
                                outcome.assistant.to_message(),
                                Message::from(record),
                            ];
                            // 第一次重置：instruction 升为 system，context 为新 user 消息
                            messages = vec![
                                Message::system(payload.instruction),
                                Message::user(payload.context),
                            ];
                            state = AnalysisState::PayloadSent;
                            reset_after_payload = true;
                        }
                        Err(e) => {
                            payload_failures += 1;
                            tracing::warn!(failures = payload_failures, error = %e, "summary payload invalid");
                            if payload_failures >= MAX_PAYLOAD_FAILURES {
                                return Err(AgentError::PipelineAborted(format!(
                                    "摘要 payload 连续 {MAX_PAYLOAD_FAILURES} 次校验失败：{e}"
                                )));
                            }
                            // 留在 INITIAL，下一轮由模型重试
                        }
                    },
                    SAVE_SUMMARY_TOOL => {
                        if !record.failed {
                            if summary.is_none() {
                                summary = record
                                    .arguments
                                    .get("summary")
                                    .and_then(Value::as_str)
                                    .map(ToString::to_string);
                            }
                            state = AnalysisState::Saved;
                        }
                    }
                    _ => {}
                }
            }

            if state == AnalysisState::Saved {
                return Ok(summary.unwrap_or_else(|| outcome.assistant.content.clone()));
            }
            if reset_after_payload {
                continue;
            }
        }

        tracing::warn!("analysis reached turn limit without final answer");
        Ok(summary.unwrap_or_else(|| TURN_LIMIT_FALLBACK.to_string()))
    }
}

/// 校验 payload 工具输出：必须是含 instruction 与 context 两个字符串字段的 JSON
fn parse_payload(record: &ToolRecord) -> Result<SummaryPayload, AgentError> {
    if record.failed {
        return Err(AgentError::ToolExecutionFailed(record.content.clone()));
    }
    let payload: SummaryPayload = serde_json::from_str(&record.content).map_err(|_| {
        let preview: String = record.content.chars().take(200).collect();
        AgentError::JsonParseError(format!(
            "harus JSON {{instruction, context}}, dapat: {preview}"
        ))
    })?;
    if payload.instruction.is_empty() || payload.context.is_empty() {
        return Err(AgentError::InvalidPayload(
            "instruction/context kosong".to_string(),
        ));
    }
    Ok(payload)
}

fn to_map(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, content: &str, failed: bool) -> ToolRecord {
        ToolRecord {
            tool_call_id: "c1".to_string(),
            name: name.to_string(),
            arguments: json!({}),
            content: content.to_string(),
            failed,
        }
    }

    #[test]
    fn test_parse_payload_ok() {
        let r = record(
            BUILD_PAYLOAD_TOOL,
            r#"{"instruction":"I1","context":"C1"}"#,
            false,
        );
        let payload = parse_payload(&r).unwrap();
        assert_eq!(payload.instruction, "I1");
        assert_eq!(payload.context, "C1");
    }

    #[test]
    fn test_parse_payload_rejects_missing_fields() {
        let r = record(BUILD_PAYLOAD_TOOL, r#"{"instruction":"I1"}"#, false);
        assert!(matches!(parse_payload(&r), Err(AgentError::JsonParseError(_))));
        let r = record(BUILD_PAYLOAD_TOOL, r#"{"instruction":"","context":""}"#, false);
        assert!(matches!(parse_payload(&r), Err(AgentError::InvalidPayload(_))));
    }

    #[test]
    fn test_parse_payload_rejects_failed_record() {
        let r = record(BUILD_PAYLOAD_TOOL, "Error executing tool: boom", true);
        assert!(matches!(
            parse_payload(&r),
            Err(AgentError::ToolExecutionFailed(_))
        ));
    }
}
