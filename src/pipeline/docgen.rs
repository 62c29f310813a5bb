//! 提案生成流水线
//!
//! INITIAL -> RAW_READY -> PLACEHOLDERS_OBTAINED -> CONTEXT_SENT -> DOC_SAVED。
//! 读源文档 / 渲染文档两个强制工具各保留一次重试，二次失败按工具报告的
//! 错误中止；占位符补全不完整时发送一次列出缺失项的纠正消息，第二次仍不
//! 完整是否中止由配置策略决定。上下文完整后对话重置为 system + JSON 上下文。
//! 轮数耗尽返回最后已知的输出路径或未完成哨兵。

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::AgentError;
use crate::llm::{extract_json_object, ToolChoice};
use crate::session::{run_turn, ArgDefaults, Message, Session};

/// 读取项目源文档的工具名
pub const READ_PROJECT_TOOL: &str = "read_project_markdown";
/// 获取模板占位符清单的工具名
pub const PLACEHOLDERS_TOOL: &str = "get_template_placeholders";
/// 渲染提案文档的工具名
pub const RENDER_DOC_TOOL: &str = "generate_proposal_docx";

/// 轮数耗尽且无输出路径时的哨兵答案
pub const WORKFLOW_INCOMPLETE: &str = "流程未完成：已达最大轮数限制。";
const DOC_SAVED_FALLBACK: &str = "提案已生成。";

/// 占位符纠正消息的重试键
const CONTEXT_RETRY_KEY: &str = "context";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DocgenState {
    Initial,
    RawReady,
    PlaceholdersObtained,
    ContextSent,
    DocSaved,
}

/// 工具结果信封：{status, text|path|error}
#[derive(Debug, Default, Deserialize)]
struct ToolEnvelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    error: String,
}

impl ToolEnvelope {
    fn parse(content: &str) -> Self {
        serde_json::from_str(content).unwrap_or_default()
    }

    fn succeeded(&self) -> bool {
        self.status == "success"
    }

    fn error_or(&self, fallback: &str) -> String {
        if self.error.is_empty() {
            fallback.to_string()
        } else {
            self.error.clone()
        }
    }
}

/// 一次生成请求的输入
pub struct DocgenRequest<'a> {
    pub project_name: &'a str,
    pub user_query: Option<&'a str>,
    pub override_template: Option<&'a str>,
}

/// 生成流水线
pub struct DocgenPipeline<'a> {
    session: &'a Session,
    system_prompt: String,
    max_turns: usize,
    /// 占位符二次补全仍不完整时是否中止（false 则带缺口继续渲染）
    abort_on_incomplete_context: bool,
}

impl<'a> DocgenPipeline<'a> {
    pub fn new(session: &'a Session, system_prompt: impl Into<String>, max_turns: usize) -> Self {
        Self {
            session,
            system_prompt: system_prompt.into(),
            max_turns,
            abort_on_incomplete_context: true,
        }
    }

    pub fn with_abort_on_incomplete_context(mut self, abort: bool) -> Self {
        self.abort_on_incomplete_context = abort;
        self
    }

    pub async fn run(&self, request: DocgenRequest<'_>) -> Result<String, AgentError> {
        // 文档名不带扩展
        let project_name = request
            .project_name
            .trim_end_matches(".md")
            .trim_end_matches(".txt");

        let system = Message::system(self.system_prompt.clone());
        let user_msg = request
            .user_query
            .map(ToString::to_string)
            .unwrap_or_else(|| {
                format!("Buatkan proposal untuk proyek '{project_name}'. Ikuti prosedur.")
            });
        let mut messages = vec![system.clone(), Message::user(user_msg)];

        let mut state = DocgenState::Initial;
        let mut placeholders: Vec<String> = Vec::new();
        let mut doc_path: Option<String> = None;
        let mut retry_tracker: HashMap<String, u32> = HashMap::new();

        let mut defaults = ArgDefaults::new();
        defaults.insert(
            READ_PROJECT_TOOL.to_string(),
            to_map(json!({ "project_name": project_name })),
        );
        if let Some(template) = request.override_template {
            defaults.insert(
                RENDER_DOC_TOOL.to_string(),
                to_map(json!({ "override_template": template })),
            );
        }

        for turn in 0..self.max_turns {
            tracing::info!(turn = turn + 1, max_turns = self.max_turns, state = ?state, "docgen turn");

            let retries = |key: &str| retry_tracker.get(key).copied().unwrap_or(0);
            let tool_choice = match state {
                DocgenState::Initial if retries(READ_PROJECT_TOOL) == 0 => {
                    ToolChoice::Forced(READ_PROJECT_TOOL.to_string())
                }
                DocgenState::RawReady if retries(PLACEHOLDERS_TOOL) == 0 => {
                    ToolChoice::Forced(PLACEHOLDERS_TOOL.to_string())
                }
                DocgenState::ContextSent if retries(RENDER_DOC_TOOL) == 0 => {
                    ToolChoice::Forced(RENDER_DOC_TOOL.to_string())
                }
                _ => ToolChoice::Auto,
            };

            let outcome = run_turn(self.session, &mut messages, &tool_choice, &defaults).await?;

            if outcome.assistant.tool_calls.is_empty() {
                match state {
                    DocgenState::PlaceholdersObtained => {
                        let ctx_raw = outcome.assistant.content.clone();
                        let missing = missing_placeholders(&placeholders, &ctx_raw);
                        if !missing.is_empty() {
                            let attempts = retry_tracker.entry(CONTEXT_RETRY_KEY.to_string()).or_insert(0);
                            if *attempts == 0 {
                                *attempts = 1;
                                messages.push(Message::user(format!(
                                    "Beberapa placeholder masih kosong: {missing:?}. \
                                     Mohon lengkapi dalam format JSON konteksnya."
                                )));
                                continue;
                            }
                            if self.abort_on_incomplete_context {
                                return Err(AgentError::PipelineAborted(format!(
                                    "占位符两次补全后仍不完整，缺失 {missing:?}"
                                )));
                            }
                            tracing::warn!(?missing, "placeholders still incomplete, rendering with gaps");
                        }
                        // 上下文就绪，重置对话准备渲染
                        messages = vec![system.clone(), Message::user(ctx_raw)];
                        state = DocgenState::ContextSent;
                        continue;
                    }
                    DocgenState::DocSaved => {
                        let text = outcome.assistant.content.trim().to_string();
                        return Ok(if text.is_empty() {
                            doc_path.unwrap_or_else(|| DOC_SAVED_FALLBACK.to_string())
                        } else {
                            text
                        });
                    }
                    // 普通过渡消息，继续下一轮
                    _ => continue,
                }
            }

            for record in &outcome.records {
                match record.name.as_str() {
                    READ_PROJECT_TOOL => {
                        let envelope = ToolEnvelope::parse(&record.content);
                        if !envelope.succeeded() {
                            let attempts = retry_tracker.entry(READ_PROJECT_TOOL.to_string()).or_insert(0);
                            *attempts += 1;
                            if *attempts > 1 {
                                return Err(AgentError::PipelineAborted(
                                    envelope.error_or("项目文档未找到。"),
                                ));
                            }
                            state = DocgenState::Initial;
                            break;
                        }
                        messages.push(Message::user(envelope.text));
                        state = DocgenState::RawReady;
                    }
                    PLACEHOLDERS_TOOL => {
                        placeholders = parse_placeholder_list(&record.content);
                        messages.push(Message::user(format!("Daftar placeholder: {placeholders:?}")));
                        state = DocgenState::PlaceholdersObtained;
                    }
                    RENDER_DOC_TOOL => {
                        let envelope = ToolEnvelope::parse(&record.content);
                        if !envelope.succeeded() {
                            let attempts = retry_tracker.entry(RENDER_DOC_TOOL.to_string()).or_insert(0);
                            *attempts += 1;
                            if *attempts > 1 {
                                return Err(AgentError::PipelineAborted(
                                    envelope.error_or("生成文档失败。"),
                                ));
                            }
                            // 留在 CONTEXT_SENT，下一轮由模型重试
                            break;
                        }
                        doc_path = Some(envelope.path);
                        state = DocgenState::DocSaved;
                    }
                    _ => {}
                }
            }

            if state == DocgenState::DocSaved {
                let closing = outcome.assistant.content.trim().to_string();
                return Ok(if closing.is_empty() {
                    doc_path.unwrap_or_else(|| DOC_SAVED_FALLBACK.to_string())
                } else {
                    closing
                });
            }
        }

        tracing::warn!("docgen reached turn limit");
        Ok(doc_path.unwrap_or_else(|| WORKFLOW_INCOMPLETE.to_string()))
    }
}

/// 尚未出现在上下文 JSON 中的占位符；上下文不可解析时视为全部缺失
fn missing_placeholders(placeholders: &[String], ctx_raw: &str) -> Vec<String> {
    let parsed: Option<serde_json::Map<String, Value>> = extract_json_object(ctx_raw)
        .and_then(|json| serde_json::from_str(json).ok());
    match parsed {
        Some(map) => placeholders
            .iter()
            .filter(|ph| !map.contains_key(*ph))
            .cloned()
            .collect(),
        None => placeholders.to_vec(),
    }
}

/// 占位符工具返回 JSON 字符串数组；其余形态一律按空清单处理
fn parse_placeholder_list(content: &str) -> Vec<String> {
    serde_json::from_str::<Vec<String>>(content).unwrap_or_default()
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

    #[test]
    fn test_missing_placeholders_reports_gaps() {
        let placeholders = vec!["client_name".to_string(), "budget".to_string()];
        let missing = missing_placeholders(&placeholders, r#"{"client_name":"PT X"}"#);
        assert_eq!(missing, vec!["budget".to_string()]);
    }

    #[test]
    fn test_missing_placeholders_complete_context() {
        let placeholders = vec!["client_name".to_string(), "budget".to_string()];
        let missing =
            missing_placeholders(&placeholders, r#"{"client_name":"PT X","budget":"1M"}"#);
        assert!(missing.is_empty());
    }

    #[test]
    fn test_missing_placeholders_unparsable_context() {
        let placeholders = vec!["a".to_string()];
        let missing = missing_placeholders(&placeholders, "bukan json");
        assert_eq!(missing, placeholders);
    }

    #[test]
    fn test_parse_placeholder_list() {
        assert_eq!(
            parse_placeholder_list(r#"["client_name","budget"]"#),
            vec!["client_name".to_string(), "budget".to_string()]
        );
        assert!(parse_placeholder_list("oops").is_empty());
    }

    #[test]
    fn test_envelope_error_or_fallback() {
        let envelope = ToolEnvelope::parse(r#"{"status":"failure","error":"file hilang"}"#);
        assert!(!envelope.succeeded());
        assert_eq!(envelope.error_or("default"), "file hilang");
        let empty = ToolEnvelope::parse("not json");
        assert_eq!(empty.error_or("default"), "default");
    }
}
