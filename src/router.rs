//! 意图路由
//!
//! 一次 schema 约束的 LLM 调用把原始查询分到固定标签集（附置信度），
//! 失败按指数退避重试，重试耗尽返回安全默认 {other, 0.0}；classify
//! 对调用方永不报错。置信度阈值是策略常量，不随调用协商。

use std::sync::Arc;
use std::time::Duration;

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::llm::{extract_json_object, ChatClient};
use crate::session::Message;

/// 路由结果可执行的最低置信度；低于此值按 other 处理
pub const CONFIDENCE_THRESHOLD: f32 = 0.7;

/// 总尝试次数（首次 + 重试）
const MAX_ATTEMPTS: u32 = 3;
/// 退避基准延迟，逐次翻倍
const BASE_BACKOFF_MS: u64 = 200;

/// 意图标签（与路由 prompt 的 wire 标签一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// KAK/TOR 招标文档分析
    KakAnalyzer,
    /// 提案文档生成
    GenerateDocument,
    Other,
}

/// 每个查询恰好产生一次的不可变路由结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IntentRoute {
    pub intent: Intent,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub confidence_score: f32,
}

impl IntentRoute {
    /// 置信度达到阈值才进入专用流水线
    pub fn is_actionable(&self) -> bool {
        self.confidence_score >= CONFIDENCE_THRESHOLD
    }

    fn fallback() -> Self {
        Self {
            intent: Intent::Other,
            confidence_score: 0.0,
        }
    }
}

/// 意图路由器
pub struct IntentRouter {
    llm: Arc<dyn ChatClient>,
    base_backoff: Duration,
}

impl IntentRouter {
    pub fn new(llm: Arc<dyn ChatClient>) -> Self {
        Self {
            llm,
            base_backoff: Duration::from_millis(BASE_BACKOFF_MS),
        }
    }

    /// 覆盖退避基准（测试用 Duration::ZERO）
    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    /// 分类查询；任何失败路径最终落到 {other, 0.0}
    pub async fn classify(&self, query: &str) -> IntentRoute {
        let messages = router_messages(query);
        let schema = serde_json::to_value(schema_for!(IntentRoute)).unwrap_or_default();

        let mut delay = self.base_backoff;
        for attempt in 1..=MAX_ATTEMPTS {
            match self
                .llm
                .complete_structured(&messages, "intent_route", schema.clone())
                .await
            {
                Ok(raw) => match parse_route(&raw) {
                    Ok(route) => {
                        tracing::info!(intent = ?route.intent, confidence = route.confidence_score, "intent routed");
                        return route;
                    }
                    Err(e) => {
                        tracing::warn!(attempt, error = %e, raw = %raw, "router output unparsable");
                    }
                },
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "router llm call failed");
                }
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        tracing::warn!("intent routing exhausted retries, falling back to other");
        IntentRoute::fallback()
    }
}

fn parse_route(raw: &str) -> Result<IntentRoute, String> {
    let json = extract_json_object(raw).ok_or_else(|| "no JSON object in output".to_string())?;
    let mut route: IntentRoute = serde_json::from_str(json).map_err(|e| e.to_string())?;
    route.confidence_score = route.confidence_score.clamp(0.0, 1.0);
    Ok(route)
}

/// system + 4 组 few-shot 对话 + 查询
fn router_messages(query: &str) -> Vec<Message> {
    vec![
        Message::system(
            "Anda adalah *Router Agent*.\n\
             Balas **hanya** JSON sesuai skema: \
             {\"intent\":\"<kak_analyzer|generate_document|other>\", \"confidence_score\":0.xx}",
        ),
        Message::user("Analisa proyek Bank Sumsel Babel"),
        Message::assistant(r#"{"intent":"kak_analyzer","confidence_score":0.95}"#),
        Message::user("Apa saja barang dan jasa di dalam proyek bank sumsel babel?"),
        Message::assistant(r#"{"intent":"kak_analyzer","confidence_score":0.92}"#),
        Message::user("Buatkan proposal implementasi Switch Core"),
        Message::assistant(r#"{"intent":"generate_document","confidence_score":0.9}"#),
        Message::user("Berapa harga Bitcoin hari ini?"),
        Message::assistant(r#"{"intent":"other","confidence_score":0.88}"#),
        Message::user(query),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatClient;

    #[tokio::test]
    async fn test_classify_parses_valid_route() {
        let llm = Arc::new(MockChatClient::new());
        llm.push_structured(r#"{"intent":"kak_analyzer","confidence_score":0.95}"#);
        let router = IntentRouter::new(llm).with_base_backoff(Duration::ZERO);

        let route = router.classify("Analisa proyek Alpha").await;
        assert_eq!(route.intent, Intent::KakAnalyzer);
        assert!(route.is_actionable());
    }

    #[tokio::test]
    async fn test_classify_falls_back_after_three_malformed_attempts() {
        let llm = Arc::new(MockChatClient::new());
        for _ in 0..3 {
            llm.push_structured("bukan json sama sekali");
        }
        let router = IntentRouter::new(llm.clone()).with_base_backoff(Duration::ZERO);

        let route = router.classify("apa ini").await;
        assert_eq!(
            route,
            IntentRoute {
                intent: Intent::Other,
                confidence_score: 0.0
            }
        );
        assert_eq!(llm.structured_calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_classify_recovers_on_second_attempt() {
        let llm = Arc::new(MockChatClient::new());
        llm.push_structured_error("transport down");
        llm.push_structured(r#"{"intent":"generate_document","confidence_score":0.9}"#);
        let router = IntentRouter::new(llm).with_base_backoff(Duration::ZERO);

        let route = router.classify("Buatkan proposal").await;
        assert_eq!(route.intent, Intent::GenerateDocument);
    }

    #[test]
    fn test_low_confidence_is_not_actionable() {
        let route = IntentRoute {
            intent: Intent::KakAnalyzer,
            confidence_score: 0.69,
        };
        assert!(!route.is_actionable());
    }

    #[test]
    fn test_parse_route_clamps_confidence() {
        let route = parse_route(r#"{"intent":"other","confidence_score":1.7}"#).unwrap();
        assert_eq!(route.confidence_score, 1.0);
    }
}
