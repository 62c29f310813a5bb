//! ProjectWise Agent：查询处理入口
//!
//! process_query 是唯一对外入口：意图路由 -> 选定流水线（analysis / docgen /
//! 通用带记忆问答）-> 整条流水线包在时间预算内运行。所有失败模式先折叠为
//! 字符串答案，再经唯一出口做一次记忆提交：无论成功、工具失败、超时还是
//! 轮数耗尽，提交恰好发生一次，且本函数永不向调用方抛错。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{AgentError, ToolScheduler};
use crate::llm::{ChatClient, ToolChoice};
use crate::memory::{MemoryBridge, MemoryStore};
use crate::pipeline::analysis::{AnalysisPipeline, AnalysisRequest};
use crate::pipeline::docgen::{DocgenPipeline, DocgenRequest};
use crate::prompts::{self, PromptLibrary};
use crate::router::{Intent, IntentRoute, IntentRouter};
use crate::session::{Message, Session, SessionLoop};
use crate::slug;
use crate::tools::{ToolCatalog, ToolExecutor, ToolServer};

/// 流水线时间预算耗尽时的固定答案
pub const PIPELINE_TIMEOUT_MESSAGE: &str = "处理超时：已超过流程时间预算。";
/// 折叠后仍为空时的兜底答案
const EMPTY_ANSWER_FALLBACK: &str = "（无回复）";

/// ProjectWise Agent：持有一次会话所需的全部协作组件
pub struct ProjectWiseAgent {
    session: Session,
    router: IntentRouter,
    memory: MemoryBridge,
    prompts: PromptLibrary,
    retrieve_limit: usize,
    pipeline_timeout: Duration,
    abort_on_incomplete_context: bool,
}

impl ProjectWiseAgent {
    pub fn new(
        llm: Arc<dyn ChatClient>,
        server: Arc<dyn ToolServer>,
        store: Arc<dyn MemoryStore>,
        cfg: &AppConfig,
    ) -> Self {
        let session = Session {
            llm: llm.clone(),
            catalog: ToolCatalog::new(server.clone()),
            executor: ToolExecutor::new(server, cfg.tools.tool_timeout_secs),
            scheduler: ToolScheduler::new(cfg.tools.max_parallel_tools),
            cancel_token: CancellationToken::new(),
        };
        Self {
            session,
            router: IntentRouter::new(llm),
            memory: MemoryBridge::new(store, cfg.memory.item_max_chars),
            prompts: PromptLibrary::new(cfg.prompts.base_path.clone()),
            retrieve_limit: cfg.memory.retrieve_limit,
            pipeline_timeout: Duration::from_secs(cfg.pipeline.timeout_secs),
            abort_on_incomplete_context: cfg.pipeline.abort_on_incomplete_context,
        }
    }

    /// 当前可用工具名（前端展示用）
    pub async fn tool_names(&self) -> Vec<String> {
        self.session.catalog.tool_names().await
    }

    /// 处理一条查询；永远返回非空字符串，绝不 panic / 抛错
    pub async fn process_query(&self, query: &str, user_id: &str, max_turns: usize) -> String {
        let query_id = uuid::Uuid::new_v4();
        tracing::info!(%query_id, user_id, "processing query");
        let route = self.router.classify(query).await;

        let answer = match tokio::time::timeout(
            self.pipeline_timeout,
            self.dispatch(&route, query, user_id, max_turns),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "pipeline failed");
                format!("处理失败：{e}")
            }
            Err(_) => {
                tracing::warn!("pipeline exceeded time budget");
                PIPELINE_TIMEOUT_MESSAGE.to_string()
            }
        };

        let answer = if answer.trim().is_empty() {
            EMPTY_ANSWER_FALLBACK.to_string()
        } else {
            answer
        };

        // 唯一提交点：所有出口路径都已折叠到此
        self.memory.commit(query, &answer, user_id).await;
        tracing::info!(%query_id, answer_chars = answer.chars().count(), "query done");
        answer
    }

    async fn dispatch(
        &self,
        route: &IntentRoute,
        query: &str,
        user_id: &str,
        max_turns: usize,
    ) -> Result<String, AgentError> {
        let intent = if route.is_actionable() {
            route.intent
        } else {
            Intent::Other
        };

        match intent {
            Intent::KakAnalyzer => {
                let doc_name = slug::infer_document_slug(query)
                    .unwrap_or_else(|| "kak_tor".to_string());
                AnalysisPipeline::new(
                    &self.session,
                    self.prompts.get(prompts::KAK_ANALYZER),
                    max_turns,
                )
                .run(AnalysisRequest {
                    user_query: query,
                    prompt_instruction_name: prompts::KAK_ANALYZER,
                    kak_doc_name: &doc_name,
                })
                .await
            }
            Intent::GenerateDocument => {
                let project_name = slug::infer_document_slug(query)
                    .unwrap_or_else(|| slug::slugify(query));
                DocgenPipeline::new(
                    &self.session,
                    self.prompts.get(prompts::DOCUMENT_GENERATOR),
                    max_turns,
                )
                .with_abort_on_incomplete_context(self.abort_on_incomplete_context)
                .run(DocgenRequest {
                    project_name: &project_name,
                    user_query: Some(query),
                    override_template: None,
                })
                .await
            }
            Intent::Other => {
                let memories = self
                    .memory
                    .retrieve(query, user_id, self.retrieve_limit)
                    .await;
                let system = format!(
                    "{}\nUser Memories:\n{}",
                    self.prompts.get(prompts::GENERIC_CHAT),
                    MemoryBridge::format_block(&memories)
                );
                let outcome = SessionLoop::new(&self.session, max_turns)
                    .run(
                        vec![Message::system(system), Message::user(query)],
                        ToolChoice::Auto,
                    )
                    .await?;
                Ok(outcome.into_text())
            }
        }
    }
}
