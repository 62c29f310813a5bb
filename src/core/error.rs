//! Agent 错误类型
//!
//! 传播策略：只有意图路由连续失败（在 router 内部兜底消化）与流水线强制工具
//! 二次失败会以错误形式短路；其余失败一律降级为写回对话的文本。
//! process_query 边界将所有错误折叠为字符串答案，绝不向前端抛出。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误（LLM、解析、工具、流水线中止等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    /// 工具产出的结构化 payload 缺少必需字段
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// 强制工具二次失败等流水线级中止；携带面向用户的解释
    #[error("Pipeline aborted: {0}")]
    PipelineAborted(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Cancelled")]
    Cancelled,
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::ConfigError(e.to_string())
    }
}
