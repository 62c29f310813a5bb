//! ProjectWise - 对话式编排引擎
//!
//! 一条用户查询经意图路由进入确定性的工具协作流程，LLM 只作为推理/决策
//! 外部组件，动作层是工具服务器（list_tools / call_tool 协议），结果经记忆桥
//! 持久化。模块划分：
//! - **agent**: process_query 入口（路由 -> 流水线 -> 记忆提交契约）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、工具并发调度
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 记忆桥与可插拔存储
//! - **pipeline**: 两个受限状态机（KAK/TOR 分析、提案生成）
//! - **prompts**: prompt 加载（文件覆盖 + 内置回退）
//! - **router**: 意图路由（schema 约束输出 + 退避重试 + 安全默认）
//! - **session**: 消息模型与通用多轮会话循环
//! - **slug**: 查询到文档名的推断
//! - **tools**: 工具协议层（清单缓存、执行器、远程 JSON-RPC 客户端）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod pipeline;
pub mod prompts;
pub mod router;
pub mod session;
pub mod slug;
pub mod tools;

pub use agent::ProjectWiseAgent;
pub use config::{load_config, AppConfig};
