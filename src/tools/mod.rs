//! 工具协议层
//!
//! ToolServer trait 抽象外部工具服务器（list_tools / call_tool，参数与结果为
//! 不透明 JSON/文本，本层不做 schema 校验）；ToolCatalog 缓存会话内的工具清单，
//! ToolExecutor 对单次调用施加超时、脱敏与审计日志。

pub mod catalog;
pub mod executor;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use catalog::ToolCatalog;
pub use executor::ToolExecutor;
pub use remote::RemoteToolServer;

/// 工具服务器公布的单个工具：名称、描述（供 LLM 理解）、参数 JSON Schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object")]
    pub parameters: Value,
}

fn empty_object() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// 工具服务器接口：列举工具与按名调用；连接建立与会话协商不在本层
#[async_trait]
pub trait ToolServer: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, String>;

    /// 调用指定工具，返回文本结果；失败以 Err(String) 表达，由执行器转为错误文本
    async fn call_tool(&self, name: &str, args: Value) -> Result<String, String>;
}
