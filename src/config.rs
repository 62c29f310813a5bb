//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PW__*` 覆盖（双下划线表示嵌套，
//! 如 `PW__LLM__MODEL=gpt-4o`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub pipeline: PipelineSection,
    pub memory: MemorySection,
    pub prompts: PromptsSection,
}

/// [app] 段：应用名与默认用户
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub default_user: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "ProjectWise".to_string(),
            default_user: "default_user".to_string(),
        }
    }
}

/// [llm] 段：模型与端点
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
        }
    }
}

/// [tools] 段：工具服务器端点、单次调用超时、并发上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub server_url: String,
    pub tool_timeout_secs: u64,
    pub max_parallel_tools: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000/rpc".to_string(),
            tool_timeout_secs: 30,
            max_parallel_tools: 5,
        }
    }
}

/// [pipeline] 段：轮数上限、整条流水线的时间预算、占位符补全失败策略
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub max_turns: usize,
    pub timeout_secs: u64,
    /// 占位符二次补全仍不完整时是否中止（false 则带缺口继续渲染）
    pub abort_on_incomplete_context: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_turns: 12,
            timeout_secs: 300,
            abort_on_incomplete_context: true,
        }
    }
}

/// [memory] 段：是否启用、存储目录、检索条数与单条注入预算
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub enabled: bool,
    pub path: Option<PathBuf>,
    pub retrieve_limit: usize,
    pub item_max_chars: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            retrieve_limit: 5,
            item_max_chars: 600,
        }
    }
}

/// [prompts] 段：prompt 覆盖目录
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PromptsSection {
    pub base_path: Option<PathBuf>,
}

/// 从 config 目录加载配置，环境变量 PW__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PW__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PW")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.tools.max_parallel_tools, 5);
        assert_eq!(cfg.pipeline.max_turns, 12);
        assert!(cfg.pipeline.abort_on_incomplete_context);
    }
}
