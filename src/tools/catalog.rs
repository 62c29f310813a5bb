//! 工具清单缓存
//!
//! 首次访问时从工具服务器拉取并缓存；refresh 强制重新拉取。
//! 缓存以 Arc 共享，避免每轮克隆整张清单。

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::tools::{ToolDescriptor, ToolServer};

/// 会话内工具清单缓存
pub struct ToolCatalog {
    server: Arc<dyn ToolServer>,
    cache: RwLock<Option<Arc<Vec<ToolDescriptor>>>>,
}

impl ToolCatalog {
    pub fn new(server: Arc<dyn ToolServer>) -> Self {
        Self {
            server,
            cache: RwLock::new(None),
        }
    }

    /// 返回缓存的工具清单，缓存为空时先拉取
    pub async fn tools(&self) -> Result<Arc<Vec<ToolDescriptor>>, String> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            return Ok(cached.clone());
        }
        self.refresh().await
    }

    /// 强制从服务器重新拉取工具清单
    pub async fn refresh(&self) -> Result<Arc<Vec<ToolDescriptor>>, String> {
        let tools = Arc::new(self.server.list_tools().await?);
        *self.cache.write().await = Some(tools.clone());
        tracing::info!(count = tools.len(), "tool catalog refreshed");
        Ok(tools)
    }

    pub async fn tool_names(&self) -> Vec<String> {
        match self.tools().await {
            Ok(tools) => tools.iter().map(|t| t.name.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingServer {
        list_calls: AtomicUsize,
    }

    #[async_trait]
    impl ToolServer for CountingServer {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, String> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ToolDescriptor {
                name: "echo".to_string(),
                description: "echo".to_string(),
                parameters: serde_json::json!({}),
            }])
        }

        async fn call_tool(&self, _name: &str, _args: serde_json::Value) -> Result<String, String> {
            Ok("ok".to_string())
        }
    }

    #[tokio::test]
    async fn test_catalog_caches_until_refresh() {
        let server = Arc::new(CountingServer {
            list_calls: AtomicUsize::new(0),
        });
        let catalog = ToolCatalog::new(server.clone());

        assert_eq!(catalog.tools().await.unwrap().len(), 1);
        assert_eq!(catalog.tools().await.unwrap().len(), 1);
        assert_eq!(server.list_calls.load(Ordering::SeqCst), 1);

        catalog.refresh().await.unwrap();
        assert_eq!(server.list_calls.load(Ordering::SeqCst), 2);
    }
}
