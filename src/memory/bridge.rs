//! 记忆桥
//!
//! retrieve 尽力而为：检索失败降级为空序列并告警，绝不向调用方抛错；
//! 注入 prompt 前每条截断到固定长度预算。commit 同样尽力而为，失败只记日志，
//! 由 process_query 的唯一出口保证每个查询恰好提交一次（无论成败）。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::Role;

/// 记忆条目：追加写入，归外部存储所有
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub role: Role,
    pub content: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

/// 记忆存储接口：add 追加、search 按相关度检索
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn add(&self, records: &[MemoryRecord]) -> Result<(), String>;

    async fn search(&self, query: &str, user_id: &str, limit: usize) -> Result<Vec<String>, String>;
}

/// 记忆桥：检索注入与最终提交
pub struct MemoryBridge {
    store: Arc<dyn MemoryStore>,
    /// 单条注入文本的最大字符数
    item_max_chars: usize,
}

impl MemoryBridge {
    pub fn new(store: Arc<dyn MemoryStore>, item_max_chars: usize) -> Self {
        Self {
            store,
            item_max_chars,
        }
    }

    /// 检索相关记忆片段；失败返回空序列
    pub async fn retrieve(&self, query: &str, user_id: &str, limit: usize) -> Vec<String> {
        match self.store.search(query, user_id, limit).await {
            Ok(items) => items
                .into_iter()
                .map(|item| truncate_chars(&item, self.item_max_chars))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "memory search failed");
                Vec::new()
            }
        }
    }

    /// 提交一次 (query, answer) 往来；失败只记日志
    pub async fn commit(&self, query: &str, answer: &str, user_id: &str) {
        let now = Utc::now();
        let records = [
            MemoryRecord {
                role: Role::User,
                content: query.to_string(),
                user_id: user_id.to_string(),
                timestamp: now,
            },
            MemoryRecord {
                role: Role::Assistant,
                content: answer.to_string(),
                user_id: user_id.to_string(),
                timestamp: now,
            },
        ];
        if let Err(e) = self.store.add(&records).await {
            tracing::warn!(error = %e, "memory commit failed");
        }
    }

    /// 把记忆片段格式化为 system prompt 中的 User Memories 段
    pub fn format_block(memories: &[String]) -> String {
        if memories.is_empty() {
            return "[Tidak ada memori ditemukan]".to_string();
        }
        memories
            .iter()
            .map(|m| format!("- {m}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 按字符截断并追加省略标记
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FlakyStore {
        fail: bool,
        added: Mutex<Vec<MemoryRecord>>,
    }

    #[async_trait]
    impl MemoryStore for FlakyStore {
        async fn add(&self, records: &[MemoryRecord]) -> Result<(), String> {
            if self.fail {
                return Err("store down".to_string());
            }
            self.added.lock().unwrap().extend(records.iter().cloned());
            Ok(())
        }

        async fn search(
            &self,
            _query: &str,
            _user_id: &str,
            _limit: usize,
        ) -> Result<Vec<String>, String> {
            if self.fail {
                return Err("store down".to_string());
            }
            Ok(vec!["x".repeat(50)])
        }
    }

    #[tokio::test]
    async fn test_retrieve_failure_yields_empty() {
        let bridge = MemoryBridge::new(
            Arc::new(FlakyStore {
                fail: true,
                added: Mutex::new(Vec::new()),
            }),
            10,
        );
        assert!(bridge.retrieve("q", "u", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_truncates_items() {
        let bridge = MemoryBridge::new(
            Arc::new(FlakyStore {
                fail: false,
                added: Mutex::new(Vec::new()),
            }),
            10,
        );
        let items = bridge.retrieve("q", "u", 5).await;
        assert_eq!(items[0], format!("{}...", "x".repeat(10)));
    }

    #[tokio::test]
    async fn test_commit_failure_does_not_panic() {
        let bridge = MemoryBridge::new(
            Arc::new(FlakyStore {
                fail: true,
                added: Mutex::new(Vec::new()),
            }),
            10,
        );
        bridge.commit("q", "a", "u").await;
    }

    #[test]
    fn test_format_block() {
        assert_eq!(
            MemoryBridge::format_block(&["satu".to_string(), "dua".to_string()]),
            "- satu\n- dua"
        );
        assert_eq!(MemoryBridge::format_block(&[]), "[Tidak ada memori ditemukan]");
    }
}
