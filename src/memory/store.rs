//! 记忆存储实现
//!
//! InMemoryStore：关键词重叠检索（无真实向量，适合测试与单机）；
//! FileMemoryStore：按 user_id 分文件的 JSONL 追加存储，检索逻辑相同。
//! 真实向量库可在 MemoryStore 之后接入。

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::memory::{MemoryRecord, MemoryStore};

/// 将文本切分为小写词集合，用于简单相似度（词重叠数）
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 1)
        .collect()
}

fn score(query_tokens: &HashSet<String>, doc_tokens: &HashSet<String>) -> usize {
    query_tokens.intersection(doc_tokens).count()
}

fn rank(records: &[MemoryRecord], query: &str, user_id: &str, limit: usize) -> Vec<String> {
    let query_tokens = tokenize_lower(query);
    if query_tokens.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(usize, &MemoryRecord)> = records
        .iter()
        .filter(|r| r.user_id == user_id)
        .map(|r| (score(&query_tokens, &tokenize_lower(&r.content)), r))
        .filter(|(s, _)| *s > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, r)| r.content.clone())
        .collect()
}

/// 内存实现
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<MemoryRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn add(&self, records: &[MemoryRecord]) -> Result<(), String> {
        self.records
            .write()
            .map_err(|e| e.to_string())?
            .extend(records.iter().cloned());
        Ok(())
    }

    async fn search(&self, query: &str, user_id: &str, limit: usize) -> Result<Vec<String>, String> {
        let records = self.records.read().map_err(|e| e.to_string())?;
        Ok(rank(&records, query, user_id, limit))
    }
}

/// JSONL 文件实现：<root>/<user_id>.jsonl
pub struct FileMemoryStore {
    root: PathBuf,
}

impl FileMemoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn user_path(&self, user_id: &str) -> PathBuf {
        // user_id 里的路径分隔符一律替换，防止逃逸存储目录
        let safe: String = user_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{safe}.jsonl"))
    }

    fn load(&self, user_id: &str) -> Result<Vec<MemoryRecord>, String> {
        let path = self.user_path(user_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| e.to_string())?;
        Ok(raw
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

#[async_trait]
impl MemoryStore for FileMemoryStore {
    async fn add(&self, records: &[MemoryRecord]) -> Result<(), String> {
        use std::io::Write;

        std::fs::create_dir_all(&self.root).map_err(|e| e.to_string())?;
        for record in records {
            let path = self.user_path(&record.user_id);
            let line = serde_json::to_string(record).map_err(|e| e.to_string())?;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| e.to_string())?;
            writeln!(file, "{line}").map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    async fn search(&self, query: &str, user_id: &str, limit: usize) -> Result<Vec<String>, String> {
        let records = self.load(user_id)?;
        Ok(rank(&records, query, user_id, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use chrono::Utc;

    fn record(user: &str, content: &str) -> MemoryRecord {
        MemoryRecord {
            role: Role::User,
            content: content.to_string(),
            user_id: user.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_search_is_scoped_to_user() {
        let store = InMemoryStore::new();
        store
            .add(&[
                record("alice", "proyek bank sumsel babel"),
                record("bob", "proyek switch core"),
            ])
            .await
            .unwrap();

        let hits = store.search("proyek bank", "alice", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains("sumsel"));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMemoryStore::new(dir.path());
        store
            .add(&[record("alice", "analisa proyek alpha selesai")])
            .await
            .unwrap();

        let hits = store.search("proyek alpha", "alice", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(store.search("proyek alpha", "bob", 5).await.unwrap().is_empty());
    }
}
