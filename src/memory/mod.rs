//! 记忆层：检索注入与最终提交（桥）+ 可插拔存储

pub mod bridge;
pub mod store;

pub use bridge::{MemoryBridge, MemoryRecord, MemoryStore};
pub use store::{FileMemoryStore, InMemoryStore};
