//! 工具并发调度
//!
//! 单轮内的多个工具调用并发分发，由固定大小的 Semaphore 许可池限流，
//! 避免压垮工具服务器；许可释放即归还，无长期持锁。

use std::sync::Arc;

use tokio::sync::Semaphore;

/// 工具并发调度器：执行前先取得许可（默认 5）
#[derive(Clone)]
pub struct ToolScheduler {
    permits: Arc<Semaphore>,
}

impl ToolScheduler {
    pub fn new(max_parallel_tools: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_parallel_tools.max(1))),
        }
    }

    /// 获取工具执行许可
    pub async fn acquire(&self) -> tokio::sync::OwnedSemaphorePermit {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed")
    }
}

impl Default for ToolScheduler {
    fn default() -> Self {
        Self::new(5)
    }
}
