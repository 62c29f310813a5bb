//! 核心类型：错误与工具并发调度

pub mod error;
pub mod scheduler;

pub use error::AgentError;
pub use scheduler::ToolScheduler;
