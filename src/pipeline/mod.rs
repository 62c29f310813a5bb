//! 流水线层：通用会话循环之上的两个受限状态机
//!
//! analysis（KAK/TOR 招标分析）与 docgen（提案生成）在指定状态强制指定工具、
//! 在状态边界整体重置对话以约束 prompt 规模、对强制工具执行「重试一次即中止」。
//! 状态为封闭枚举，转移只发生在各自 run 循环的匹配臂中；重试计数用显式计数器，
//! 不用递归。

pub mod analysis;
pub mod docgen;

pub use analysis::AnalysisPipeline;
pub use docgen::DocgenPipeline;
