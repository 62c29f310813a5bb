//! 会话层：消息模型与通用多轮循环

pub mod loop_;
pub mod message;

pub use loop_::{
    dispatch_tool_calls, run_turn, ArgDefaults, Session, SessionLoop, SessionOutcome, TurnOutcome,
    NO_ANSWER,
};
pub use message::{Message, Role, ToolCallRequest, ToolRecord};
