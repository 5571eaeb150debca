//! Agent executor module - Core execution logic

pub mod agent_loop;
pub mod code_executor;
pub mod parser;

pub use agent_loop::{AgentLoop, LoopSettings};
pub use code_executor::{CodeExecution, CodeExecutor, ExecutionStatus, ALLOWED_IMPORTS};
pub use parser::{parse_action, Action};
