//! iagent Runtime - agent loop, output parser, code executor and run builder
//!
//! ```rust,ignore
//! use iagent_runtime::Runtime;
//!
//! let runtime = Runtime::new(model, config)?;
//! let result = runtime.run("Why is the API returning 502s?").await?;
//! println!("{}", result.answer);
//! ```

pub mod executor;
pub mod prompts;
pub mod runtime;

pub use executor::{
    parse_action, Action, AgentLoop, CodeExecution, CodeExecutor, ExecutionStatus, LoopSettings,
};
pub use runtime::{effective_agent_type, Runtime};
