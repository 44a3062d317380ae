pub mod context;
pub mod executor;
pub mod prompt;
pub mod runtime;
pub mod tools;

pub use context::{correlate, load_context_file};
pub use executor::{BrowserExecutor, ToolExecutor};
pub use runtime::run_task;
pub use tools::ToolCall;
