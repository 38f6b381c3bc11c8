pub mod adapter;
pub mod provider;
pub mod providers;

pub use adapter::LlmCompletionAdapter;
pub use provider::{LlmError, LlmProvider, Message, Role};
pub use providers::{create_completion_model, create_provider};
