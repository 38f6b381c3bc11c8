pub mod context;
pub mod observer;
pub mod output;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod runtime;
pub mod state;
pub mod store;
pub mod tool;
pub mod tools;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use context::{CredentialSource, NoCredentials, ToolContext};
pub use observer::{LoopObserver, NoopObserver};
pub use output::{
    DraftMethod, OutreachMessage, Score, ScoredBatch, ScoredCandidate, ScoringMethod, SentReceipt,
    ToolOutput,
};
pub use parser::{ActionRequest, Decision, JsonSpanParser, ParseFailure, ResponseParser};
pub use provider::{CompletionModel, ModelError};
pub use registry::{RegistryError, ToolRegistry, ValidationError};
pub use runtime::{AdvanceOutcome, AgentLoop, LoopError, LoopSettings, PendingAction};
pub use state::{
    SessionStatus, SessionSummary, StateRecord, ToolFeedback, Turn, TurnContent, TurnRole,
};
pub use store::{validate_session_id, StateStore, StoreError};
pub use tool::{ParamKind, ParamSpec, Tool, ToolCategory, ToolDescriptor, ToolError};
pub use tools::outreach_registry;
