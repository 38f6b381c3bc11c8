use crate::context::{CredentialSource, NoCredentials, ToolContext};
use crate::observer::{LoopObserver, NoopObserver};
use crate::output::ToolOutput;
use crate::parser::{ActionRequest, JsonSpanParser, ResponseParser};
use crate::prompt::{self, DEFAULT_INSTRUCTIONS};
use crate::provider::{CompletionModel, ModelError};
use crate::registry::ToolRegistry;
use crate::state::{SessionStatus, StateRecord, ToolFeedback, Turn};
use crate::store::{StateStore, StoreError};
use crate::tool::ToolError;
use outreach_core::config::AgentConfig;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Thought reported when the model cannot be reached.
pub const MODEL_UNAVAILABLE: &str =
    "I couldn't reach the language model just now. Please try again shortly.";

#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Model turns allowed per external invocation.
    pub max_iterations: usize,
    /// Applied separately to each model call and each tool dispatch.
    pub call_timeout: Duration,
    pub instructions: String,
}

impl LoopSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            call_timeout: Duration::from_secs(config.call_timeout_secs),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// What the external driver needs to act on after one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceOutcome {
    pub session_id: String,
    pub status: SessionStatus,
    /// Last thought from the model, or the best-effort raw answer.
    pub thought: String,
    pub pending_action: Option<PendingAction>,
    /// Messages shown to the human without pausing.
    pub notices: Vec<String>,
    /// Set when the model output could not be parsed.
    pub raw_answer: Option<String>,
    pub iterations: usize,
    pub dispatches: usize,
}

impl AdvanceOutcome {
    pub fn terminal(&self) -> bool {
        self.status == SessionStatus::Terminated
    }

    pub fn awaiting_input(&self) -> bool {
        self.status.is_awaiting()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub tool: String,
    pub prompt: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("State persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

/// How a single dispatch ended.
enum Dispatch {
    /// Unknown tool or invalid inputs; fed back so the model can correct itself.
    Rejected(String),
    /// The tool ran and failed.
    Failed(String),
    Completed(ToolOutput),
}

/// The agent control loop.
///
/// One call to [`AgentLoop::advance`] is one invocation: it runs model turns
/// until the model stops asking for tools, a tool asks the human for input,
/// or the iteration cap is reached. Exactly one tool is dispatched per model
/// turn, and the state record is saved after every dispatch.
pub struct AgentLoop {
    model: Arc<dyn CompletionModel>,
    registry: Arc<ToolRegistry>,
    store: Arc<dyn StateStore>,
    parser: Arc<dyn ResponseParser>,
    observer: Arc<dyn LoopObserver>,
    credentials: Arc<dyn CredentialSource>,
    settings: LoopSettings,
}

impl AgentLoop {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            model,
            registry,
            store,
            parser: Arc::new(JsonSpanParser),
            observer: Arc::new(NoopObserver),
            credentials: Arc::new(NoCredentials),
            settings: LoopSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.settings.max_iterations = max;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.settings.call_timeout = timeout;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.settings.instructions = instructions.into();
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LoopObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Run one invocation for `session_id`, appending `input` first if given.
    ///
    /// The session is created on first use. Only persistence failures are
    /// returned as errors; everything else becomes conversation content.
    pub async fn advance(
        &self,
        session_id: &str,
        input: Option<&str>,
    ) -> Result<AdvanceOutcome, LoopError> {
        let record = match self.store.load(session_id)? {
            Some(record) => record,
            None => {
                debug!(session_id, "Creating new session state");
                StateRecord::new(session_id)
            }
        };
        self.run(record, input).await
    }

    /// Inject an inbound external message as a user turn and run once.
    ///
    /// Returns `Ok(None)` when the message id was already processed or the
    /// session does not exist.
    pub async fn inject_inbound(
        &self,
        session_id: &str,
        message_id: &str,
        text: &str,
    ) -> Result<Option<AdvanceOutcome>, LoopError> {
        let Some(mut record) = self.store.load(session_id)? else {
            warn!(session_id, message_id, "Inbound message for unknown session");
            return Ok(None);
        };
        if !record.mark_inbound(message_id) {
            debug!(session_id, message_id, "Inbound message already processed");
            return Ok(None);
        }
        info!(session_id, message_id, "Injecting inbound message");
        self.run(record, Some(text)).await.map(Some)
    }

    async fn run(
        &self,
        mut record: StateRecord,
        input: Option<&str>,
    ) -> Result<AdvanceOutcome, LoopError> {
        let session_id = record.session_id().to_string();
        let mut outcome = AdvanceOutcome {
            session_id: session_id.clone(),
            status: SessionStatus::Running,
            thought: String::new(),
            pending_action: None,
            notices: Vec::new(),
            raw_answer: None,
            iterations: 0,
            dispatches: 0,
        };

        if let Some(text) = input {
            if record.record_goal(text) {
                debug!(session_id = %session_id, "Recorded session goal");
            }
            record.push_turn(Turn::user_text(text));
        }
        record.set_status(SessionStatus::Running);
        self.persist(&record)?;

        for iteration in 0..self.settings.max_iterations {
            outcome.iterations = iteration + 1;
            debug!(session_id = %session_id, iteration, "Starting agent loop iteration");

            let prompt = prompt::render(
                &self.settings.instructions,
                &self.registry,
                record.conversation_history(),
            );

            let raw = match self.call_model(&prompt).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Model call failed");
                    record.record_error(format!("Model call failed: {e}"));
                    outcome.thought = MODEL_UNAVAILABLE.to_string();
                    return self.finish(record, outcome, SessionStatus::Terminated);
                }
            };

            let decision = match self.parser.parse(&raw) {
                Ok(decision) => decision,
                Err(failure) => {
                    warn!(session_id = %session_id, error = %failure, "Unparseable model output");
                    record.push_turn(Turn::assistant_text(&raw));
                    record.record_error(format!("Failed to parse model output: {failure}"));
                    outcome.thought = raw.trim().to_string();
                    outcome.raw_answer = Some(raw);
                    return self.finish(record, outcome, SessionStatus::Terminated);
                }
            };

            record.push_turn(Turn::assistant_decision(decision.object.clone()));
            outcome.thought = decision.thought.clone();
            if !decision.thought.is_empty() {
                self.observer.on_thought(&session_id, &decision.thought);
            }

            let Some(action) = decision.action else {
                info!(session_id = %session_id, iteration, "Model requested no action, ending invocation");
                return self.finish(record, outcome, SessionStatus::Terminated);
            };

            outcome.dispatches += 1;
            let mut sent_thread = None;
            let dispatch = self.dispatch(&record, &action).await;
            match dispatch {
                Dispatch::Rejected(message) => {
                    warn!(session_id = %session_id, tool = %action.name, %message, "Tool call rejected");
                    self.feed_back(&mut record, &action, Value::String(message), true);
                }
                Dispatch::Failed(message) => {
                    warn!(session_id = %session_id, tool = %action.name, %message, "Tool execution failed");
                    record.record_error(message.clone());
                    self.feed_back(&mut record, &action, Value::String(message), true);
                }
                Dispatch::Completed(ToolOutput::AwaitInput { prompt }) => {
                    info!(session_id = %session_id, tool = %action.name, "Awaiting human input");
                    self.observer.on_awaiting_input(&session_id, &prompt);
                    outcome.pending_action = Some(PendingAction {
                        tool: action.name.clone(),
                        prompt: prompt.clone(),
                    });
                    return self.finish(
                        record,
                        outcome,
                        SessionStatus::AwaitingHumanInput { prompt },
                    );
                }
                Dispatch::Completed(output) => {
                    if let ToolOutput::Notice(message) = &output {
                        self.observer.on_notice(&session_id, message);
                        outcome.notices.push(message.clone());
                    }
                    sent_thread = record.fold(&output);
                    self.feed_back(&mut record, &action, output.feedback_value(), false);
                }
            }

            // The send is on disk before the index points at it.
            self.persist(&record)?;
            if let Some(thread_id) = sent_thread {
                info!(session_id = %session_id, thread_id = %thread_id, "Recording outbound thread");
                self.store
                    .index_outbound(&thread_id, &session_id)
                    .inspect_err(|e| error!(session_id = %session_id, error = %e, "Failed to index outbound thread"))?;
            }
        }

        warn!(
            session_id = %session_id,
            max_iterations = self.settings.max_iterations,
            "Iteration limit reached, yielding with session still running"
        );
        self.finish(record, outcome, SessionStatus::Running)
    }

    async fn call_model(&self, prompt: &str) -> Result<String, ModelError> {
        match tokio::time::timeout(self.settings.call_timeout, self.model.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout(self.settings.call_timeout)),
        }
    }

    async fn dispatch(&self, record: &StateRecord, action: &ActionRequest) -> Dispatch {
        let name = action.name.as_str();
        let tool = match self.registry.resolve(name) {
            Ok(tool) => tool,
            Err(e) => return Dispatch::Rejected(e.to_string()),
        };
        let inputs = match self.registry.validate(name, &action.inputs) {
            Ok(inputs) => inputs,
            Err(e) => return Dispatch::Rejected(e.to_string()),
        };

        let context = ToolContext::new(record.session_id())
            .with_goal(record.raw_goal())
            .with_preferences(record.user_preferences().clone())
            .with_sender_info(record.sender_info().clone())
            .with_credentials(self.credentials.credentials(record.session_id()));

        info!(session_id = %record.session_id(), tool = name, "Dispatching tool");
        self.observer.on_dispatch(record.session_id(), name, &inputs);

        let mut handle =
            tokio::spawn(async move { tool.execute(inputs, &context).await });
        let result = match tokio::time::timeout(self.settings.call_timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ToolError::ExecutionFailed(if join_error.is_panic() {
                "tool panicked".to_string()
            } else {
                join_error.to_string()
            })),
            Err(_) => {
                handle.abort();
                Err(ToolError::Timeout(self.settings.call_timeout))
            }
        };

        match result {
            Ok(output) => Dispatch::Completed(output),
            Err(e) => Dispatch::Failed(format!("Error executing {name}: {e}")),
        }
    }

    fn feed_back(
        &self,
        record: &mut StateRecord,
        action: &ActionRequest,
        result: Value,
        is_error: bool,
    ) {
        self.observer
            .on_result(record.session_id(), &action.name, &result, is_error);
        record.push_turn(Turn::feedback(ToolFeedback {
            tool: action.name.clone(),
            inputs: action.inputs.clone(),
            result,
            is_error,
        }));
    }

    fn finish(
        &self,
        mut record: StateRecord,
        mut outcome: AdvanceOutcome,
        status: SessionStatus,
    ) -> Result<AdvanceOutcome, LoopError> {
        record.set_status(status.clone());
        self.persist(&record)?;
        self.observer.on_status(record.session_id(), &status);
        outcome.status = status;
        Ok(outcome)
    }

    fn persist(&self, record: &StateRecord) -> Result<(), LoopError> {
        self.store
            .save(record.session_id(), record)
            .inspect_err(|e| {
                error!(session_id = %record.session_id(), error = %e, "Failed to persist session state")
            })?;
        Ok(())
    }
}
