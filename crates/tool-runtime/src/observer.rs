use serde_json::{Map, Value};

use crate::state::SessionStatus;

/// Hooks the loop calls as it makes progress.
///
/// Passed in at construction; front ends implement it to show progress.
/// Every method defaults to doing nothing.
pub trait LoopObserver: Send + Sync {
    fn on_thought(&self, _session_id: &str, _thought: &str) {}

    fn on_dispatch(&self, _session_id: &str, _tool: &str, _inputs: &Map<String, Value>) {}

    fn on_result(&self, _session_id: &str, _tool: &str, _result: &Value, _is_error: bool) {}

    /// A `display_to_user` style message that does not pause the session.
    fn on_notice(&self, _session_id: &str, _message: &str) {}

    fn on_awaiting_input(&self, _session_id: &str, _prompt: &str) {}

    fn on_status(&self, _session_id: &str, _status: &SessionStatus) {}
}

pub struct NoopObserver;

impl LoopObserver for NoopObserver {}

#[cfg(any(test, feature = "test-utils"))]
pub mod recording {
    use super::*;
    use std::sync::Mutex;

    /// Observer that records every callback as a short string.
    #[derive(Default)]
    pub struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl LoopObserver for RecordingObserver {
        fn on_thought(&self, _session_id: &str, thought: &str) {
            self.push(format!("thought:{thought}"));
        }

        fn on_dispatch(&self, _session_id: &str, tool: &str, _inputs: &Map<String, Value>) {
            self.push(format!("dispatch:{tool}"));
        }

        fn on_result(&self, _session_id: &str, tool: &str, _result: &Value, is_error: bool) {
            self.push(format!("result:{tool}:{is_error}"));
        }

        fn on_notice(&self, _session_id: &str, message: &str) {
            self.push(format!("notice:{message}"));
        }

        fn on_awaiting_input(&self, _session_id: &str, prompt: &str) {
            self.push(format!("awaiting:{prompt}"));
        }

        fn on_status(&self, _session_id: &str, status: &SessionStatus) {
            self.push(format!("status:{}", status.label()));
        }
    }
}
