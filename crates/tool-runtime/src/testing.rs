//! Test doubles for tools. Enabled in tests and with the `test-utils` feature.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::ToolContext;
use crate::output::ToolOutput;
use crate::tool::{Tool, ToolCategory, ToolDescriptor, ToolError};

/// Shared record of the validated inputs a tool was called with.
pub type CallLog = Arc<Mutex<Vec<Map<String, Value>>>>;

/// Returns a fixed output (or its own inputs as `Structured`) and logs calls.
pub struct EchoTool {
    descriptor: ToolDescriptor,
    output: Option<ToolOutput>,
    calls: CallLog,
}

impl EchoTool {
    pub fn new(descriptor: ToolDescriptor) -> Self {
        Self {
            descriptor,
            output: None,
            calls: Arc::default(),
        }
    }

    pub fn returning(mut self, output: ToolOutput) -> Self {
        self.output = Some(output);
        self
    }

    pub fn call_log(&self) -> CallLog {
        self.calls.clone()
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    async fn execute(
        &self,
        inputs: Map<String, Value>,
        _context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(inputs.clone());
        Ok(self
            .output
            .clone()
            .unwrap_or(ToolOutput::Structured(Value::Object(inputs))))
    }
}

/// Always fails with `ExecutionFailed`.
pub struct FailingTool {
    name: String,
    message: String,
}

impl FailingTool {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(&self.name, "Always fails", ToolCategory::Effectful)
    }

    async fn execute(
        &self,
        _inputs: Map<String, Value>,
        _context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        Err(ToolError::ExecutionFailed(self.message.clone()))
    }
}

pub struct PanickingTool {
    name: String,
}

impl PanickingTool {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

#[async_trait]
impl Tool for PanickingTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(&self.name, "Panics", ToolCategory::Information)
    }

    async fn execute(
        &self,
        _inputs: Map<String, Value>,
        _context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        panic!("{} blew up", self.name)
    }
}

/// Sleeps before answering; used to exercise dispatch timeouts.
pub struct SlowTool {
    name: String,
    delay: Duration,
}

impl SlowTool {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(&self.name, "Slow", ToolCategory::Information)
    }

    async fn execute(
        &self,
        _inputs: Map<String, Value>,
        _context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(ToolOutput::Text("finally".into()))
    }
}
