use crate::tool::{Tool, ToolDescriptor};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Static catalog of dispatchable tools, kept in registration order.
///
/// Lookup and validation only; holds no per-session state.
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: IndexMap::new(),
        }
    }

    /// Register a tool. Returns error if name already registered.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.descriptor().name;
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, RegistryError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn descriptor(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools.get(name).map(|t| t.descriptor())
    }

    /// Check `inputs` against the tool's parameter schema.
    ///
    /// Fills declared defaults for omitted optional parameters; `null` counts
    /// as omitted. Inputs not named in the schema pass through untouched.
    pub fn validate(
        &self,
        name: &str,
        inputs: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ValidationError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ValidationError::UnknownTool(name.to_string()))?;
        let descriptor = tool.descriptor();

        let mut normalized: Map<String, Value> = inputs
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for spec in &descriptor.params {
            match normalized.get(&spec.name) {
                Some(value) => {
                    if !spec.kind.matches(value) {
                        return Err(ValidationError::WrongType {
                            tool: descriptor.name.clone(),
                            param: spec.name.clone(),
                            expected: spec.kind.as_str(),
                            found: json_type_name(value),
                        });
                    }
                }
                None if spec.required => {
                    return Err(ValidationError::Missing {
                        tool: descriptor.name.clone(),
                        param: spec.name.clone(),
                    });
                }
                None => {
                    if let Some(default) = &spec.default {
                        normalized.insert(spec.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(normalized)
    }

    /// Descriptors in registration order (for prompting the model).
    pub fn catalog(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    /// Text form of the catalog inserted into prompts.
    pub fn render_catalog(&self) -> String {
        let mut out = String::new();
        for desc in self.catalog() {
            out.push_str(&format!(
                "- {}: {} [{}]\n",
                desc.name,
                desc.description,
                desc.category.as_str()
            ));
            for p in &desc.params {
                let flag = if p.required { "required" } else { "optional" };
                out.push_str(&format!("    {} ({}, {})", p.name, p.kind, flag));
                if let Some(default) = &p.default {
                    out.push_str(&format!(" default={default}"));
                }
                if !p.description.is_empty() {
                    out.push_str(&format!(": {}", p.description));
                }
                out.push('\n');
            }
        }
        out
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn json_type_name(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool with name '{0}' is already registered")]
    DuplicateName(String),
    #[error("Unknown function: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown function: {0}")]
    UnknownTool(String),
    #[error("Missing required parameter '{param}' for {tool}")]
    Missing { tool: String, param: String },
    #[error("Parameter '{param}' for {tool} must be {expected}, got {found}")]
    WrongType {
        tool: String,
        param: String,
        expected: &'static str,
        found: String,
    },
}
