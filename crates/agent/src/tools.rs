use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{FunctionCall, FunctionDeclaration};

pub const UNKNOWN_FUNCTION: &str = "Unknown function";

/// Caller identity a function runs on behalf of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolContext {
    pub owner_id: String,
    pub session_id: String,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn declaration(&self) -> FunctionDeclaration;
    async fn execute(&self, context: &ToolContext, input: Value) -> Result<Value>;
}

/// Result of one dispatched call, ready to go back to the model.
#[derive(Clone, Debug, PartialEq)]
pub struct Dispatched {
    pub name: String,
    pub response: Value,
    pub success: bool,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Declarations sorted by name so requests are stable between turns.
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        let mut declarations: Vec<FunctionDeclaration> =
            self.tools.values().map(|tool| tool.declaration()).collect();
        declarations.sort_by(|left, right| left.name.cmp(&right.name));
        declarations
    }

    /// Run one call. Lookup is by exact name; errors never escape and become
    /// `{success: false, error}` responses instead.
    pub async fn dispatch(&self, context: &ToolContext, call: &FunctionCall) -> Dispatched {
        let Some(tool) = self.tools.get(&call.name) else {
            tracing::warn!(
                event_name = "function.unknown",
                session_id = %context.session_id,
                function = %call.name,
                "model requested an unregistered function"
            );
            return Dispatched {
                name: call.name.clone(),
                response: json!({ "success": false, "error": UNKNOWN_FUNCTION }),
                success: false,
            };
        };

        match tool.execute(context, call.args.clone()).await {
            Ok(response) => {
                let success = response.get("success").and_then(Value::as_bool).unwrap_or(true);
                tracing::info!(
                    event_name = "function.executed",
                    session_id = %context.session_id,
                    owner_id = %context.owner_id,
                    function = %call.name,
                    success,
                    "function executed"
                );
                Dispatched { name: call.name.clone(), response, success }
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "function.failed",
                    session_id = %context.session_id,
                    function = %call.name,
                    error = %format!("{error:#}"),
                    "function execution failed"
                );
                Dispatched {
                    name: call.name.clone(),
                    response: json!({ "success": false, "error": format!("{error:#}") }),
                    success: false,
                }
            }
        }
    }
}
