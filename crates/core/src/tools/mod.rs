//! Cart Tools
//!
//! Function-calling tools the remote agent can invoke. Each tool pairs its
//! advertised JSON-Schema spec with a handler that validates the arguments
//! and drives the `OrderCart`. Tools are looked up by name in a
//! `ToolRegistry`, so adding a tool never touches the dispatcher.

mod add_item;
mod remove_item;
mod update_item_quantity;

pub use add_item::AddItem;
pub use remove_item::RemoveItem;
pub use update_item_quantity::UpdateItemQuantity;

use crate::cart::{CartError, OrderCart};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

/// Errors raised while resolving, validating or running a tool call.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool handlers are not configured")]
    NotConfigured,
    #[error("Invalid arguments: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("Invalid arguments: {0}")]
    Validation(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Cart(#[from] CartError),
}

/// A function declaration advertised to the remote agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            kind: "function".to_string(),
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Outcome of a single tool dispatch. Always reported back as one event.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    /// The action-specific payload, e.g. `{"action":"add_item","id":"..."}`.
    Success(Value),
    /// A human-readable failure message.
    Error(String),
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    /// The wire body: the payload flagged with `"ok": true`, or
    /// `{"ok": false, "error": ...}`.
    pub fn to_json(&self) -> Value {
        match self {
            ToolResult::Success(payload) => {
                let mut body = Map::new();
                body.insert("ok".to_string(), Value::Bool(true));
                match payload {
                    Value::Object(fields) => body.extend(fields.clone()),
                    Value::Null => {}
                    other => {
                        body.insert("result".to_string(), other.clone());
                    }
                }
                Value::Object(body)
            }
            ToolResult::Error(message) => json!({ "ok": false, "error": message }),
        }
    }

    /// The JSON string carried in the `output` field of a tool output event.
    pub fn to_output(&self) -> String {
        self.to_json().to_string()
    }
}

/// A named capability the remote agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The declaration sent to the remote agent when the session opens.
    fn spec(&self) -> ToolSpec;

    /// Validates `args` against the tool's shape and applies it to `cart`.
    async fn call(&self, cart: &dyn OrderCart, args: Value) -> Result<Value, ToolError>;
}

/// Tools keyed by name, iterated in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used by the kiosk: `add_item`, `remove_item` and
    /// `update_item_quantity`.
    pub fn cart_tools() -> Self {
        let mut registry = Self::new();
        registry
            .register(AddItem)
            .register(RemoveItem)
            .register(UpdateItemQuantity);
        registry
    }

    /// Registers `tool` under its spec name, replacing any tool of the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) -> &mut Self {
        let name = tool.spec().name;
        if self.tools.insert(name.clone(), Arc::new(tool)).is_none() {
            self.order.push(name);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.spec())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Deserializes tool arguments into their typed shape.
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::Validation(e.to_string()))
}

pub(crate) fn non_empty_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let id = String::deserialize(deserializer)?;
    if id.trim().is_empty() {
        return Err(serde::de::Error::custom("id is required"));
    }
    Ok(id)
}

pub(crate) fn non_negative_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    // Integral floats such as `2.0` count as integers.
    let quantity = value
        .as_f64()
        .filter(|quantity| *quantity >= 0.0 && quantity.fract() == 0.0)
        .ok_or_else(|| {
            serde::de::Error::custom(format!(
                "quantity must be a non-negative integer, got {value}"
            ))
        })?;
    if quantity > f64::from(u32::MAX) {
        return Err(serde::de::Error::custom(format!(
            "quantity is too large, got {value}"
        )));
    }
    Ok(quantity as u32)
}
