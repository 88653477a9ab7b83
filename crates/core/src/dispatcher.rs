//! Tool Dispatcher
//!
//! Turns a completed function call (name plus raw argument text) into a
//! `ToolResult`. Every failure, from malformed JSON to a failing cart, is
//! folded into `ToolResult::Error` so the caller always has exactly one
//! result to report back to the remote agent.

use crate::cart::OrderCart;
use crate::tools::{ToolError, ToolRegistry, ToolResult, ToolSpec};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct ToolDispatcher {
    registry: ToolRegistry,
    cart: Option<Arc<dyn OrderCart>>,
}

impl ToolDispatcher {
    /// Creates a dispatcher that runs `registry` against `cart`.
    pub fn new(registry: ToolRegistry, cart: Arc<dyn OrderCart>) -> Self {
        Self {
            registry,
            cart: Some(cart),
        }
    }

    /// The kiosk dispatcher: the three cart tools bound to `cart`.
    pub fn for_cart(cart: Arc<dyn OrderCart>) -> Self {
        Self::new(ToolRegistry::cart_tools(), cart)
    }

    /// A dispatcher with no cart attached. Every call fails with
    /// `ToolError::NotConfigured`.
    pub fn unconfigured() -> Self {
        Self {
            registry: ToolRegistry::cart_tools(),
            cart: None,
        }
    }

    /// Whether tool specs should be advertised to the remote agent.
    pub fn is_configured(&self) -> bool {
        self.cart.is_some() && !self.registry.is_empty()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }

    /// Executes the named tool with its raw argument text.
    ///
    /// Empty argument text is treated as `{}`.
    #[instrument(name = "tool_dispatch", skip(self, raw_args))]
    pub async fn execute(&self, name: &str, raw_args: &str) -> ToolResult {
        match self.try_execute(name, raw_args).await {
            Ok(payload) => {
                info!("Tool call succeeded");
                ToolResult::Success(payload)
            }
            Err(e) => {
                warn!(error = %e, "Tool call failed");
                ToolResult::Error(e.to_string())
            }
        }
    }

    async fn try_execute(&self, name: &str, raw_args: &str) -> Result<Value, ToolError> {
        let cart = self.cart.as_deref().ok_or(ToolError::NotConfigured)?;
        let raw_args = if raw_args.trim().is_empty() {
            "{}"
        } else {
            raw_args
        };
        let args: Value = serde_json::from_str(raw_args).map_err(ToolError::InvalidJson)?;
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.call(cart, args).await
    }
}
