//! Kiosk Core
//!
//! Domain pieces the voice session acts on: the order-cart boundary, the
//! function-calling tools advertised to the remote agent, and the dispatcher
//! that executes completed tool calls.

pub mod cart;
pub mod dispatcher;
pub mod tools;

pub use cart::{CartError, InMemoryCart, MenuItem, OrderCart, OrderLine};
pub use dispatcher::ToolDispatcher;
pub use tools::{Tool, ToolError, ToolRegistry, ToolResult, ToolSpec};
