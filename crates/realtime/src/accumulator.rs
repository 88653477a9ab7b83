//! Buffers streamed function-call fragments until their completion event.

use std::collections::HashMap;

/// Partial state of one streamed function call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallBuffer {
    /// The first non-empty name seen for the call.
    pub name: String,
    /// Argument fragments concatenated in arrival order.
    pub arguments: String,
}

/// A call whose completion has been observed, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCall {
    pub call_id: String,
    pub name: String,
    /// Accumulated argument text, `{}` when nothing was streamed.
    pub arguments: String,
}

/// Call buffers keyed by call id. A buffer lives from its first delta until
/// its completion or `clear`.
#[derive(Debug, Default)]
pub struct CallAccumulator {
    buffers: HashMap<String, CallBuffer>,
}

impl CallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one delta to the buffer for `call_id`, creating it if needed.
    pub fn apply_delta(&mut self, call_id: &str, name: Option<&str>, fragment: &str) {
        let buffer = self.buffers.entry(call_id.to_string()).or_default();
        if buffer.name.is_empty() {
            if let Some(name) = name.filter(|n| !n.is_empty()) {
                buffer.name = name.to_string();
            }
        }
        buffer.arguments.push_str(fragment);
    }

    /// Removes and returns the buffer for `call_id`. Returns `None` when no
    /// delta was ever seen for it.
    pub fn complete(&mut self, call_id: &str) -> Option<CompletedCall> {
        let buffer = self.buffers.remove(call_id)?;
        let arguments = if buffer.arguments.trim().is_empty() {
            "{}".to_string()
        } else {
            buffer.arguments
        };
        Some(CompletedCall {
            call_id: call_id.to_string(),
            name: buffer.name,
            arguments,
        })
    }

    pub fn get(&self, call_id: &str) -> Option<&CallBuffer> {
        self.buffers.get(call_id)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Drops every pending buffer.
    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}
