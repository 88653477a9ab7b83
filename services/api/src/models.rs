//! Request and response bodies of the token service.

use serde::{Deserialize, Serialize};

/// A short-lived realtime client secret handed to the kiosk front-end.
///
/// Deserialized from the upstream response, whose other fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSecret {
    pub value: String,
    /// Expiry as unix seconds, when the upstream reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
