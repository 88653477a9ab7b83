//! Kiosk API Library Crate
//!
//! The token service the kiosk front-end points its token endpoint at. It
//! holds the server-side API key and mints short-lived realtime client
//! secrets on request. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod shutdown;
pub mod state;
