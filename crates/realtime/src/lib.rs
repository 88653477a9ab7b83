//! Kiosk Realtime
//!
//! The voice session client: connects to the remote realtime agent over a
//! peer connection, exchanges JSON events on its data channel, reassembles
//! streamed function calls and runs them against the kiosk cart.

pub mod accumulator;
pub mod channel;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use accumulator::{CallAccumulator, CompletedCall};
pub use channel::{Direction, Event, EventChannel};
pub use config::{ClientConfig, ConfigError};
pub use error::{SessionError, TransportError};
pub use protocol::{ClientEvent, ServerEvent};
pub use session::{SessionOptions, SessionState, VoiceSession};
pub use transport::{
    AudioDevices, CredentialSource, DataChannel, MediaTrack, PeerConnection, PeerEvent,
    PeerFactory, PlaybackSink, RtcConfig, SdpExchange, TransportConnector,
};
