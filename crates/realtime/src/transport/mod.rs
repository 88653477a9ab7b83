//! Transport Connector
//!
//! Owns the peer connection, the local microphone track and the outbound
//! data channel, and performs the offer/answer handshake. The peer stack and
//! media devices are supplied by the embedding application through the traits
//! below. Credential fetch and the SDP exchange are plain HTTP calls (see
//! `signaling`).

pub mod signaling;

pub use signaling::{CredentialSource, HttpCredentialSource, SdpExchange, SignalingClient, StaticCredential};

use crate::config::ClientConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

/// Notifications raised by a peer connection. Delivered in order.
pub enum PeerEvent {
    /// The data channel is open and ready to carry frames.
    ChannelOpen,
    /// One text frame received on the data channel.
    ChannelMessage(String),
    /// The data channel closed.
    ChannelClosed,
    /// A remote media track arrived.
    RemoteTrack(Arc<dyn MediaTrack>),
}

/// An audio track. Frames are opaque to this crate.
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> String;
    /// Stops the track and releases the underlying device or stream.
    fn stop(&self);
}

/// The ordered, bidirectional message channel layered on the peer.
#[async_trait]
pub trait DataChannel: Send + Sync {
    fn label(&self) -> &str;
    fn is_open(&self) -> bool;
    async fn send_text(&self, frame: String) -> Result<(), TransportError>;
    async fn close(&self);
}

/// A single peer connection to the remote agent.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn add_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), TransportError>;
    async fn create_data_channel(&self, label: &str)
    -> Result<Arc<dyn DataChannel>, TransportError>;
    /// Creates an offer, applies it as the local description and returns its SDP.
    async fn create_offer(&self) -> Result<String, TransportError>;
    async fn set_remote_answer(&self, sdp: &str) -> Result<(), TransportError>;
    async fn close(&self);
}

/// Opens peer connections. `events` receives every notification of the new peer.
#[async_trait]
pub trait PeerFactory: Send + Sync {
    async fn create(
        &self,
        config: &RtcConfig,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Arc<dyn PeerConnection>, TransportError>;
}

/// Access to the local audio input.
#[async_trait]
pub trait AudioDevices: Send + Sync {
    /// Fails with `TransportError::MediaAccess` when access is denied.
    async fn open_microphone(&self) -> Result<Arc<dyn MediaTrack>, TransportError>;
}

/// Where the remote agent's voice is played.
pub trait PlaybackSink: Send + Sync {
    fn play(&self, track: Arc<dyn MediaTrack>);
}

/// Network parameters for new peer connections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RtcConfig {
    /// STUN/TURN server URLs.
    pub ice_servers: Vec<String>,
}

pub struct TransportConnector {
    credentials: Arc<dyn CredentialSource>,
    signaling: Arc<dyn SdpExchange>,
    peers: Arc<dyn PeerFactory>,
    devices: Arc<dyn AudioDevices>,
    playback: Option<Arc<dyn PlaybackSink>>,
    rtc: RtcConfig,
    channel_label: String,

    peer: Option<Arc<dyn PeerConnection>>,
    channel: Option<Arc<dyn DataChannel>>,
    local_tracks: Vec<Arc<dyn MediaTrack>>,
    remote_tracks: Vec<Arc<dyn MediaTrack>>,
}

impl TransportConnector {
    pub fn new(
        credentials: Arc<dyn CredentialSource>,
        signaling: Arc<dyn SdpExchange>,
        peers: Arc<dyn PeerFactory>,
        devices: Arc<dyn AudioDevices>,
    ) -> Self {
        Self {
            credentials,
            signaling,
            peers,
            devices,
            playback: None,
            rtc: RtcConfig::default(),
            channel_label: "oai-events".to_string(),
            peer: None,
            channel: None,
            local_tracks: Vec::new(),
            remote_tracks: Vec::new(),
        }
    }

    /// Builds a connector that fetches its token and exchanges descriptions
    /// over HTTP as described by `config`.
    pub fn from_config(
        config: &ClientConfig,
        peers: Arc<dyn PeerFactory>,
        devices: Arc<dyn AudioDevices>,
    ) -> Self {
        let http = reqwest::Client::new();
        Self::new(
            Arc::new(HttpCredentialSource::new(http.clone(), config.token_endpoint.clone())),
            Arc::new(SignalingClient::new(
                http,
                config.calls_url.clone(),
                config.model.clone(),
            )),
            peers,
            devices,
        )
        .with_rtc_config(RtcConfig {
            ice_servers: config.ice_servers.clone(),
        })
    }

    pub fn with_playback(mut self, sink: Arc<dyn PlaybackSink>) -> Self {
        self.playback = Some(sink);
        self
    }

    pub fn with_rtc_config(mut self, rtc: RtcConfig) -> Self {
        self.rtc = rtc;
        self
    }

    pub fn with_channel_label(mut self, label: impl Into<String>) -> Self {
        self.channel_label = label.into();
        self
    }

    pub fn is_started(&self) -> bool {
        self.peer.is_some()
    }

    /// Establishes the transport and returns the data channel.
    ///
    /// Completes once the remote description is applied. On failure, the
    /// resources acquired so far stay held until `stop` is called.
    #[instrument(name = "transport_start", skip_all)]
    pub async fn start(
        &mut self,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Arc<dyn DataChannel>, TransportError> {
        let token = self.credentials.fetch().await?;
        debug!("Access token acquired");

        let peer = self.peers.create(&self.rtc, events).await?;
        self.peer = Some(peer.clone());

        let microphone = self.devices.open_microphone().await?;
        self.local_tracks.push(microphone.clone());
        peer.add_track(microphone).await?;

        let channel = peer.create_data_channel(&self.channel_label).await?;
        self.channel = Some(channel.clone());

        let offer = peer.create_offer().await?;
        let answer = self.signaling.exchange(&token, &offer).await?;
        peer.set_remote_answer(&answer).await?;

        info!(label = %channel.label(), "Transport established");
        Ok(channel)
    }

    /// Records a remote track. The first one is routed to the playback sink.
    pub fn attach_remote_track(&mut self, track: Arc<dyn MediaTrack>) {
        if self.remote_tracks.is_empty() {
            if let Some(sink) = &self.playback {
                info!(track_id = %track.id(), "Routing remote audio to playback");
                sink.play(track.clone());
            }
        }
        self.remote_tracks.push(track);
    }

    /// Closes the data channel, stops every held track and closes the peer.
    /// Safe to call repeatedly and on a connector that never fully started.
    pub async fn stop(&mut self) {
        if let Some(channel) = self.channel.take() {
            if channel.is_open() {
                channel.close().await;
            }
        }
        for track in self.local_tracks.drain(..).chain(self.remote_tracks.drain(..)) {
            track.stop();
        }
        if let Some(peer) = self.peer.take() {
            peer.close().await;
            info!("Transport closed");
        }
    }
}
