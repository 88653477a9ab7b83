//! In-process stand-ins for the peer stack, media devices and signaling.

use crate::channel::lock;
use crate::error::TransportError;
use crate::transport::{
    AudioDevices, CredentialSource, DataChannel, MediaTrack, PeerConnection, PeerEvent,
    PeerFactory, PlaybackSink, RtcConfig, SdpExchange,
};
use async_trait::async_trait;
use kiosk_core::{CartError, InMemoryCart, OrderCart};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

/// Polls `condition` until it holds, panicking after two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

pub struct FakeTrack {
    id: String,
    stopped: AtomicBool,
}

impl FakeTrack {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

pub struct FakeDataChannel {
    label: String,
    open: AtomicBool,
    failing: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl FakeDataChannel {
    pub fn new(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            open: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent_json(&self) -> Vec<Value> {
        lock(&self.sent)
            .iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .map(|frame| frame["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl DataChannel for FakeDataChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send_text(&self, frame: String) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Channel("send failed".to_string()));
        }
        if !self.is_open() {
            return Err(TransportError::Channel("channel closed".to_string()));
        }
        lock(&self.sent).push(frame);
        Ok(())
    }

    async fn close(&self) {
        self.set_open(false);
    }
}

/// A peer that records the calls made on it. Tests drive its notifications
/// with `open_channel`, `deliver` and friends.
pub struct FakePeer {
    events: Mutex<Option<mpsc::UnboundedSender<PeerEvent>>>,
    calls: Mutex<Vec<&'static str>>,
    channel: Mutex<Option<Arc<FakeDataChannel>>>,
    closes: AtomicUsize,
    offer: String,
}

impl FakePeer {
    fn new(events: mpsc::UnboundedSender<PeerEvent>, n: usize) -> Self {
        Self {
            events: Mutex::new(Some(events)),
            calls: Mutex::new(Vec::new()),
            channel: Mutex::new(None),
            closes: AtomicUsize::new(0),
            offer: format!("v=0\r\no=- {n} 1 IN IP4 127.0.0.1\r\ns=-\r\n"),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.calls).clone()
    }

    pub fn channel(&self) -> Option<Arc<FakeDataChannel>> {
        lock(&self.channel).clone()
    }

    pub fn offer_sdp(&self) -> String {
        self.offer.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn open_channel(&self) {
        if let Some(channel) = self.channel() {
            channel.set_open(true);
        }
        self.emit(PeerEvent::ChannelOpen);
    }

    pub fn deliver(&self, frame: Value) {
        self.emit(PeerEvent::ChannelMessage(frame.to_string()));
    }

    pub fn deliver_raw(&self, frame: &str) {
        self.emit(PeerEvent::ChannelMessage(frame.to_string()));
    }

    pub fn close_channel(&self) {
        if let Some(channel) = self.channel() {
            channel.set_open(false);
        }
        self.emit(PeerEvent::ChannelClosed);
    }

    pub fn remote_track(&self, track: Arc<FakeTrack>) {
        self.emit(PeerEvent::RemoteTrack(track));
    }

    fn emit(&self, event: PeerEvent) {
        if let Some(events) = lock(&self.events).as_ref() {
            let _ = events.send(event);
        }
    }

    fn record(&self, call: &'static str) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn add_track(&self, _track: Arc<dyn MediaTrack>) -> Result<(), TransportError> {
        self.record("add_track");
        Ok(())
    }

    async fn create_data_channel(
        &self,
        label: &str,
    ) -> Result<Arc<dyn DataChannel>, TransportError> {
        self.record("create_data_channel");
        let channel = FakeDataChannel::new(label);
        *lock(&self.channel) = Some(channel.clone());
        Ok(channel)
    }

    async fn create_offer(&self) -> Result<String, TransportError> {
        self.record("create_offer");
        Ok(self.offer.clone())
    }

    async fn set_remote_answer(&self, sdp: &str) -> Result<(), TransportError> {
        self.record("set_remote_answer");
        if !sdp.starts_with("v=") {
            return Err(TransportError::Peer("unparseable answer".to_string()));
        }
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(channel) = self.channel() {
            channel.set_open(false);
        }
        lock(&self.events).take();
    }
}

#[derive(Clone, Default)]
pub struct FakePeerFactory {
    peers: Arc<Mutex<Vec<Arc<FakePeer>>>>,
    configs: Arc<Mutex<Vec<RtcConfig>>>,
}

impl FakePeerFactory {
    pub fn last_peer(&self) -> Option<Arc<FakePeer>> {
        lock(&self.peers).last().cloned()
    }

    pub fn last_config(&self) -> Option<RtcConfig> {
        lock(&self.configs).last().cloned()
    }
}

#[async_trait]
impl PeerFactory for FakePeerFactory {
    async fn create(
        &self,
        config: &RtcConfig,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Arc<dyn PeerConnection>, TransportError> {
        let mut peers = lock(&self.peers);
        let peer = Arc::new(FakePeer::new(events, peers.len()));
        peers.push(peer.clone());
        lock(&self.configs).push(config.clone());
        Ok(peer)
    }
}

#[derive(Clone)]
pub struct FakeDevices {
    deny: Arc<AtomicBool>,
    microphone: Arc<Mutex<Option<Arc<FakeTrack>>>>,
}

impl FakeDevices {
    pub fn granting() -> Self {
        Self {
            deny: Arc::new(AtomicBool::new(false)),
            microphone: Arc::new(Mutex::new(None)),
        }
    }

    pub fn denying() -> Self {
        let devices = Self::granting();
        devices.set_deny(true);
        devices
    }

    pub fn set_deny(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    /// The most recently opened microphone track.
    pub fn microphone(&self) -> Option<Arc<FakeTrack>> {
        lock(&self.microphone).clone()
    }
}

#[async_trait]
impl AudioDevices for FakeDevices {
    async fn open_microphone(&self) -> Result<Arc<dyn MediaTrack>, TransportError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(TransportError::MediaAccess("permission denied".to_string()));
        }
        let track = FakeTrack::new("microphone");
        *lock(&self.microphone) = Some(track.clone());
        Ok(track)
    }
}

pub struct FakeSignaling {
    failing: bool,
    offers: Mutex<Vec<String>>,
    tokens: Mutex<Vec<String>>,
}

impl FakeSignaling {
    pub fn answering() -> Self {
        Self {
            failing: false,
            offers: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::answering()
        }
    }

    pub fn offers(&self) -> Vec<String> {
        lock(&self.offers).clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        lock(&self.tokens).clone()
    }
}

#[async_trait]
impl SdpExchange for FakeSignaling {
    async fn exchange(
        &self,
        token: &SecretString,
        offer_sdp: &str,
    ) -> Result<String, TransportError> {
        lock(&self.tokens).push(token.expose_secret().to_string());
        lock(&self.offers).push(offer_sdp.to_string());
        if self.failing {
            return Err(TransportError::Signaling("HTTP 500: upstream error".to_string()));
        }
        Ok("v=0\r\no=- 9 1 IN IP4 10.0.0.1\r\ns=-\r\n".to_string())
    }
}

pub struct FailingCredentials;

#[async_trait]
impl CredentialSource for FailingCredentials {
    async fn fetch(&self) -> Result<SecretString, TransportError> {
        Err(TransportError::Credential("connection refused".to_string()))
    }
}

#[derive(Default)]
pub struct FakePlayback {
    played: Mutex<Vec<String>>,
}

impl FakePlayback {
    pub fn played(&self) -> Vec<String> {
        lock(&self.played).clone()
    }
}

impl PlaybackSink for FakePlayback {
    fn play(&self, track: Arc<dyn MediaTrack>) {
        lock(&self.played).push(track.id());
    }
}

/// A cart whose `add_item_by_id` blocks until `release` is called.
pub struct GatedCart {
    inner: Arc<InMemoryCart>,
    gate: Notify,
    entered: AtomicBool,
    finished: AtomicBool,
}

impl GatedCart {
    pub fn new(inner: Arc<InMemoryCart>) -> Self {
        Self {
            inner,
            gate: Notify::new(),
            entered: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &InMemoryCart {
        &self.inner
    }

    pub fn entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl OrderCart for GatedCart {
    async fn add_item_by_id(&self, id: &str) -> Result<(), CartError> {
        self.entered.store(true, Ordering::SeqCst);
        self.gate.notified().await;
        let result = self.inner.add_item_by_id(id).await;
        self.finished.store(true, Ordering::SeqCst);
        result
    }

    async fn remove_item_by_id(&self, id: &str) -> Result<(), CartError> {
        self.inner.remove_item_by_id(id).await
    }

    async fn update_item_quantity(&self, id: &str, quantity: u32) -> Result<(), CartError> {
        self.inner.update_item_quantity(id, quantity).await
    }
}
