//! Session Lifecycle Controller
//!
//! Coordinates one voice conversation at a time: opens the transport, pumps
//! peer notifications through the event channel and call accumulator, hands
//! completed calls to the tool dispatcher, and tears everything down on stop
//! or when the channel closes.
//!
//! States move `idle -> connecting -> active -> closed`. A failure before the
//! channel opens returns to `idle`. Each `start` begins a fresh session.

use crate::accumulator::{CallAccumulator, CompletedCall};
use crate::channel::{Event, EventChannel, lock};
use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::protocol::{ClientEvent, ServerEvent, SessionUpdate};
use crate::transport::{PeerEvent, TransportConnector};
use kiosk_core::{ToolDispatcher, ToolResult};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Sent with the tool specs when the channel opens.
    pub instructions: String,
    pub event_log_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for SessionOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            instructions: config.instructions.clone(),
            event_log_capacity: config.event_log_capacity,
        }
    }
}

/// State of one conversation, shared by the controller, the event pump and
/// in-flight tool dispatches.
struct Session {
    id: Uuid,
    state: Arc<watch::Sender<SessionState>>,
    channel: EventChannel,
    calls: Mutex<CallAccumulator>,
    transport: Arc<tokio::sync::Mutex<TransportConnector>>,
    dispatcher: Arc<ToolDispatcher>,
    instructions: String,
    opened: AtomicBool,
    closing: AtomicBool,
    torn_down: tokio::sync::Mutex<bool>,
}

impl Session {
    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    async fn on_open(&self) {
        let state = *self.state.borrow();
        if self.is_closing() || state != SessionState::Connecting {
            return;
        }
        self.opened.store(true, Ordering::SeqCst);
        self.channel.clear_log();
        self.state.send_replace(SessionState::Active);
        info!("Data channel open; session active");

        if self.dispatcher.is_configured() {
            let update = ClientEvent::SessionUpdate {
                session: SessionUpdate {
                    instructions: self.instructions.clone(),
                    tools: self.dispatcher.specs(),
                },
            };
            if self.channel.send_event(&update).await.is_none() {
                warn!("Failed to register tools with the remote agent");
            }
        }
    }

    fn on_frame(self: &Arc<Self>, frame: &str) {
        let Some(event) = self.channel.on_message(frame) else {
            return;
        };
        match ServerEvent::classify(&event.payload) {
            ServerEvent::FunctionCallDelta { delta } => {
                let Some(call_id) = delta.call_id.filter(|id| !id.is_empty()) else {
                    return;
                };
                lock(&self.calls).apply_delta(
                    &call_id,
                    delta.name.as_deref(),
                    delta.arguments.as_deref().unwrap_or_default(),
                );
            }
            ServerEvent::FunctionCallCompleted { call_id } => {
                let Some(call_id) = call_id else {
                    return;
                };
                let completed = lock(&self.calls).complete(&call_id);
                match completed {
                    Some(call) => self.spawn_dispatch(call),
                    None => debug!(%call_id, "Completion without buffered deltas; ignoring"),
                }
            }
            ServerEvent::Other => {}
        }
    }

    fn spawn_dispatch(self: &Arc<Self>, call: CompletedCall) {
        let span = info_span!("tool_call", call_id = %call.call_id, tool = %call.name);
        tokio::spawn(self.clone().dispatch(call).instrument(span));
    }

    /// Runs one completed call and reports its result. Results that arrive
    /// after teardown are discarded.
    async fn dispatch(self: Arc<Self>, call: CompletedCall) {
        let CompletedCall {
            call_id,
            name,
            arguments,
        } = call;
        let dispatcher = self.dispatcher.clone();
        let handler =
            tokio::spawn(async move { dispatcher.execute(&name, &arguments).await }.in_current_span());
        let result = match handler.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Tool handler task failed");
                ToolResult::Error("Tool failed".to_string())
            }
        };

        if self.is_closing() {
            debug!("Session closed before the tool finished; discarding result");
            return;
        }
        let output = ClientEvent::ToolOutput {
            call_id,
            output: result.to_output(),
        };
        if !self.channel.send_pair(&output, &ClientEvent::ResponseCreate).await {
            debug!("Tool result not delivered; channel no longer open");
        }
    }

    /// Closes the transport, clears pending calls and the event log, then
    /// flips to `final_state`. Runs at most once.
    async fn teardown(&self, final_state: SessionState) {
        let mut torn_down = self.torn_down.lock().await;
        if *torn_down {
            return;
        }
        self.closing.store(true, Ordering::SeqCst);

        self.transport.lock().await.stop().await;
        self.channel.detach();
        lock(&self.calls).clear();
        self.channel.clear_log();
        self.state.send_replace(final_state);

        *torn_down = true;
        info!(session_id = %self.id, state = %final_state, "Voice session torn down");
    }
}

/// Delivers peer notifications to the session, one at a time, in order.
async fn pump(session: Arc<Session>, mut events: mpsc::UnboundedReceiver<PeerEvent>) {
    while let Some(event) = events.recv().await {
        if session.is_closing() {
            break;
        }
        match event {
            PeerEvent::ChannelOpen => session.on_open().await,
            PeerEvent::ChannelMessage(frame) => session.on_frame(&frame),
            PeerEvent::RemoteTrack(track) => {
                session.transport.lock().await.attach_remote_track(track);
            }
            PeerEvent::ChannelClosed => {
                info!("Data channel closed");
                break;
            }
        }
    }
    let final_state = if session.opened.load(Ordering::SeqCst) {
        SessionState::Closed
    } else {
        SessionState::Idle
    };
    session.teardown(final_state).await;
}

/// The top-level voice session handle used by the kiosk.
pub struct VoiceSession {
    transport: Arc<tokio::sync::Mutex<TransportConnector>>,
    dispatcher: Arc<ToolDispatcher>,
    options: SessionOptions,
    state: Arc<watch::Sender<SessionState>>,
    current: Option<Arc<Session>>,
    pump: Option<JoinHandle<()>>,
}

impl VoiceSession {
    pub fn new(
        transport: TransportConnector,
        dispatcher: ToolDispatcher,
        options: SessionOptions,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            transport: Arc::new(tokio::sync::Mutex::new(transport)),
            dispatcher: Arc::new(dispatcher),
            options,
            state: Arc::new(state),
            current: None,
            pump: None,
        }
    }

    pub fn status(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.status() == SessionState::Active
    }

    /// A receiver that observes every lifecycle transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The event log of the current session, newest first.
    pub fn events(&self) -> Vec<Event> {
        self.current
            .as_ref()
            .map(|session| session.channel.events())
            .unwrap_or_default()
    }

    /// Number of function calls still waiting for their completion event.
    pub fn pending_calls(&self) -> usize {
        self.current
            .as_ref()
            .map_or(0, |session| lock(&session.calls).len())
    }

    /// Opens a new session. Returns once the transport is established; the
    /// session turns active when the data channel reports open.
    #[instrument(name = "voice_session_start", skip(self))]
    pub async fn start(&mut self) -> Result<(), SessionError> {
        let state = self.status();
        if matches!(state, SessionState::Connecting | SessionState::Active) {
            return Err(SessionError::AlreadyStarted(state));
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }

        let session = Arc::new(Session {
            id: Uuid::new_v4(),
            state: self.state.clone(),
            channel: EventChannel::new(self.options.event_log_capacity),
            calls: Mutex::new(CallAccumulator::new()),
            transport: self.transport.clone(),
            dispatcher: self.dispatcher.clone(),
            instructions: self.options.instructions.clone(),
            opened: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            torn_down: tokio::sync::Mutex::new(false),
        });
        self.current = Some(session.clone());
        self.state.send_replace(SessionState::Connecting);
        info!(session_id = %session.id, "Starting voice session");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let started = self.transport.lock().await.start(events_tx).await;
        match started {
            Ok(channel) => {
                session.channel.attach(channel);
                let span = info_span!("voice_session", session_id = %session.id);
                self.pump = Some(tokio::spawn(pump(session, events_rx).instrument(span)));
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Voice session failed to start");
                session.teardown(SessionState::Idle).await;
                Err(e.into())
            }
        }
    }

    /// Ends the current session. Idempotent. In-flight tool calls are not
    /// cancelled, but their results are discarded.
    pub async fn stop(&mut self) {
        match &self.current {
            Some(session) => session.teardown(SessionState::Closed).await,
            None => self.transport.lock().await.stop().await,
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    /// Sends a raw client event. A no-op unless the session's channel is open.
    pub async fn send(&self, message: Value) -> Option<String> {
        match self.live_session() {
            Some(session) => session.channel.send(message).await,
            None => None,
        }
    }

    /// Sends typed user text and asks the remote agent to respond.
    pub async fn send_text(&self, text: &str) -> bool {
        match self.live_session() {
            Some(session) => session.channel.send_text(text).await,
            None => false,
        }
    }

    fn live_session(&self) -> Option<&Arc<Session>> {
        self.current.as_ref().filter(|session| !session.is_closing())
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(session) = self.current.take() {
            if session.is_closing() {
                return;
            }
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move { session.teardown(SessionState::Closed).await });
            }
        }
    }
}
