//! Event Channel
//!
//! The logical message bus over the data channel. Outbound messages get an
//! `event_id` if they lack one and are sent as single JSON frames. Inbound
//! frames are parsed and recorded. Both directions land in a bounded,
//! newest-first event log.

use crate::protocol::{ClientEvent, ConversationItem};
use crate::transport::DataChannel;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// One message observed on the wire or sent locally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub direction: Direction,
    /// The frame's `type` tag, or `"unknown"`.
    pub kind: String,
    pub event_id: Option<String>,
    /// The frame exactly as sent or received.
    pub payload: Value,
    /// The inbound frame's own `timestamp` when it carries one, otherwise
    /// local observation time. Never transmitted.
    pub observed_at: DateTime<Local>,
}

/// A newest-first log that evicts its oldest entries beyond `capacity`.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<Event>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, event: Event) {
        self.entries.push_front(event);
        self.entries.truncate(self.capacity);
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

pub struct EventChannel {
    channel: Mutex<Option<Arc<dyn DataChannel>>>,
    log: Mutex<EventLog>,
    // Held across multi-frame sends so paired events are never interleaved.
    outbound: tokio::sync::Mutex<()>,
}

impl EventChannel {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            channel: Mutex::new(None),
            log: Mutex::new(EventLog::new(log_capacity)),
            outbound: tokio::sync::Mutex::new(()),
        }
    }

    /// Binds the channel to an underlying data channel.
    pub fn attach(&self, channel: Arc<dyn DataChannel>) {
        *lock(&self.channel) = Some(channel);
    }

    /// Unbinds the data channel. Subsequent sends are dropped.
    pub fn detach(&self) -> Option<Arc<dyn DataChannel>> {
        lock(&self.channel).take()
    }

    pub fn is_open(&self) -> bool {
        self.open_channel().is_some()
    }

    /// Sends one message. Returns its event id, or `None` if the message was
    /// dropped because the channel is not open or the send failed.
    pub async fn send(&self, message: Value) -> Option<String> {
        let _guard = self.outbound.lock().await;
        self.send_locked(message).await
    }

    /// Serializes and sends a typed client event.
    pub async fn send_event(&self, event: &ClientEvent) -> Option<String> {
        let _guard = self.outbound.lock().await;
        self.send_locked(to_message(event)?).await
    }

    /// Sends `first` immediately followed by `second`, with no other outbound
    /// frame in between. `second` is only sent if `first` was.
    pub async fn send_pair(&self, first: &ClientEvent, second: &ClientEvent) -> bool {
        let _guard = self.outbound.lock().await;
        let Some(first) = to_message(first) else {
            return false;
        };
        if self.send_locked(first).await.is_none() {
            return false;
        }
        match to_message(second) {
            Some(second) => self.send_locked(second).await.is_some(),
            None => false,
        }
    }

    /// Sends typed user text followed by a response trigger.
    pub async fn send_text(&self, text: &str) -> bool {
        let create = ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text(text),
        };
        self.send_pair(&create, &ClientEvent::ResponseCreate).await
    }

    /// Parses and records an inbound frame. Malformed frames are dropped.
    pub fn on_message(&self, frame: &str) -> Option<Event> {
        match serde_json::from_str::<Value>(frame) {
            Ok(payload @ Value::Object(_)) => {
                let observed_at = frame_timestamp(&payload).unwrap_or_else(Local::now);
                Some(self.record(Direction::Inbound, payload, observed_at))
            }
            Ok(_) | Err(_) => {
                debug!(len = frame.len(), "Dropping malformed inbound frame");
                None
            }
        }
    }

    /// A newest-first snapshot of the event log.
    pub fn events(&self) -> Vec<Event> {
        lock(&self.log).snapshot()
    }

    pub fn clear_log(&self) {
        lock(&self.log).clear();
    }

    fn open_channel(&self) -> Option<Arc<dyn DataChannel>> {
        lock(&self.channel)
            .as_ref()
            .filter(|channel| channel.is_open())
            .cloned()
    }

    async fn send_locked(&self, message: Value) -> Option<String> {
        let Some(channel) = self.open_channel() else {
            debug!("Data channel not open; dropping outbound event");
            return None;
        };
        let Value::Object(mut fields) = message else {
            warn!("Dropping outbound message that is not a JSON object");
            return None;
        };
        let event_id = assign_event_id(&mut fields);
        let payload = Value::Object(fields);

        if let Err(e) = channel.send_text(payload.to_string()).await {
            warn!(error = %e, %event_id, "Failed to send event");
            return None;
        }
        self.record(Direction::Outbound, payload, Local::now());
        Some(event_id)
    }

    fn record(
        &self,
        direction: Direction,
        payload: Value,
        observed_at: DateTime<Local>,
    ) -> Event {
        let event = Event {
            direction,
            kind: payload
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            event_id: payload
                .get("event_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            payload,
            observed_at,
        };
        lock(&self.log).push(event.clone());
        event
    }
}

/// Reads a frame's `timestamp`: an RFC 3339 string or unix seconds.
fn frame_timestamp(payload: &Value) -> Option<DateTime<Local>> {
    match payload.get("timestamp")? {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|at| at.with_timezone(&Local)),
        Value::Number(seconds) => {
            DateTime::from_timestamp(seconds.as_i64()?, 0).map(|at| at.with_timezone(&Local))
        }
        _ => None,
    }
}

fn to_message(event: &ClientEvent) -> Option<Value> {
    serde_json::to_value(event)
        .map_err(|e| warn!(error = %e, "Failed to serialize client event"))
        .ok()
}

/// Keeps a caller-supplied string id, otherwise assigns a fresh UUID.
fn assign_event_id(fields: &mut Map<String, Value>) -> String {
    if let Some(Value::String(id)) = fields.get("event_id") {
        if !id.is_empty() {
            return id.clone();
        }
    }
    let id = Uuid::new_v4().to_string();
    fields.insert("event_id".to_string(), Value::String(id.clone()));
    id
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
