//! Session lifecycle controller.
//!
//! Owns the single room connection of a session and composes the derived
//! state of the watcher, tool-call tracker and summary store into one
//! [`SessionSnapshot`] for the view layer.
//!
//! ```text
//! idle ──start──▶ connecting ──connected──▶ connected
//!                     │                        │
//!                     └──error / disconnect────┴──▶ ended ──start──▶ connecting
//! ```
//!
//! Every call to [`SessionController::start`] that actually starts a
//! connection opens a new *attempt*. Results and room events are only applied
//! while their attempt is still current, so a connect that resolves after the
//! user gave up is closed again instead of resurrecting the session.

use std::fmt;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};
use voicelink_telemetry::{room_event_span, session_start_span};

use crate::codec::{self, AgentMessage};
use crate::config::AppConfig;
use crate::error::{Result, SessionError};
use crate::notify::ChangeNotifier;
use crate::status::{AgentPresence, AgentStatus};
use crate::summary::{CallSummary, SummaryStore};
use crate::token::{HttpTokenSource, TokenMode, TokenRequest, TokenSource};
use crate::tool_call::{ToolCallTracker, ToolInvocation};
use crate::transport::{
    ConnectOptions, ParticipantInfo, RoomEvent, RoomEvents, SharedRoom, Transport,
};
use crate::watcher::ParticipantWatcher;

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection has been attempted.
    #[default]
    Idle,
    /// Token fetch and transport connect are in flight.
    Connecting,
    /// The transport reported an active connection.
    Connected,
    /// Disconnected by the user or the transport, or the connect failed.
    Ended,
}

impl ConnectionState {
    /// Whether a new attempt may begin from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Ended)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Composed read model for rendering.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Connection state.
    pub state: ConnectionState,
    /// Message of the error that ended the last attempt.
    pub error: Option<String>,
    /// Reason reported by the transport when it closed the connection.
    pub disconnect_reason: Option<String>,
    /// Derived agent view.
    pub agent: AgentPresence,
    /// Tool invocation on display.
    pub current_tool: Option<Arc<ToolInvocation>>,
    /// Latest call summary.
    pub summary: Option<Arc<CallSummary>>,
    /// Connected remote participants.
    pub participants: Vec<ParticipantInfo>,
    /// Change revision this snapshot was taken at.
    pub revision: u64,
}

impl SessionSnapshot {
    /// Status for the agent indicator.
    pub fn agent_status(&self) -> AgentStatus {
        self.agent.status()
    }
}

/// Room event pump for one attempt; aborted when dropped.
struct EventSubscription {
    handle: JoinHandle<()>,
}

impl EventSubscription {
    fn spawn(inner: Weak<Inner>, attempt: u64, events: RoomEvents) -> Self {
        Self { handle: tokio::spawn(pump_events(inner, attempt, events)) }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Default)]
struct Lifecycle {
    state: ConnectionState,
    attempt: u64,
    error: Option<String>,
    disconnect_reason: Option<String>,
    room: Option<SharedRoom>,
    subscription: Option<EventSubscription>,
}

impl Lifecycle {
    fn is_live(&self, attempt: u64, state: ConnectionState) -> bool {
        self.attempt == attempt && self.state == state
    }
}

// Lock order: `lifecycle` before `watcher` and `summary`.
struct Inner {
    config: AppConfig,
    transport: Arc<dyn Transport>,
    tokens: Option<Arc<dyn TokenSource>>,
    lifecycle: Mutex<Lifecycle>,
    watcher: Mutex<ParticipantWatcher>,
    summary: Mutex<SummaryStore>,
    tools: ToolCallTracker,
    notifier: ChangeNotifier,
}

impl Inner {
    /// Apply one room event. Returns `false` once the pump should stop.
    fn dispatch(&self, attempt: u64, event: RoomEvent) -> bool {
        let _span = room_event_span(event.kind()).entered();
        let lifecycle = self.lifecycle.lock();
        if !lifecycle.is_live(attempt, ConnectionState::Connected) {
            debug!(session.attempt = attempt, "Dropping event from a stale connection");
            return false;
        }

        match event {
            RoomEvent::DataReceived { payload, topic, participant } => {
                debug!(
                    bytes = payload.len(),
                    topic = topic.as_deref().unwrap_or(""),
                    participant.identity = participant.as_ref().map(|p| p.identity.as_str()).unwrap_or(""),
                    "Data frame received"
                );
                if let Some(message) = codec::decode(&payload) {
                    self.on_message(message);
                }
            }
            RoomEvent::Disconnected { reason } => {
                info!(session.attempt = attempt, reason = %reason, "Transport disconnected");
                self.end_from_transport(lifecycle, reason);
                return false;
            }
            other => {
                if self.watcher.lock().handle(&other) {
                    self.notifier.notify();
                }
            }
        }
        true
    }

    fn on_message(&self, message: AgentMessage) {
        match message {
            AgentMessage::ToolCall { tool, args } => {
                self.tools.on_tool_call(tool, args);
            }
            AgentMessage::CallSummary(summary) => {
                self.summary.lock().on_call_summary(summary);
                self.notifier.notify();
            }
        }
    }

    fn on_stream_closed(&self, attempt: u64) {
        let lifecycle = self.lifecycle.lock();
        if !lifecycle.is_live(attempt, ConnectionState::Connected) {
            return;
        }
        warn!(session.attempt = attempt, "Room event stream closed");
        self.end_from_transport(lifecycle, "event stream closed".to_string());
    }

    /// Record a failed attempt if it is still the one connecting.
    fn fail_attempt(&self, attempt: u64, error: &SessionError) {
        let mut lifecycle = self.lifecycle.lock();
        if !lifecycle.is_live(attempt, ConnectionState::Connecting) {
            return;
        }
        lifecycle.state = ConnectionState::Ended;
        lifecycle.error = Some(error.to_string());
        drop(lifecycle);
        warn!(session.attempt = attempt, error = %error, "Session start failed");
        self.notifier.notify();
    }

    fn end_from_transport(&self, mut lifecycle: MutexGuard<'_, Lifecycle>, reason: String) {
        lifecycle.state = ConnectionState::Ended;
        lifecycle.disconnect_reason = Some(reason);
        lifecycle.room = None;
        let subscription = lifecycle.subscription.take();
        self.watcher.lock().clear();
        self.tools.clear();
        drop(lifecycle);
        drop(subscription);
        self.notifier.notify();
    }
}

/// Ends its attempt as cancelled if dropped before [`finish`](Self::finish).
struct PendingAttempt<'a> {
    inner: &'a Inner,
    attempt: u64,
    armed: bool,
}

impl<'a> PendingAttempt<'a> {
    fn new(inner: &'a Inner, attempt: u64) -> Self {
        Self { inner, attempt, armed: true }
    }

    fn finish(mut self, result: &Result<()>) {
        self.armed = false;
        if let Err(e) = result {
            self.inner.fail_attempt(self.attempt, e);
        }
    }
}

impl Drop for PendingAttempt<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.fail_attempt(self.attempt, &SessionError::Cancelled);
        }
    }
}

async fn pump_events(inner: Weak<Inner>, attempt: u64, mut events: RoomEvents) {
    while let Some(event) = events.recv().await {
        let Some(session) = inner.upgrade() else {
            return;
        };
        if !session.dispatch(attempt, event) {
            return;
        }
    }
    if let Some(session) = inner.upgrade() {
        session.on_stream_closed(attempt);
    }
}

/// Drives one session from `idle` to `connected` and back to `ended`.
///
/// Cheap to clone; clones share the same session. Must be used from within a
/// Tokio runtime.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use voicelink_session::{AppConfig, SessionController};
///
/// let config = AppConfig::from_env();
/// let session = SessionController::from_config(config, Arc::new(transport))?;
/// let mut changes = session.subscribe();
///
/// session.start().await?;
/// while changes.changed().await.is_ok() {
///     let snapshot = session.snapshot();
///     println!("{} / {}", snapshot.state, snapshot.agent_status().label());
/// }
/// ```
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Create a controller with an explicit token source.
    ///
    /// `None` is a valid but degraded setup: [`start`](Self::start) fails with
    /// [`SessionError::NoTokenSource`] without any network call.
    pub fn new(
        config: AppConfig,
        transport: Arc<dyn Transport>,
        tokens: Option<Arc<dyn TokenSource>>,
    ) -> Self {
        let notifier = ChangeNotifier::new();
        let inner = Inner {
            config,
            transport,
            tokens,
            lifecycle: Mutex::new(Lifecycle::default()),
            watcher: Mutex::new(ParticipantWatcher::new()),
            summary: Mutex::new(SummaryStore::new()),
            tools: ToolCallTracker::new(notifier.clone()),
            notifier,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Create a controller using the HTTP token source selected by `config`.
    pub fn from_config(config: AppConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let tokens: Option<Arc<dyn TokenSource>> = match TokenMode::from_config(&config) {
            Some(mode) => {
                let mut source = HttpTokenSource::new(mode)?;
                if let Some(url) = &config.server_url {
                    source = source.with_fallback_server_url(url.clone());
                }
                Some(Arc::new(source))
            }
            None => {
                warn!("No token source configured; starting a session will fail");
                None
            }
        };
        Ok(Self::new(config, transport, tokens))
    }

    /// Configuration this session was created with.
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle.lock().state
    }

    /// Start a connection attempt.
    ///
    /// No-op while already connecting or connected. Starting from `ended`
    /// resets participant, tool and summary state. Failures move the session
    /// to `ended` with the error message recorded; there is no automatic
    /// retry. Dropping the returned future before it completes ends the
    /// attempt as [`SessionError::Cancelled`], so `start` can be called again.
    pub async fn start(&self) -> Result<()> {
        let attempt = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if !lifecycle.state.can_start() {
                debug!(state = %lifecycle.state, "Start ignored, session already active");
                return Ok(());
            }
            lifecycle.attempt += 1;
            lifecycle.state = ConnectionState::Connecting;
            lifecycle.error = None;
            lifecycle.disconnect_reason = None;
            self.inner.watcher.lock().clear();
            self.inner.summary.lock().reset();
            self.inner.tools.clear();
            lifecycle.attempt
        };
        self.inner.notifier.notify();

        let pending = PendingAttempt::new(&self.inner, attempt);
        let span = session_start_span(attempt, self.inner.config.agent_name.as_deref());
        let result = self.establish(attempt).instrument(span).await;
        pending.finish(&result);
        result
    }

    async fn establish(&self, attempt: u64) -> Result<()> {
        let tokens = self.inner.tokens.clone().ok_or(SessionError::NoTokenSource)?;
        let request = TokenRequest::from_config(&self.inner.config);
        let details = tokens.fetch(&request).await?;

        if !self.inner.lifecycle.lock().is_live(attempt, ConnectionState::Connecting) {
            debug!(session.attempt = attempt, "Token arrived for an abandoned attempt");
            return Ok(());
        }

        let options = ConnectOptions::from_config(&self.inner.config);
        let (room, events) = self
            .inner
            .transport
            .connect(&details.server_url, &details.participant_token, &options)
            .await?;

        let identity = room.local_identity();
        let abandoned = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.is_live(attempt, ConnectionState::Connecting) {
                self.inner.watcher.lock().seed(room.remote_participants());
                lifecycle.state = ConnectionState::Connected;
                lifecycle.subscription =
                    Some(EventSubscription::spawn(Arc::downgrade(&self.inner), attempt, events));
                lifecycle.room = Some(room);
                None
            } else {
                Some(room)
            }
        };

        if let Some(room) = abandoned {
            info!(session.attempt = attempt, "Connection resolved after the attempt ended, closing it");
            if let Err(e) = room.disconnect().await {
                warn!(error = %e, "Failed to close abandoned room");
            }
            return Ok(());
        }

        info!(
            session.attempt = attempt,
            server_url = %details.server_url,
            participant.identity = %identity,
            "Session connected"
        );
        self.inner.notifier.notify();
        Ok(())
    }

    /// End the session.
    ///
    /// Event handling stops before the transport is torn down. The call
    /// summary stays readable until the next [`start`](Self::start).
    pub async fn disconnect(&self) -> Result<()> {
        let room = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state.can_start() {
                return Ok(());
            }
            let previous = lifecycle.state;
            lifecycle.state = ConnectionState::Ended;
            lifecycle.subscription = None;
            self.inner.watcher.lock().clear();
            self.inner.tools.clear();
            info!(session.attempt = lifecycle.attempt, from = %previous, "Session disconnected by user");
            lifecycle.room.take()
        };
        self.inner.notifier.notify();

        match room {
            Some(room) => room.disconnect().await,
            None => Ok(()),
        }
    }

    /// Send a raw frame on the data channel.
    pub async fn send_data(&self, payload: impl Into<Bytes>, topic: Option<String>) -> Result<()> {
        let room = self.inner.lifecycle.lock().room.clone().ok_or(SessionError::NotConnected)?;
        room.send_data(payload.into(), topic).await
    }

    /// Encode and send an agent protocol message.
    pub async fn send_message(&self, message: &AgentMessage) -> Result<()> {
        let payload = codec::encode(message)?;
        self.send_data(payload, None).await
    }

    /// Compose the current read model.
    pub fn snapshot(&self) -> SessionSnapshot {
        let revision = self.inner.notifier.revision();
        let lifecycle = self.inner.lifecycle.lock();
        let (agent, participants) = {
            let watcher = self.inner.watcher.lock();
            (watcher.presence(), watcher.participants())
        };
        SessionSnapshot {
            state: lifecycle.state,
            error: lifecycle.error.clone(),
            disconnect_reason: lifecycle.disconnect_reason.clone(),
            agent,
            current_tool: self.inner.tools.current(),
            summary: self.inner.summary.lock().current(),
            participants,
            revision,
        }
    }

    /// Receiver whose value changes whenever the snapshot may have changed.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.notifier.subscribe()
    }

    /// Current tool invocation.
    pub fn current_tool(&self) -> Option<Arc<ToolInvocation>> {
        self.inner.tools.current()
    }

    /// Latest call summary.
    pub fn summary(&self) -> Option<Arc<CallSummary>> {
        self.inner.summary.lock().current()
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.inner.lifecycle.lock();
        f.debug_struct("SessionController")
            .field("state", &lifecycle.state)
            .field("attempt", &lifecycle.attempt)
            .field("has_token_source", &self.inner.tokens.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_idle_and_ended_can_start() {
        assert!(ConnectionState::Idle.can_start());
        assert!(ConnectionState::Ended.can_start());
        assert!(!ConnectionState::Connecting.can_start());
        assert!(!ConnectionState::Connected.can_start());
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }

    #[test]
    fn stale_attempts_are_not_live() {
        let lifecycle = Lifecycle { state: ConnectionState::Connecting, attempt: 2, ..Default::default() };
        assert!(lifecycle.is_live(2, ConnectionState::Connecting));
        assert!(!lifecycle.is_live(1, ConnectionState::Connecting));
        assert!(!lifecycle.is_live(2, ConnectionState::Connected));
    }
}
