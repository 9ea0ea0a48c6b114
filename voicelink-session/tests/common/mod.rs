//! In-memory transport and token source shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use voicelink_session::{
    AppConfig, ConnectOptions, ConnectionDetails, ParticipantInfo, ParticipantKind,
    ParticipantSnapshot, Result, RoomEvent, RoomEvents, RoomHandle, SessionController,
    SessionError, SharedRoom, TokenRequest, TokenSource, TrackKind, TrackPublication, Transport,
};

/// A room handle that records what the session did with it.
#[derive(Default)]
pub struct FakeRoom {
    participants: Vec<ParticipantSnapshot>,
    sent: Mutex<Vec<(Bytes, Option<String>)>>,
    disconnected: AtomicBool,
}

impl FakeRoom {
    pub fn sent(&self) -> Vec<(Bytes, Option<String>)> {
        self.sent.lock().clone()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoomHandle for FakeRoom {
    fn local_identity(&self) -> String {
        "caller".to_string()
    }

    fn remote_participants(&self) -> Vec<ParticipantSnapshot> {
        self.participants.clone()
    }

    async fn send_data(&self, payload: Bytes, topic: Option<String>) -> Result<()> {
        self.sent.lock().push((payload, topic));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A scripted transport.
///
/// Connects succeed immediately unless the transport is [held](Self::hold)
/// or told to [fail](Self::failing).
#[derive(Default)]
pub struct FakeTransport {
    connects: AtomicUsize,
    credentials: Mutex<Option<(String, String)>>,
    options: Mutex<Option<ConnectOptions>>,
    participants: Mutex<Vec<ParticipantSnapshot>>,
    failure: Mutex<Option<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
    room: Mutex<Option<Arc<FakeRoom>>>,
    events: Mutex<Option<mpsc::UnboundedSender<RoomEvent>>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Participants already in the room when the next connect completes.
    pub fn with_participants(&self, participants: Vec<ParticipantSnapshot>) {
        *self.participants.lock() = participants;
    }

    /// Make the next connects fail with `message`.
    pub fn failing(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    /// Let connects succeed again.
    pub fn recover(&self) {
        self.failure.lock().take();
    }

    /// Block connects until [`release`](Self::release) is called.
    pub fn hold(&self) {
        *self.gate.lock() = Some(Arc::new(Notify::new()));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.notify_one();
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// `(server_url, token)` of the last connect.
    pub fn last_credentials(&self) -> Option<(String, String)> {
        self.credentials.lock().clone()
    }

    pub fn last_options(&self) -> Option<ConnectOptions> {
        self.options.lock().clone()
    }

    pub fn room(&self) -> Option<Arc<FakeRoom>> {
        self.room.lock().clone()
    }

    /// Push an event into the current room's stream.
    pub fn emit(&self, event: RoomEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Drop the sending side of the current event stream.
    pub fn close_stream(&self) {
        self.events.lock().take();
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(
        &self,
        server_url: &str,
        token: &str,
        options: &ConnectOptions,
    ) -> Result<(SharedRoom, RoomEvents)> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.credentials.lock() = Some((server_url.to_string(), token.to_string()));
        *self.options.lock() = Some(options.clone());

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(message) = self.failure.lock().clone() {
            return Err(SessionError::connection(message));
        }

        let room = Arc::new(FakeRoom {
            participants: self.participants.lock().clone(),
            ..Default::default()
        });
        let (tx, rx) = mpsc::unbounded_channel();
        *self.room.lock() = Some(Arc::clone(&room));
        *self.events.lock() = Some(tx);
        Ok((room, rx))
    }
}

/// Token source returning fixed details and counting requests.
pub struct StaticTokens {
    details: ConnectionDetails,
    fetches: AtomicUsize,
    requests: Mutex<Vec<TokenRequest>>,
}

impl StaticTokens {
    pub fn new(server_url: &str, token: &str) -> Arc<Self> {
        Arc::new(Self {
            details: ConnectionDetails {
                server_url: server_url.to_string(),
                participant_token: token.to_string(),
                room_name: None,
                participant_name: None,
            },
            fetches: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TokenRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TokenSource for StaticTokens {
    async fn fetch(&self, request: &TokenRequest) -> Result<ConnectionDetails> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        Ok(self.details.clone())
    }
}

/// A controller wired to `transport` with a static token source.
pub fn session_with(transport: &Arc<FakeTransport>) -> SessionController {
    let tokens: Arc<dyn TokenSource> = StaticTokens::new("wss://fake.livekit.test", "fake-token");
    SessionController::new(AppConfig::default(), transport.clone(), Some(tokens))
}

/// Let spawned tasks (event pump, expiry timers) run.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub fn agent(identity: &str) -> ParticipantInfo {
    ParticipantInfo::new(identity, format!("PA_{identity}"), ParticipantKind::Agent)
}

pub fn human(identity: &str) -> ParticipantInfo {
    ParticipantInfo::new(identity, format!("PA_{identity}"), ParticipantKind::Human)
}

pub fn audio_track(sid: &str) -> Arc<TrackPublication> {
    Arc::new(TrackPublication::new(sid, "voice", TrackKind::Audio))
}

pub fn video_track(sid: &str) -> Arc<TrackPublication> {
    Arc::new(TrackPublication::new(sid, "avatar", TrackKind::Video))
}

/// A data-channel event carrying `json`.
pub fn data(json: &str) -> RoomEvent {
    RoomEvent::DataReceived {
        payload: Bytes::copy_from_slice(json.as_bytes()),
        topic: None,
        participant: Some(agent("agent")),
    }
}
