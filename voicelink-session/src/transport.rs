//! Contract with the external real-time transport.
//!
//! The transport owns media, participants and tracks. This crate only sees
//! the events it pushes and a handle for the few outbound calls it needs.
//! Implementations exist for LiveKit (feature `livekit`) and as in-memory
//! fakes in the test suite.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::error::Result;

/// Classification of a participant, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipantKind {
    /// A person (browser, phone, SIP caller).
    Human,
    /// An automated agent.
    Agent,
    /// Anything the transport could not classify.
    Unknown,
}

/// Read-only projection of a participant.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantInfo {
    /// Identity, unique within the room.
    pub identity: String,
    /// Server-assigned participant id.
    pub sid: String,
    /// Participant classification.
    pub kind: ParticipantKind,
    /// Participant attributes (agent state lives here).
    pub attributes: HashMap<String, String>,
}

impl ParticipantInfo {
    /// Create a participant with no attributes.
    pub fn new(identity: impl Into<String>, sid: impl Into<String>, kind: ParticipantKind) -> Self {
        Self { identity: identity.into(), sid: sid.into(), kind, attributes: HashMap::new() }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether the transport classified this participant as an agent.
    pub fn is_agent(&self) -> bool {
        self.kind == ParticipantKind::Agent
    }
}

/// Media kind of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    /// Audio track.
    Audio,
    /// Video track.
    Video,
}

/// Where a track's media comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackSource {
    /// Unspecified.
    #[default]
    Unknown,
    /// Camera.
    Camera,
    /// Microphone.
    Microphone,
    /// Screen capture.
    ScreenShare,
    /// Audio accompanying a screen capture.
    ScreenShareAudio,
}

/// A track published by a participant.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPublication {
    /// Track id.
    pub sid: String,
    /// Track name chosen by the publisher.
    pub name: String,
    /// Media kind.
    pub kind: TrackKind,
    /// Media source.
    pub source: TrackSource,
    /// Publisher has muted the track.
    pub muted: bool,
    /// This client is subscribed to the track.
    pub subscribed: bool,
}

impl TrackPublication {
    /// Create an unmuted, unsubscribed publication.
    pub fn new(sid: impl Into<String>, name: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            sid: sid.into(),
            name: name.into(),
            kind,
            source: TrackSource::Unknown,
            muted: false,
            subscribed: false,
        }
    }

    /// Set the media source.
    pub fn with_source(mut self, source: TrackSource) -> Self {
        self.source = source;
        self
    }
}

/// A remote participant and the tracks it has published, as seen on connect.
#[derive(Debug, Clone)]
pub struct ParticipantSnapshot {
    /// Participant.
    pub info: ParticipantInfo,
    /// Published tracks.
    pub tracks: Vec<Arc<TrackPublication>>,
}

/// Events pushed by the transport.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// A remote participant joined.
    ParticipantConnected(ParticipantInfo),
    /// A remote participant left.
    ParticipantDisconnected(ParticipantInfo),
    /// A participant's attributes changed; `changed` holds only the new values.
    ParticipantAttributesChanged {
        /// Participant after the change.
        participant: ParticipantInfo,
        /// Changed keys and their new values.
        changed: HashMap<String, String>,
    },
    /// A remote participant published a track.
    TrackPublished {
        /// Publisher.
        participant: ParticipantInfo,
        /// Publication.
        publication: Arc<TrackPublication>,
    },
    /// A remote participant unpublished a track.
    TrackUnpublished {
        /// Publisher.
        participant: ParticipantInfo,
        /// Publication.
        publication: Arc<TrackPublication>,
    },
    /// A published track was muted.
    TrackMuted {
        /// Publisher.
        participant: ParticipantInfo,
        /// Publication after the change.
        publication: Arc<TrackPublication>,
    },
    /// A published track was unmuted.
    TrackUnmuted {
        /// Publisher.
        participant: ParticipantInfo,
        /// Publication after the change.
        publication: Arc<TrackPublication>,
    },
    /// A frame arrived on the data channel.
    DataReceived {
        /// Raw frame bytes.
        payload: Bytes,
        /// Optional application topic.
        topic: Option<String>,
        /// Sender, when known.
        participant: Option<ParticipantInfo>,
    },
    /// The transport closed the connection.
    Disconnected {
        /// Transport-specific reason.
        reason: String,
    },
}

impl RoomEvent {
    /// Short name for logs and spans.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ParticipantConnected(_) => "participant_connected",
            Self::ParticipantDisconnected(_) => "participant_disconnected",
            Self::ParticipantAttributesChanged { .. } => "participant_attributes_changed",
            Self::TrackPublished { .. } => "track_published",
            Self::TrackUnpublished { .. } => "track_unpublished",
            Self::TrackMuted { .. } => "track_muted",
            Self::TrackUnmuted { .. } => "track_unmuted",
            Self::DataReceived { .. } => "data_received",
            Self::Disconnected { .. } => "disconnected",
        }
    }
}

/// Receiving end of a room's event stream.
pub type RoomEvents = mpsc::UnboundedReceiver<RoomEvent>;

/// Options passed to [`Transport::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Enable the microphone on join.
    pub audio: bool,
    /// Enable the camera on join.
    pub video: bool,
    /// Agent to dispatch into the room, if any.
    pub agent_name: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self { audio: true, video: false, agent_name: None }
    }
}

impl ConnectOptions {
    /// Options implied by the app configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            audio: true,
            video: config.supports_video_input,
            agent_name: config.agent_name.clone(),
        }
    }
}

/// A connected room.
#[async_trait]
pub trait RoomHandle: Send + Sync {
    /// Identity of the local participant.
    fn local_identity(&self) -> String;

    /// Remote participants present at the time of the call.
    fn remote_participants(&self) -> Vec<ParticipantSnapshot>;

    /// Send a frame on the data channel.
    async fn send_data(&self, payload: Bytes, topic: Option<String>) -> Result<()>;

    /// Leave the room.
    async fn disconnect(&self) -> Result<()>;
}

/// A shared room handle.
pub type SharedRoom = Arc<dyn RoomHandle>;

/// Factory for room connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to `server_url` with `token`. Resolves once the room is connected.
    async fn connect(
        &self,
        server_url: &str,
        token: &str,
        options: &ConnectOptions,
    ) -> Result<(SharedRoom, RoomEvents)>;
}
