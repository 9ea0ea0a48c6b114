//! LiveKit transport for `voicelink-session`.
//!
//! [`LiveKitTransport`] connects with the LiveKit Rust SDK and forwards the
//! room events the session consumes. Agent state is carried by the
//! [`lk.agent.state`](crate::watcher::AGENT_STATE_ATTRIBUTE) participant
//! attribute, which LiveKit agents publish.
//!
//! # Feature flag
//!
//! This module requires the **`livekit`** Cargo feature:
//!
//! ```toml
//! [dependencies]
//! voicelink-session = { version = "0.1", features = ["livekit"] }
//! ```
//!
//! Publishing the local microphone or camera is left to the application;
//! [`ConnectOptions`] only controls what is requested from the room.

mod convert;

use async_trait::async_trait;
use bytes::Bytes;
use livekit::prelude::{DataPacket, Room, RoomOptions};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{Result, SessionError};
use crate::transport::{
    ConnectOptions, ParticipantSnapshot, RoomEvents, RoomHandle, SharedRoom, Transport,
};

/// [`Transport`] backed by a LiveKit room.
#[derive(Debug, Clone, Default)]
pub struct LiveKitTransport {
    auto_subscribe: bool,
}

impl LiveKitTransport {
    /// Create a transport that subscribes to remote tracks automatically.
    pub fn new() -> Self {
        Self { auto_subscribe: true }
    }

    /// Do not subscribe to remote tracks automatically.
    pub fn without_auto_subscribe(mut self) -> Self {
        self.auto_subscribe = false;
        self
    }
}

#[async_trait]
impl Transport for LiveKitTransport {
    async fn connect(
        &self,
        server_url: &str,
        token: &str,
        options: &ConnectOptions,
    ) -> Result<(SharedRoom, RoomEvents)> {
        let mut room_options = RoomOptions::default();
        room_options.auto_subscribe = self.auto_subscribe;

        let (room, mut lk_events) = Room::connect(server_url, token, room_options)
            .await
            .map_err(|e| SessionError::connection(e.to_string()))?;

        info!(
            room = %room.name(),
            audio = options.audio,
            video = options.video,
            agent.name = options.agent_name.as_deref().unwrap_or(""),
            "Connected to LiveKit room"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(event) = lk_events.recv().await {
                let Some(event) = convert::room_event(event) else {
                    continue;
                };
                if tx.send(event).is_err() {
                    debug!("Session dropped its event stream");
                    break;
                }
            }
        });

        Ok((Arc::new(LiveKitRoom { room }), rx))
    }
}

/// A connected LiveKit room.
pub struct LiveKitRoom {
    room: Room,
}

#[async_trait]
impl RoomHandle for LiveKitRoom {
    fn local_identity(&self) -> String {
        self.room.local_participant().identity().0
    }

    fn remote_participants(&self) -> Vec<ParticipantSnapshot> {
        self.room.remote_participants().values().map(convert::snapshot).collect()
    }

    async fn send_data(&self, payload: Bytes, topic: Option<String>) -> Result<()> {
        let packet = DataPacket { payload: payload.to_vec(), topic, reliable: true, ..Default::default() };
        self.room
            .local_participant()
            .publish_data(packet)
            .await
            .map_err(|e| SessionError::transport(e.to_string()))
    }

    async fn disconnect(&self) -> Result<()> {
        self.room.close().await.map_err(|e| SessionError::transport(e.to_string()))
    }
}
