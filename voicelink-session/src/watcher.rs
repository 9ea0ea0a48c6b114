//! Participant and track bookkeeping for the agent indicator.
//!
//! The watcher keeps a read-only projection of the remote participants and
//! their tracks, and derives from it whether an agent is present, which
//! audio/video tracks belong to an agent, and the state the agent reports.
//! Events about participants or tracks it does not know are no-ops.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::status::{AgentPresence, AgentState};
use crate::transport::{
    ParticipantInfo, ParticipantSnapshot, RoomEvent, TrackKind, TrackPublication,
};

/// Participant attribute carrying the agent's voice-assistant state.
pub const AGENT_STATE_ATTRIBUTE: &str = "lk.agent.state";

#[derive(Debug, Clone)]
struct ParticipantEntry {
    info: ParticipantInfo,
    tracks: HashMap<String, Arc<TrackPublication>>,
}

impl ParticipantEntry {
    fn agent_state(&self) -> Option<AgentState> {
        self.info.attributes.get(AGENT_STATE_ATTRIBUTE).and_then(|v| AgentState::parse(v))
    }
}

/// A track attributed to an agent participant.
#[derive(Debug, Clone)]
pub struct AgentTrack {
    /// Identity of the publishing agent.
    pub participant: String,
    /// The publication, shared with the transport's view.
    pub publication: Arc<TrackPublication>,
}

/// Derives agent presence from participant and track lifecycle events.
#[derive(Debug, Default)]
pub struct ParticipantWatcher {
    participants: HashMap<String, ParticipantEntry>,
    agent_present: bool,
    agent_audio: Option<AgentTrack>,
    agent_video: Option<AgentTrack>,
}

impl ParticipantWatcher {
    /// Create an empty watcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the participants already in the room when the connection came up.
    pub fn seed(&mut self, participants: Vec<ParticipantSnapshot>) {
        for snapshot in participants {
            let identity = snapshot.info.identity.clone();
            self.handle(&RoomEvent::ParticipantConnected(snapshot.info.clone()));
            for publication in snapshot.tracks {
                self.on_track_published(&identity, publication);
            }
        }
        debug!(count = self.participants.len(), "Seeded remote participants");
    }

    /// Apply one room event. Returns whether derived state changed.
    pub fn handle(&mut self, event: &RoomEvent) -> bool {
        match event {
            RoomEvent::ParticipantConnected(participant) => {
                info!(
                    participant.identity = %participant.identity,
                    participant.kind = ?participant.kind,
                    "Participant connected"
                );
                match self.participants.get_mut(&participant.identity) {
                    // Seeding and the event queue can both report the same join.
                    Some(entry) => {
                        entry.info = participant.clone();
                        if !participant.is_agent() {
                            self.drop_agent_tracks(|track| track.participant == participant.identity);
                        }
                    }
                    None => {
                        self.participants.insert(
                            participant.identity.clone(),
                            ParticipantEntry { info: participant.clone(), tracks: HashMap::new() },
                        );
                    }
                }
                self.recompute_presence();
                true
            }
            RoomEvent::ParticipantDisconnected(participant) => {
                let Some(entry) = self.participants.remove(&participant.identity) else {
                    debug!(participant.identity = %participant.identity, "Disconnect for unknown participant");
                    return false;
                };
                info!(
                    participant.identity = %participant.identity,
                    tracks = entry.tracks.len(),
                    "Participant disconnected"
                );
                self.drop_agent_tracks(|track| track.participant == participant.identity);
                self.recompute_presence();
                true
            }
            RoomEvent::ParticipantAttributesChanged { participant, changed } => {
                let Some(entry) = self.participants.get_mut(&participant.identity) else {
                    debug!(participant.identity = %participant.identity, "Attributes for unknown participant");
                    return false;
                };
                entry.info.attributes.extend(changed.iter().map(|(k, v)| (k.clone(), v.clone())));
                if let Some(state) = changed.get(AGENT_STATE_ATTRIBUTE) {
                    info!(participant.identity = %participant.identity, agent.state = %state, "Agent state changed");
                }
                true
            }
            RoomEvent::TrackPublished { participant, publication } => {
                self.on_track_published(&participant.identity, Arc::clone(publication))
            }
            RoomEvent::TrackUnpublished { participant, publication } => {
                let Some(entry) = self.participants.get_mut(&participant.identity) else {
                    debug!(track.sid = %publication.sid, "Unpublish for unknown participant");
                    return false;
                };
                let known = entry.tracks.remove(&publication.sid).is_some();
                let held = [&self.agent_audio, &self.agent_video]
                    .into_iter()
                    .flatten()
                    .any(|track| track.publication.sid == publication.sid);
                if !known && !held {
                    debug!(track.sid = %publication.sid, "Unpublish for unknown track");
                    return false;
                }
                debug!(
                    participant.identity = %participant.identity,
                    track.sid = %publication.sid,
                    "Track unpublished"
                );
                self.drop_agent_tracks(|track| track.publication.sid == publication.sid);
                true
            }
            RoomEvent::TrackMuted { participant, publication }
            | RoomEvent::TrackUnmuted { participant, publication } => {
                let Some(entry) = self.participants.get_mut(&participant.identity) else {
                    return false;
                };
                let Some(slot) = entry.tracks.get_mut(&publication.sid) else {
                    return false;
                };
                *slot = Arc::clone(publication);
                for track in [&mut self.agent_audio, &mut self.agent_video].into_iter().flatten() {
                    if track.publication.sid == publication.sid {
                        track.publication = Arc::clone(publication);
                    }
                }
                debug!(track.sid = %publication.sid, muted = publication.muted, "Track mute changed");
                true
            }
            RoomEvent::DataReceived { .. } | RoomEvent::Disconnected { .. } => false,
        }
    }

    fn on_track_published(&mut self, identity: &str, publication: Arc<TrackPublication>) -> bool {
        let Some(entry) = self.participants.get_mut(identity) else {
            debug!(participant.identity = %identity, track.sid = %publication.sid, "Track for unknown participant");
            return false;
        };
        entry.tracks.insert(publication.sid.clone(), Arc::clone(&publication));
        debug!(
            participant.identity = %identity,
            track.sid = %publication.sid,
            track.kind = ?publication.kind,
            "Track published"
        );

        if entry.info.is_agent() {
            let track = AgentTrack { participant: identity.to_string(), publication };
            match track.publication.kind {
                TrackKind::Audio => self.agent_audio = Some(track),
                TrackKind::Video => self.agent_video = Some(track),
            }
        }
        true
    }

    fn drop_agent_tracks<F>(&mut self, matches: F)
    where
        F: Fn(&AgentTrack) -> bool,
    {
        for slot in [&mut self.agent_audio, &mut self.agent_video] {
            if slot.as_ref().is_some_and(&matches) {
                *slot = None;
            }
        }
    }

    fn recompute_presence(&mut self) {
        let present = self.participants.values().any(|p| p.info.is_agent());
        if present != self.agent_present {
            info!(agent.present = present, "Agent presence changed");
        }
        debug!(agent.present = present, participants = self.participants.len(), "Presence recomputed");
        self.agent_present = present;
    }

    /// At least one connected participant is an agent.
    pub fn agent_present(&self) -> bool {
        self.agent_present
    }

    /// Latest audio track published by an agent.
    pub fn agent_audio_track(&self) -> Option<&AgentTrack> {
        self.agent_audio.as_ref()
    }

    /// Latest video track published by an agent.
    pub fn agent_video_track(&self) -> Option<&AgentTrack> {
        self.agent_video.as_ref()
    }

    /// State reported by the agent.
    ///
    /// Read from the agent whose audio is tracked, otherwise from the first
    /// agent (by identity) that reports one.
    pub fn agent_state(&self) -> Option<AgentState> {
        if let Some(state) = self
            .agent_audio
            .as_ref()
            .and_then(|track| self.participants.get(&track.participant))
            .and_then(ParticipantEntry::agent_state)
        {
            return Some(state);
        }
        let mut agents: Vec<&ParticipantEntry> =
            self.participants.values().filter(|p| p.info.is_agent()).collect();
        agents.sort_by(|a, b| a.info.identity.cmp(&b.info.identity));
        agents.into_iter().find_map(ParticipantEntry::agent_state)
    }

    /// Derived view of the agent.
    pub fn presence(&self) -> AgentPresence {
        AgentPresence {
            present: self.agent_present,
            state: self.agent_state(),
            audio_track: self.agent_audio.as_ref().map(|t| Arc::clone(&t.publication)),
            video_track: self.agent_video.as_ref().map(|t| Arc::clone(&t.publication)),
        }
    }

    /// Connected remote participants, ordered by identity.
    pub fn participants(&self) -> Vec<ParticipantInfo> {
        let mut participants: Vec<ParticipantInfo> =
            self.participants.values().map(|p| p.info.clone()).collect();
        participants.sort_by(|a, b| a.identity.cmp(&b.identity));
        participants
    }

    /// Tracks currently published by `identity`.
    pub fn tracks_of(&self, identity: &str) -> Vec<Arc<TrackPublication>> {
        self.participants
            .get(identity)
            .map(|p| p.tracks.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget every participant.
    pub fn clear(&mut self) {
        self.participants.clear();
        self.agent_audio = None;
        self.agent_video = None;
        self.agent_present = false;
    }
}
