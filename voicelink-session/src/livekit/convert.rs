//! Mapping from LiveKit SDK types onto the transport seam.

use std::sync::Arc;

use bytes::Bytes;
use livekit::participant::ParticipantKind as LkParticipantKind;
use livekit::prelude::{
    Participant, RemoteParticipant, RemoteTrackPublication, RoomEvent as LkRoomEvent,
    TrackKind as LkTrackKind, TrackPublication as LkTrackPublication,
    TrackSource as LkTrackSource,
};

use crate::transport::{
    ParticipantInfo, ParticipantKind, ParticipantSnapshot, RoomEvent, TrackKind, TrackPublication,
    TrackSource,
};

pub(super) fn participant(p: &RemoteParticipant) -> ParticipantInfo {
    let kind = match p.kind() {
        LkParticipantKind::Agent => ParticipantKind::Agent,
        LkParticipantKind::Standard | LkParticipantKind::Sip => ParticipantKind::Human,
        _ => ParticipantKind::Unknown,
    };
    ParticipantInfo {
        identity: p.identity().0,
        sid: p.sid().to_string(),
        kind,
        attributes: p.attributes(),
    }
}

pub(super) fn publication(p: &RemoteTrackPublication) -> Arc<TrackPublication> {
    let kind = match p.kind() {
        LkTrackKind::Audio => TrackKind::Audio,
        LkTrackKind::Video => TrackKind::Video,
    };
    let source = match p.source() {
        LkTrackSource::Camera => TrackSource::Camera,
        LkTrackSource::Microphone => TrackSource::Microphone,
        LkTrackSource::Screenshare => TrackSource::ScreenShare,
        LkTrackSource::ScreenshareAudio => TrackSource::ScreenShareAudio,
        _ => TrackSource::Unknown,
    };
    Arc::new(TrackPublication {
        sid: p.sid().to_string(),
        name: p.name(),
        kind,
        source,
        muted: p.is_muted(),
        subscribed: p.is_subscribed(),
    })
}

pub(super) fn snapshot(p: &RemoteParticipant) -> ParticipantSnapshot {
    ParticipantSnapshot {
        info: participant(p),
        tracks: p.track_publications().values().map(publication).collect(),
    }
}

fn remote_pair(
    participant: Participant,
    track: LkTrackPublication,
) -> Option<(RemoteParticipant, RemoteTrackPublication)> {
    match (participant, track) {
        (Participant::Remote(p), LkTrackPublication::Remote(t)) => Some((p, t)),
        _ => None,
    }
}

/// Map one SDK event. Events about the local participant and event kinds
/// the session does not consume map to `None`.
pub(super) fn room_event(event: LkRoomEvent) -> Option<RoomEvent> {
    let mapped = match event {
        LkRoomEvent::ParticipantConnected(p) => RoomEvent::ParticipantConnected(participant(&p)),
        LkRoomEvent::ParticipantDisconnected(p) => {
            RoomEvent::ParticipantDisconnected(participant(&p))
        }
        LkRoomEvent::ParticipantAttributesChanged { participant: Participant::Remote(p), changed_attributes } => {
            RoomEvent::ParticipantAttributesChanged {
                participant: participant(&p),
                changed: changed_attributes,
            }
        }
        LkRoomEvent::TrackPublished { publication: t, participant: p } => {
            RoomEvent::TrackPublished { participant: participant(&p), publication: publication(&t) }
        }
        LkRoomEvent::TrackUnpublished { publication: t, participant: p } => {
            RoomEvent::TrackUnpublished { participant: participant(&p), publication: publication(&t) }
        }
        LkRoomEvent::TrackMuted { participant: p, publication: t } => {
            let (p, t) = remote_pair(p, t)?;
            RoomEvent::TrackMuted { participant: participant(&p), publication: publication(&t) }
        }
        LkRoomEvent::TrackUnmuted { participant: p, publication: t } => {
            let (p, t) = remote_pair(p, t)?;
            RoomEvent::TrackUnmuted { participant: participant(&p), publication: publication(&t) }
        }
        LkRoomEvent::DataReceived { payload, topic, participant: p, .. } => RoomEvent::DataReceived {
            payload: Bytes::from(payload.to_vec()),
            topic,
            participant: p.as_ref().map(participant),
        },
        LkRoomEvent::Disconnected { reason } => {
            RoomEvent::Disconnected { reason: format!("{reason:?}") }
        }
        _ => return None,
    };
    Some(mapped)
}
