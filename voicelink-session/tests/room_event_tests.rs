//! Room event handling through a connected `SessionController`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeTransport, agent, audio_track, data, human, session_with, settle, video_track};
use voicelink_session::{
    AGENT_STATE_ATTRIBUTE, AgentState, AgentStatus, ParticipantSnapshot, RoomEvent, StatusTone,
};

#[tokio::test(start_paused = true)]
async fn newer_tool_call_owns_the_display_window() {
    let transport = FakeTransport::new();
    let session = session_with(&transport);
    session.start().await.unwrap();

    transport.emit(data(r#"{"type":"tool_call","tool":"lookup_patient","args":{"name":"Ada"}}"#));
    settle().await;
    assert_eq!(session.current_tool().unwrap().tool, "lookup_patient");

    tokio::time::advance(Duration::from_millis(1000)).await;
    transport.emit(data(r#"{"type":"tool_call","tool":"book_appointment"}"#));
    settle().await;

    // t = 1.5s
    tokio::time::advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(session.current_tool().unwrap().tool, "book_appointment");

    // t = 3.1s: the first call's window has passed.
    tokio::time::advance(Duration::from_millis(1600)).await;
    settle().await;
    let current = session.current_tool().unwrap();
    assert_eq!(current.tool, "book_appointment");
    assert_eq!(current.display_name(), "book appointment");
    assert!(current.args_pretty().is_none());

    // t = 4.1s: the second call's window has passed.
    tokio::time::advance(Duration::from_millis(1000)).await;
    settle().await;
    assert!(session.current_tool().is_none());
}

#[tokio::test]
async fn summary_is_stable_across_unrelated_events() {
    let transport = FakeTransport::new();
    let session = session_with(&transport);
    session.start().await.unwrap();

    transport.emit(data(
        r#"{"type":"call_summary","data":{"summary":"Booked a cleaning.","appointments":["Tue 10:00"],"preferences":"None","timestamp":"2025-03-01T09:30:00Z"}}"#,
    ));
    settle().await;
    let first = session.summary().unwrap();
    assert!(!first.has_preferences());

    transport.emit(RoomEvent::ParticipantConnected(agent("agent")));
    transport.emit(RoomEvent::TrackPublished { participant: agent("agent"), publication: audio_track("TR_a") });
    transport.emit(RoomEvent::TrackUnpublished { participant: agent("agent"), publication: audio_track("TR_a") });
    transport.emit(data(r#"{"type":"tool_call","tool":"noop"}"#));
    transport.emit(data("not json at all"));
    settle().await;

    assert!(Arc::ptr_eq(&first, &session.summary().unwrap()));
    assert!(Arc::ptr_eq(&first, &session.snapshot().summary.unwrap()));

    transport.emit(data(r#"{"type":"call_summary","data":{"summary":"Rescheduled."}}"#));
    settle().await;
    let second = session.summary().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.summary, "Rescheduled.");
}

#[tokio::test]
async fn agent_presence_and_tracks_follow_participant_lifecycle() {
    let transport = FakeTransport::new();
    let session = session_with(&transport);
    session.start().await.unwrap();

    transport.emit(RoomEvent::ParticipantConnected(human("caller-2")));
    settle().await;
    assert!(!session.snapshot().agent.present);

    transport.emit(RoomEvent::ParticipantConnected(agent("agent")));
    settle().await;
    let snapshot = session.snapshot();
    assert!(snapshot.agent.present);
    assert_eq!(snapshot.agent_status(), AgentStatus::Joining);

    transport.emit(RoomEvent::TrackPublished { participant: agent("agent"), publication: audio_track("TR_a") });
    transport.emit(RoomEvent::TrackPublished { participant: agent("agent"), publication: video_track("TR_v") });
    settle().await;
    let snapshot = session.snapshot();
    assert!(snapshot.agent.audio_track.is_some());
    assert!(snapshot.agent.video_track.is_some());
    assert_eq!(snapshot.agent_status().label(), "Agent: Connected");

    transport.emit(RoomEvent::ParticipantDisconnected(agent("agent")));
    settle().await;
    let snapshot = session.snapshot();
    assert!(!snapshot.agent.present);
    assert!(snapshot.agent.audio_track.is_none());
    assert!(snapshot.agent.video_track.is_none());
    assert_eq!(snapshot.participants.len(), 1);
}

#[tokio::test]
async fn agent_state_attribute_drives_status() {
    let transport = FakeTransport::new();
    let session = session_with(&transport);
    session.start().await.unwrap();

    transport.emit(RoomEvent::ParticipantConnected(agent("agent")));
    transport.emit(RoomEvent::TrackPublished { participant: agent("agent"), publication: audio_track("TR_a") });
    settle().await;
    assert_eq!(session.snapshot().agent_status(), AgentStatus::Ready);

    for (value, state, tone) in [
        ("listening", AgentState::Listening, StatusTone::Active),
        ("idle", AgentState::Idle, StatusTone::Idle),
        ("failed", AgentState::Failed, StatusTone::Error),
    ] {
        let participant = agent("agent").with_attribute(AGENT_STATE_ATTRIBUTE, value);
        let changed = participant.attributes.clone();
        transport.emit(RoomEvent::ParticipantAttributesChanged { participant, changed });
        settle().await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.agent.state, Some(state));
        assert_eq!(snapshot.agent_status().tone(), tone);
    }
}

#[tokio::test]
async fn late_track_events_for_departed_agent_are_ignored() {
    let transport = FakeTransport::new();
    let session = session_with(&transport);
    session.start().await.unwrap();

    transport.emit(RoomEvent::ParticipantConnected(agent("agent")));
    transport.emit(RoomEvent::ParticipantDisconnected(agent("agent")));
    transport.emit(RoomEvent::TrackPublished { participant: agent("agent"), publication: audio_track("TR_a") });
    transport.emit(RoomEvent::TrackUnpublished { participant: agent("agent"), publication: audio_track("TR_a") });
    settle().await;

    let snapshot = session.snapshot();
    assert!(!snapshot.agent.present);
    assert!(snapshot.agent.audio_track.is_none());
    assert!(snapshot.participants.is_empty());
}

#[tokio::test]
async fn malformed_frames_do_not_stop_the_event_stream() {
    let transport = FakeTransport::new();
    let session = session_with(&transport);
    session.start().await.unwrap();

    transport.emit(RoomEvent::DataReceived {
        payload: bytes::Bytes::from_static(&[0xff, 0xfe, 0xfd]),
        topic: None,
        participant: None,
    });
    transport.emit(data(r#"{"type":"transcript","text":"hello"}"#));
    transport.emit(data(r#"{"type":"tool_call"}"#));
    transport.emit(data(r#"{"type":"tool_call","tool":"check_availability","args":{"day":"tue"}}"#));
    settle().await;

    let tool = session.current_tool().unwrap();
    assert_eq!(tool.tool, "check_availability");
    assert_eq!(tool.args_pretty().unwrap(), "{\n  \"day\": \"tue\"\n}");
}

#[tokio::test]
async fn duplicate_join_after_seeding_keeps_unpublish_effective() {
    let transport = FakeTransport::new();
    transport.with_participants(vec![ParticipantSnapshot {
        info: agent("agent"),
        tracks: vec![audio_track("TR_a")],
    }]);
    let session = session_with(&transport);
    session.start().await.unwrap();
    assert!(session.snapshot().agent.audio_track.is_some());

    // The join was already queued when the room was seeded.
    transport.emit(RoomEvent::ParticipantConnected(agent("agent")));
    settle().await;
    assert!(session.snapshot().agent.audio_track.is_some());

    transport.emit(RoomEvent::TrackUnpublished { participant: agent("agent"), publication: audio_track("TR_a") });
    settle().await;

    let snapshot = session.snapshot();
    assert!(snapshot.agent.present);
    assert!(snapshot.agent.audio_track.is_none());
    assert_eq!(snapshot.agent_status(), AgentStatus::Joining);
}
