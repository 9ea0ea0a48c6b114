//! Property-based tests for data-channel frame decoding.
//!
//! Malformed frames must be dropped without panicking, and unknown message
//! types must decode to "nothing to act on" rather than an error.

use proptest::prelude::*;
use serde_json::json;
use voicelink_session::codec::{self, AgentMessage, Frame};

/// Generator for `type` tags the client does not understand.
fn arb_unknown_type() -> impl Strategy<Value = String> {
    "[a-z_]{1,24}".prop_filter("must not be a known type", |t| {
        t != codec::TOOL_CALL_TYPE && t != codec::CALL_SUMMARY_TYPE
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Arbitrary bytes never panic the decoder.
    #[test]
    fn prop_arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode_frame(&bytes);
        let _ = codec::decode(&bytes);
    }

    /// Anything that is not a JSON object with a string `type` yields no message.
    #[test]
    fn prop_non_json_text_yields_nothing(text in "[^{\\[\"0-9tfn -]{1,64}") {
        prop_assert!(codec::decode(text.as_bytes()).is_none());
        prop_assert!(codec::decode_frame(text.as_bytes()).is_err());
    }

    /// Unknown types are recognised as such, whatever their payload.
    #[test]
    fn prop_unknown_type_is_unrecognized(message_type in arb_unknown_type(), n in any::<i64>()) {
        let frame = serde_json::to_vec(&json!({ "type": message_type, "n": n })).unwrap();
        prop_assert_eq!(codec::decode_frame(&frame).unwrap(), Frame::Unrecognized(message_type));
        prop_assert!(codec::decode(&frame).is_none());
    }

    /// Tool names survive a round trip through the wire format.
    #[test]
    fn prop_tool_name_survives_wire(tool in "[a-z_]{1,32}", day in "[a-z]{0,10}") {
        let mut args = serde_json::Map::new();
        if !day.is_empty() {
            args.insert("day".into(), json!(day));
        }
        let message = AgentMessage::ToolCall { tool, args };
        let bytes = codec::encode(&message).unwrap();
        prop_assert_eq!(codec::decode(&bytes), Some(message));
    }
}

#[test]
fn truncated_frame_is_dropped() {
    let frame = br#"{"type":"tool_call","tool":"check_avail"#;
    assert!(codec::decode(frame).is_none());
}

#[test]
fn summary_with_structured_appointments_decodes() {
    let frame = json!({
        "type": "call_summary",
        "data": {
            "summary": "Booked two visits.",
            "appointments": [
                "Cleaning, Tue 10:00",
                {"description": "X-ray", "date": "2025-04-02"}
            ],
            "preferences": "Prefers mornings",
            "timestamp": "2025-04-01T12:00:00+02:00"
        }
    });
    let bytes = serde_json::to_vec(&frame).unwrap();
    let Some(AgentMessage::CallSummary(summary)) = codec::decode(&bytes) else {
        panic!("expected call summary");
    };
    assert_eq!(summary.appointments.len(), 2);
    assert_eq!(summary.appointments[1].display(), "X-ray");
    assert!(summary.has_preferences());
    assert!(summary.timestamp().is_some());
}
