//! Codec for the agent message protocol carried over the room data channel.
//!
//! Each data frame holds one UTF-8 JSON object discriminated by `type`:
//!
//! ```json
//! { "type": "tool_call", "tool": "book_appointment", "args": { "day": "tue" } }
//! { "type": "call_summary", "data": { "summary": "...", "appointments": [], "preferences": "", "timestamp": "..." } }
//! ```
//!
//! The wire side is open: unknown `type` values decode to
//! [`Frame::Unrecognized`] so agents can add message kinds without breaking
//! older clients. Once validated, messages become the closed
//! [`AgentMessage`] enum.
//!
//! Frames are decoded one at a time in delivery order. Ordering between
//! different senders is whatever the transport delivers; nothing here buffers
//! or reorders.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::summary::CallSummary;

/// `type` tag of tool-call messages.
pub const TOOL_CALL_TYPE: &str = "tool_call";
/// `type` tag of call-summary messages.
pub const CALL_SUMMARY_TYPE: &str = "call_summary";

/// A validated message from the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    /// The agent invoked a capability.
    ToolCall {
        /// Tool name, e.g. `check_availability`.
        tool: String,
        /// Tool arguments; empty when the agent sent none.
        args: Map<String, Value>,
    },
    /// The call has concluded with this recap.
    CallSummary(CallSummary),
}

impl AgentMessage {
    /// Wire `type` tag of this message.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::ToolCall { .. } => TOOL_CALL_TYPE,
            Self::CallSummary(_) => CALL_SUMMARY_TYPE,
        }
    }
}

/// Outcome of decoding a well-formed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A message this client understands.
    Message(AgentMessage),
    /// Valid JSON with a `type` this client does not know.
    Unrecognized(String),
}

/// Why a frame could not be decoded.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Payload bytes are not UTF-8.
    #[error("frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Payload text is not JSON.
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// JSON is not an object with a string `type` field.
    #[error("frame has no string `type` field")]
    MissingType,

    /// A known `type` whose payload does not match its schema.
    #[error("invalid `{message_type}` payload: {source}")]
    InvalidPayload {
        /// The `type` tag of the frame.
        message_type: &'static str,
        /// Underlying schema error.
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct ToolCallWire {
    tool: String,
    #[serde(default)]
    args: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct CallSummaryWire {
    data: CallSummary,
}

/// Decode one data frame, reporting every failure.
pub fn decode_frame(payload: &[u8]) -> Result<Frame, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    let value: Value = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;

    let message_type = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(DecodeError::MissingType)?;

    match message_type.as_str() {
        TOOL_CALL_TYPE => {
            let wire: ToolCallWire = serde_json::from_value(value).map_err(|source| {
                DecodeError::InvalidPayload { message_type: TOOL_CALL_TYPE, source }
            })?;
            Ok(Frame::Message(AgentMessage::ToolCall {
                tool: wire.tool,
                args: wire.args.unwrap_or_default(),
            }))
        }
        CALL_SUMMARY_TYPE => {
            let wire: CallSummaryWire = serde_json::from_value(value).map_err(|source| {
                DecodeError::InvalidPayload { message_type: CALL_SUMMARY_TYPE, source }
            })?;
            Ok(Frame::Message(AgentMessage::CallSummary(wire.data)))
        }
        _ => Ok(Frame::Unrecognized(message_type)),
    }
}

/// Decode one data frame for the event loop.
///
/// Never fails: malformed frames are logged and dropped, unknown message
/// types are dropped quietly. Returns the message only when there is
/// something to act on.
pub fn decode(payload: &[u8]) -> Option<AgentMessage> {
    match decode_frame(payload) {
        Ok(Frame::Message(message)) => {
            debug!(message_type = message.message_type(), "Decoded agent message");
            Some(message)
        }
        Ok(Frame::Unrecognized(message_type)) => {
            debug!(message_type = %message_type, "Ignoring unrecognized agent message");
            None
        }
        Err(e) => {
            warn!(error = %e, bytes = payload.len(), "Failed to parse data frame");
            None
        }
    }
}

/// Encode a message into a data frame.
pub fn encode(message: &AgentMessage) -> serde_json::Result<Vec<u8>> {
    let value = match message {
        AgentMessage::ToolCall { tool, args } => {
            json!({ "type": TOOL_CALL_TYPE, "tool": tool, "args": args })
        }
        AgentMessage::CallSummary(summary) => {
            json!({ "type": CALL_SUMMARY_TYPE, "data": summary })
        }
    };
    serde_json::to_vec(&value)
}
