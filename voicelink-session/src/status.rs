//! Agent state as reported by the room, and the status shown for it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::transport::TrackPublication;

/// Voice-assistant state published by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentState {
    /// Agent process is booting.
    Initializing,
    /// Connected, nothing in progress.
    Idle,
    /// Hearing the caller.
    Listening,
    /// Producing a reply.
    Thinking,
    /// Playing a reply.
    Speaking,
    /// Agent reported a failure.
    Failed,
    /// A state this crate has no name for, kept as sent.
    Other(String),
}

impl AgentState {
    /// Parse the wire value of the agent state attribute.
    ///
    /// Blank values mean the agent has not reported a state. Values outside
    /// the known set are kept as [`AgentState::Other`].
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(match value.to_ascii_lowercase().as_str() {
            "initializing" => Self::Initializing,
            "idle" => Self::Idle,
            "listening" => Self::Listening,
            "thinking" => Self::Thinking,
            "speaking" => Self::Speaking,
            "failed" => Self::Failed,
            _ => Self::Other(value.to_string()),
        })
    }

    /// Wire value.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initializing => "initializing",
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
            Self::Failed => "failed",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for AgentState {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or(Self::Other(value))
    }
}

impl From<AgentState> for String {
    fn from(state: AgentState) -> Self {
        state.as_str().to_string()
    }
}

/// `pre-connect-buffering` becomes `Pre-connect-buffering`.
fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the agent indicator should say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    /// No agent audio yet.
    Joining,
    /// Agent audio and video are both published.
    Connected,
    /// Agent audio is published but no state was reported yet.
    Ready,
    /// Agent audio is published; the agent reports this state.
    Active(AgentState),
}

/// Colour class of the indicator dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    /// Green.
    Active,
    /// Blue.
    Idle,
    /// Red.
    Error,
    /// Yellow.
    Pending,
}

impl AgentStatus {
    /// Derive the status from the agent's published tracks and state.
    pub fn derive(has_audio: bool, has_video: bool, state: Option<AgentState>) -> Self {
        match (has_audio, has_video, state) {
            (false, _, _) => Self::Joining,
            (true, true, _) => Self::Connected,
            (true, false, None) => Self::Ready,
            (true, false, Some(state)) => Self::Active(state),
        }
    }

    /// Human-readable label, e.g. `Agent: Listening`.
    pub fn label(&self) -> String {
        let detail = match self {
            Self::Joining => "Joining...".to_string(),
            Self::Connected => "Connected".to_string(),
            Self::Ready => "Ready".to_string(),
            Self::Active(AgentState::Failed) => "Error".to_string(),
            Self::Active(state) => capitalize(state.as_str()),
        };
        format!("Agent: {detail}")
    }

    /// Indicator colour.
    pub fn tone(&self) -> StatusTone {
        match self {
            Self::Connected => StatusTone::Active,
            Self::Active(AgentState::Listening | AgentState::Thinking | AgentState::Speaking) => {
                StatusTone::Active
            }
            Self::Active(AgentState::Idle) => StatusTone::Idle,
            Self::Active(AgentState::Failed) => StatusTone::Error,
            Self::Joining
            | Self::Ready
            | Self::Active(AgentState::Initializing | AgentState::Other(_)) => StatusTone::Pending,
        }
    }
}

/// Derived view of the agent in the room.
#[derive(Debug, Clone)]
pub struct AgentPresence {
    /// At least one connected participant is an agent.
    pub present: bool,
    /// Reported agent state; `None` until the agent publishes one.
    pub state: Option<AgentState>,
    /// Latest audio track published by an agent.
    pub audio_track: Option<Arc<TrackPublication>>,
    /// Latest video track published by an agent.
    pub video_track: Option<Arc<TrackPublication>>,
}

impl AgentPresence {
    /// Status for the agent indicator.
    pub fn status(&self) -> AgentStatus {
        AgentStatus::derive(
            self.audio_track.is_some(),
            self.video_track.is_some(),
            self.state.clone(),
        )
    }
}
