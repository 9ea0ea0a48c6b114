//! # voicelink-session
//!
//! Session and room event adapter for voice-agent front-ends.
//!
//! The media transport and the token service are external collaborators.
//! This crate sits between them and the view layer: it drives the connection
//! lifecycle, decodes the agent message protocol carried on the room data
//! channel and derives what the UI shows about the agent.
//!
//! ## Architecture
//!
//! ```text
//!   Transport ──RoomEvent──▶ SessionController ──SessionSnapshot──▶ view
//!                                  │
//!           ┌──────────────────────┼──────────────────────┐
//!           │                      │                      │
//!  ┌────────▼─────────┐   ┌────────▼────────┐   ┌─────────▼───────┐
//!  │ParticipantWatcher│   │      codec      │   │   TokenSource   │
//!  │ (agent presence) │   └───┬─────────┬───┘   │ (sandbox / URL) │
//!  └──────────────────┘       │         │       └─────────────────┘
//!                   ┌─────────▼──┐   ┌──▼───────────┐
//!                   │ToolCall    │   │SummaryStore  │
//!                   │Tracker (3s)│   │(last write)  │
//!                   └────────────┘   └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use voicelink_session::{AppConfig, SessionController};
//! use voicelink_session::livekit::LiveKitTransport;
//!
//! let config = AppConfig::from_env();
//! let session = SessionController::from_config(config, Arc::new(LiveKitTransport::new()))?;
//! session.start().await?;
//!
//! let snapshot = session.snapshot();
//! println!("{}", snapshot.agent_status().label());
//! if let Some(tool) = &snapshot.current_tool {
//!     println!("Agent is using: {}", tool.display_name());
//! }
//! ```

pub mod codec;
pub mod config;
pub mod controller;
pub mod error;
pub mod notify;
pub mod status;
pub mod summary;
pub mod token;
pub mod tool_call;
pub mod transport;
pub mod watcher;

// LiveKit transport
#[cfg(feature = "livekit")]
pub mod livekit;

// Re-exports
pub use codec::{AgentMessage, DecodeError, Frame};
pub use config::{AppConfig, TokenSourceKind};
pub use controller::{ConnectionState, SessionController, SessionSnapshot};
pub use error::{Result, SessionError};
pub use notify::ChangeNotifier;
pub use status::{AgentPresence, AgentState, AgentStatus, StatusTone};
pub use summary::{Appointment, CallSummary, SummaryStore};
pub use token::{ConnectionDetails, HttpTokenSource, TokenMode, TokenRequest, TokenSource};
pub use tool_call::{TOOL_DISPLAY_WINDOW, ToolCallTracker, ToolInvocation};
pub use transport::{
    ConnectOptions, ParticipantInfo, ParticipantKind, ParticipantSnapshot, RoomEvent, RoomEvents,
    RoomHandle, SharedRoom, TrackKind, TrackPublication, TrackSource, Transport,
};
pub use watcher::{AGENT_STATE_ATTRIBUTE, AgentTrack, ParticipantWatcher};
