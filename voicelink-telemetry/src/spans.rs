//! Span helpers for session operations
//!
//! Pre-configured spans so the lifecycle controller, token fetch and room
//! event pump show up under consistent names.

use tracing::Span;

/// Span for one connection attempt.
///
/// # Example
/// ```
/// use voicelink_telemetry::session_start_span;
/// let span = session_start_span(1, Some("receptionist"));
/// let _enter = span.enter();
/// ```
pub fn session_start_span(attempt: u64, agent_name: Option<&str>) -> Span {
    tracing::info_span!(
        "session.start",
        session.attempt = attempt,
        agent.name = agent_name.unwrap_or(""),
        otel.kind = "client"
    )
}

/// Span for a token request against the sandbox or a custom endpoint.
pub fn token_fetch_span(mode: &str) -> Span {
    tracing::info_span!("token.fetch", token.mode = mode, otel.kind = "client")
}

/// Span for handling a single room event.
pub fn room_event_span(kind: &str) -> Span {
    tracing::debug_span!("room.event", event.kind = kind)
}
