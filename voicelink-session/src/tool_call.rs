//! Transient "agent is using a tool" state.
//!
//! Each `tool_call` message replaces the current invocation and schedules its
//! own expiry. Expiry tasks are keyed by invocation id, so a timer that fires
//! after a newer call arrived leaves the newer one alone.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::notify::ChangeNotifier;

/// How long an invocation stays visible.
pub const TOOL_DISPLAY_WINDOW: Duration = Duration::from_millis(3000);

/// The agent is currently performing `tool` with `args`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Per-tracker sequence number identifying this invocation.
    pub id: u64,
    /// Tool name as sent by the agent.
    pub tool: String,
    /// Tool arguments.
    pub args: Map<String, Value>,
    /// When the message was received.
    pub received_at: Instant,
}

impl ToolInvocation {
    /// Tool name with underscores shown as spaces, e.g. `book appointment`.
    pub fn display_name(&self) -> String {
        self.tool.replace('_', " ")
    }

    /// Arguments as indented JSON, or `None` when there are none.
    pub fn args_pretty(&self) -> Option<String> {
        if self.args.is_empty() {
            return None;
        }
        serde_json::to_string_pretty(&self.args).ok()
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    current: Option<Arc<ToolInvocation>>,
    next_id: u64,
    expiry: Option<JoinHandle<()>>,
}

impl TrackerState {
    fn cancel_expiry(&mut self) {
        if let Some(expiry) = self.expiry.take() {
            expiry.abort();
        }
    }
}

/// Tracks the single current [`ToolInvocation`].
///
/// Must be used from within a Tokio runtime: expiry runs as a spawned task.
#[derive(Debug)]
pub struct ToolCallTracker {
    state: Arc<Mutex<TrackerState>>,
    window: Duration,
    notifier: ChangeNotifier,
}

impl ToolCallTracker {
    /// Create a tracker with the standard display window.
    pub fn new(notifier: ChangeNotifier) -> Self {
        Self::with_window(TOOL_DISPLAY_WINDOW, notifier)
    }

    /// Create a tracker with a custom display window.
    pub fn with_window(window: Duration, notifier: ChangeNotifier) -> Self {
        Self { state: Arc::new(Mutex::new(TrackerState::default())), window, notifier }
    }

    /// Show a new invocation, pre-empting whatever was shown before.
    pub fn on_tool_call(&self, tool: String, args: Map<String, Value>) -> Arc<ToolInvocation> {
        let invocation = {
            let mut state = self.state.lock();
            state.next_id += 1;
            let invocation = Arc::new(ToolInvocation {
                id: state.next_id,
                tool,
                args,
                received_at: Instant::now(),
            });

            if let Some(previous) = state.current.replace(Arc::clone(&invocation)) {
                debug!(tool = %previous.tool, id = previous.id, "Tool invocation superseded");
            }
            state.cancel_expiry();
            state.expiry = Some(tokio::spawn(expire_after(
                Arc::downgrade(&self.state),
                invocation.id,
                self.window,
                self.notifier.clone(),
            )));
            invocation
        };

        info!(tool = %invocation.tool, id = invocation.id, "Agent tool call");
        self.notifier.notify();
        invocation
    }

    /// The invocation currently on display.
    pub fn current(&self) -> Option<Arc<ToolInvocation>> {
        self.state.lock().current.clone()
    }

    /// Drop the current invocation and any pending expiry.
    pub fn clear(&self) {
        let cleared = {
            let mut state = self.state.lock();
            state.cancel_expiry();
            state.current.take().is_some()
        };
        if cleared {
            self.notifier.notify();
        }
    }

    /// Display window used for new invocations.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Drop for ToolCallTracker {
    fn drop(&mut self) {
        self.state.lock().cancel_expiry();
    }
}

async fn expire_after(
    state: Weak<Mutex<TrackerState>>,
    id: u64,
    window: Duration,
    notifier: ChangeNotifier,
) {
    tokio::time::sleep(window).await;

    let Some(state) = state.upgrade() else {
        return;
    };
    let expired = {
        let mut state = state.lock();
        match &state.current {
            Some(current) if current.id == id => {
                state.current = None;
                // This task is the pending expiry; forget its handle without aborting.
                state.expiry = None;
                true
            }
            _ => false,
        }
    };

    if expired {
        debug!(id, "Tool invocation expired");
        notifier.notify();
    } else {
        debug!(id, "Stale tool expiry ignored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn display_helpers() {
        let invocation = ToolInvocation {
            id: 1,
            tool: "book_appointment_slot".into(),
            args: Map::new(),
            received_at: Instant::now(),
        };
        assert_eq!(invocation.display_name(), "book appointment slot");
        assert!(invocation.args_pretty().is_none());

        let invocation = ToolInvocation { args: args(json!({"day": "tue"})), ..invocation };
        assert_eq!(invocation.args_pretty().unwrap(), "{\n  \"day\": \"tue\"\n}");
    }

    #[tokio::test(start_paused = true)]
    async fn expires_after_window() {
        let tracker = ToolCallTracker::new(ChangeNotifier::new());
        tracker.on_tool_call("lookup".into(), Map::new());
        assert!(tracker.current().is_some());

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert!(tracker.current().is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(tracker.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_expiry() {
        let notifier = ChangeNotifier::new();
        let tracker = ToolCallTracker::new(notifier.clone());
        tracker.on_tool_call("lookup".into(), Map::new());
        tracker.clear();
        assert!(tracker.current().is_none());
        let revision = notifier.revision();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(notifier.revision(), revision);
    }
}
