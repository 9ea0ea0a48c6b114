//! End-of-call summary state.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::info;

/// Preference text agents send when the caller stated none.
const NO_PREFERENCES: &str = "None";

/// One booked appointment, as text or as a structured record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Appointment {
    /// Free-form description, e.g. `"Dental cleaning, Tue 10:00"`.
    Text(String),
    /// Structured record with agent-defined fields.
    Record(Map<String, Value>),
}

impl Appointment {
    /// Single-line rendering for lists.
    pub fn display(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Record(fields) => {
                if let Some(Value::String(description)) = fields.get("description") {
                    return description.clone();
                }
                fields
                    .iter()
                    .map(|(key, value)| match value {
                        Value::String(s) => format!("{key}: {s}"),
                        other => format!("{key}: {other}"),
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }
    }
}

/// The `data` object of a `call_summary` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    /// Narrative recap of the call.
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    /// Appointments booked during the call.
    #[serde(default, deserialize_with = "null_as_default")]
    pub appointments: Vec<Appointment>,
    /// Caller preferences captured by the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<String>,
    /// ISO-8601 time the summary was produced.
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
}

/// Agents send `null` for fields they have nothing for.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl CallSummary {
    /// Parsed [`timestamp`](Self::timestamp), if it is valid RFC 3339.
    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.timestamp).ok()
    }

    /// Whether there is preference text worth showing.
    pub fn has_preferences(&self) -> bool {
        self.preferences
            .as_deref()
            .map(str::trim)
            .is_some_and(|p| !p.is_empty() && p != NO_PREFERENCES)
    }
}

/// Holds the latest call summary for the current session.
///
/// A later summary replaces an earlier one; the stored value is shared as an
/// `Arc` so readers see the same allocation until the next replacement.
#[derive(Debug, Default)]
pub struct SummaryStore {
    summary: Option<Arc<CallSummary>>,
    received: u64,
}

impl SummaryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a summary, replacing any previous one.
    pub fn on_call_summary(&mut self, summary: CallSummary) -> Arc<CallSummary> {
        self.received += 1;
        if self.summary.is_some() {
            info!(count = self.received, "Call summary replaced by a newer one");
        } else {
            info!(appointments = summary.appointments.len(), "Call summary received");
        }
        let summary = Arc::new(summary);
        self.summary = Some(Arc::clone(&summary));
        summary
    }

    /// The current summary, if any.
    pub fn current(&self) -> Option<Arc<CallSummary>> {
        self.summary.clone()
    }

    /// Number of summaries received this session.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Forget the summary; only done when a new session starts.
    pub fn reset(&mut self) {
        self.summary = None;
        self.received = 0;
    }
}
