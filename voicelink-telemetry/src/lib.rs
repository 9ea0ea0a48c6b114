//! # voicelink-telemetry
//!
//! Structured logging for voicelink sessions using `tracing`.
//!
//! ## Usage
//!
//! ```rust
//! use voicelink_telemetry::{init_telemetry, info};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_telemetry("voice-console")?;
//!     info!("ready");
//!     Ok(())
//! }
//! ```

pub mod init;
pub mod spans;

// Re-export tracing macros for convenience
pub use tracing::{Span, debug, error, info, instrument, trace, warn};

pub use init::{init_json_telemetry, init_telemetry};
pub use spans::*;
