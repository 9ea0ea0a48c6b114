//! Telemetry initialization

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Default filter directive when `RUST_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize console logging.
///
/// Honours `RUST_LOG`, falling back to `info`. Calling this more than once is
/// harmless; only the first call installs a subscriber.
///
/// # Example
/// ```
/// use voicelink_telemetry::init_telemetry;
/// init_telemetry("voice-console").expect("telemetry");
/// ```
pub fn init_telemetry(service_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut installed = Ok(());

    INIT.call_once(|| {
        installed = tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .try_init();

        tracing::info!(service.name = service_name, "Telemetry initialized");
    });

    installed.map_err(Into::into)
}

/// Initialize newline-delimited JSON logging, for log shippers.
pub fn init_json_telemetry(service_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut installed = Ok(());

    INIT.call_once(|| {
        installed = tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init();

        tracing::info!(service.name = service_name, format = "json", "Telemetry initialized");
    });

    installed.map_err(Into::into)
}
