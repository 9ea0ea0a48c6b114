//! Console front-end for a LiveKit voice agent.
//!
//! Reads the same environment as the web front-end (a `.env` file is loaded
//! when present), joins the room and prints the agent status, tool calls and
//! the call summary as they change. Ctrl-C disconnects.
//!
//! ```bash
//! SANDBOX_ID=my-sandbox-abc123 AGENT_NAME=receptionist \
//!     cargo run -p voicelink-session --example console_session --features livekit
//! ```

use std::sync::Arc;

use voicelink_session::livekit::LiveKitTransport;
use voicelink_session::{AppConfig, SessionController, SessionSnapshot};

fn render(snapshot: &SessionSnapshot, company: &str) {
    let status = snapshot.agent_status();
    println!("[{company}] session {} | {}", snapshot.state, status.label());

    if let Some(error) = &snapshot.error {
        println!("  error: {error}");
    }
    if let Some(tool) = &snapshot.current_tool {
        match tool.args_pretty() {
            Some(args) => println!("  using {}:\n{args}", tool.display_name()),
            None => println!("  using {}", tool.display_name()),
        }
    }
    if let Some(summary) = &snapshot.summary {
        println!("  --- call summary ---");
        println!("  {}", summary.summary);
        for appointment in &summary.appointments {
            println!("  * {}", appointment.display());
        }
        if summary.has_preferences() {
            println!("  preferences: {}", summary.preferences.as_deref().unwrap_or_default());
        }
        if let Some(at) = summary.timestamp() {
            println!("  at {}", at.format("%Y-%m-%d %H:%M"));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    voicelink_telemetry::init_telemetry("console-session")
        .map_err(|e| anyhow::anyhow!("failed to initialise telemetry: {e}"))?;

    let config = AppConfig::from_env();
    let company = config.company_name.clone();
    println!("{} | {}", config.page_title, config.page_description);
    println!("Press Ctrl-C to end the call.");

    let session = SessionController::from_config(config, Arc::new(LiveKitTransport::new()))?;
    let mut changes = session.subscribe();

    let runner = session.clone();
    tokio::spawn(async move {
        if let Err(e) = runner.start().await {
            tracing::error!(error = %e, "Failed to start session");
        }
    });

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&session.snapshot(), &company);
            }
            _ = tokio::signal::ctrl_c() => {
                session.disconnect().await?;
                render(&session.snapshot(), &company);
                break;
            }
        }
    }

    Ok(())
}
