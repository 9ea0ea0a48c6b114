//! Application configuration read from the environment.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Room requested from the sandbox token server.
pub const DEFAULT_ROOM_NAME: &str = "voice-agent-room";

/// How the session will obtain a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSourceKind {
    /// LiveKit Cloud sandbox token server.
    Sandbox,
    /// Custom token endpoint.
    Endpoint,
    /// Nothing configured; connecting will fail.
    None,
}

/// Branding, feature toggles and token configuration for the front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Company name shown in the session view.
    pub company_name: String,
    /// Welcome page title.
    pub page_title: String,
    /// Welcome page description.
    pub page_description: String,

    /// Show the chat transcript and input.
    pub supports_chat_input: bool,
    /// Offer camera input.
    pub supports_video_input: bool,
    /// Offer screen sharing.
    pub supports_screen_share: bool,
    /// Buffer microphone audio before the agent joins.
    pub is_pre_connect_buffer_enabled: bool,

    /// Logo path or URL.
    pub logo: String,
    /// Accent colour.
    pub accent: String,
    /// Logo for dark mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_dark: Option<String>,
    /// Accent colour for dark mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_dark: Option<String>,
    /// Label of the start button.
    pub start_button_text: String,

    /// Agent to dispatch into the room.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// LiveKit Cloud sandbox id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<String>,
    /// Custom token endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
    /// Server URL used when the token endpoint does not return one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    /// Room requested from the sandbox.
    pub room_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            company_name: "Voice Agent".to_string(),
            page_title: "Voice Agent".to_string(),
            page_description: "A voice agent built with LiveKit".to_string(),
            supports_chat_input: true,
            supports_video_input: true,
            supports_screen_share: true,
            is_pre_connect_buffer_enabled: true,
            logo: "/lk-logo.svg".to_string(),
            accent: "#002cf2".to_string(),
            logo_dark: Some("/lk-logo-dark.svg".to_string()),
            accent_dark: Some("#1fd5f9".to_string()),
            start_button_text: "Start call".to_string(),
            agent_name: None,
            sandbox_id: None,
            token_endpoint: None,
            server_url: None,
            room_name: DEFAULT_ROOM_NAME.to_string(),
        }
    }
}

impl AppConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, starting from the defaults.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(v) = get("COMPANY_NAME") {
            config.company_name = v;
        }
        if let Some(v) = get("PAGE_TITLE") {
            config.page_title = v;
        }
        if let Some(v) = get("PAGE_DESCRIPTION") {
            config.page_description = v;
        }

        read_flag(&get, "SUPPORTS_CHAT_INPUT", &mut config.supports_chat_input);
        read_flag(&get, "SUPPORTS_VIDEO_INPUT", &mut config.supports_video_input);
        read_flag(&get, "SUPPORTS_SCREEN_SHARE", &mut config.supports_screen_share);
        read_flag(&get, "PRE_CONNECT_BUFFER_ENABLED", &mut config.is_pre_connect_buffer_enabled);

        if let Some(v) = get("LOGO") {
            config.logo = v;
        }
        if let Some(v) = get("ACCENT") {
            config.accent = v;
        }
        if let Some(v) = get("LOGO_DARK") {
            config.logo_dark = Some(v);
        }
        if let Some(v) = get("ACCENT_DARK") {
            config.accent_dark = Some(v);
        }
        if let Some(v) = get("START_BUTTON_TEXT") {
            config.start_button_text = v;
        }

        config.agent_name = get("AGENT_NAME");
        config.sandbox_id = get("SANDBOX_ID");
        config.token_endpoint = get("TOKEN_ENDPOINT");
        config.server_url = get("LIVEKIT_URL");
        if let Some(v) = get("ROOM_NAME") {
            config.room_name = v;
        }

        config
    }

    /// Which token source [`SessionController`](crate::SessionController) will use.
    ///
    /// The sandbox wins when both are configured.
    pub fn token_source_kind(&self) -> TokenSourceKind {
        if self.sandbox_id.is_some() {
            TokenSourceKind::Sandbox
        } else if self.token_endpoint.is_some() {
            TokenSourceKind::Endpoint
        } else {
            TokenSourceKind::None
        }
    }

    /// Set the sandbox id.
    pub fn with_sandbox_id(mut self, sandbox_id: impl Into<String>) -> Self {
        self.sandbox_id = Some(sandbox_id.into());
        self
    }

    /// Set the custom token endpoint.
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Set the agent dispatch name.
    pub fn with_agent_name(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    /// Set the fallback server URL.
    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = Some(server_url.into());
        self
    }
}

fn read_flag<G>(get: &G, key: &str, target: &mut bool)
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return;
    };
    match parse_flag(&raw) {
        Some(value) => *target = value,
        None => warn!(key, value = %raw, "Ignoring unparsable boolean, keeping default"),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
