//! Token acquisition from the LiveKit Cloud sandbox or a custom endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info};
use voicelink_telemetry::token_fetch_span;

use crate::config::{AppConfig, TokenSourceKind};
use crate::error::{Result, SessionError};

/// Base URL of the LiveKit Cloud sandbox token server.
pub const SANDBOX_API_BASE: &str = "https://cloud-api.livekit.io";

/// Parameters sent with a token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    /// Room to join.
    pub room_name: String,
    /// Identity to request, if the caller wants a specific one.
    pub participant_name: Option<String>,
    /// Agent to dispatch into the room.
    pub agent_name: Option<String>,
}

impl TokenRequest {
    /// Request implied by the app configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            room_name: config.room_name.clone(),
            participant_name: None,
            agent_name: config.agent_name.clone(),
        }
    }
}

/// What the token service hands back: where to connect and with which token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDetails {
    /// WebSocket URL of the media server.
    pub server_url: String,
    /// Participant access token.
    pub participant_token: String,
    /// Room the token grants access to, when reported.
    pub room_name: Option<String>,
    /// Identity the token was issued for, when reported.
    pub participant_name: Option<String>,
}

/// Issues connection details for a session.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetch a token and server URL.
    async fn fetch(&self, request: &TokenRequest) -> Result<ConnectionDetails>;
}

/// Which HTTP token service to call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenMode {
    /// LiveKit Cloud sandbox token server.
    Sandbox {
        /// Sandbox id sent in the `X-Sandbox-ID` header.
        sandbox_id: String,
        /// Override of [`SANDBOX_API_BASE`].
        base_url: Option<String>,
    },
    /// Custom endpoint answering `GET` with a token.
    Endpoint {
        /// Endpoint URL.
        url: String,
    },
}

impl TokenMode {
    /// Mode selected by the configuration; the sandbox wins when both are set.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        match config.token_source_kind() {
            TokenSourceKind::Sandbox => config
                .sandbox_id
                .clone()
                .map(|sandbox_id| Self::Sandbox { sandbox_id, base_url: None }),
            TokenSourceKind::Endpoint => {
                config.token_endpoint.clone().map(|url| Self::Endpoint { url })
            }
            TokenSourceKind::None => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Sandbox { .. } => "sandbox",
            Self::Endpoint { .. } => "endpoint",
        }
    }
}

#[derive(Serialize)]
struct SandboxRequest<'a> {
    room_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    participant_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    room_config: Option<RoomConfig<'a>>,
}

#[derive(Serialize)]
struct RoomConfig<'a> {
    agents: Vec<AgentDispatch<'a>>,
}

#[derive(Serialize)]
struct AgentDispatch<'a> {
    agent_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SandboxResponse {
    server_url: String,
    participant_token: String,
    #[serde(default)]
    room_name: Option<String>,
    #[serde(default)]
    participant_name: Option<String>,
}

#[derive(Deserialize)]
struct EndpointResponse {
    #[serde(default, rename = "accessToken")]
    access_token: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "participantToken")]
    participant_token: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "serverUrl")]
    server_url: Option<String>,
}

/// [`TokenSource`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTokenSource {
    client: Client,
    mode: TokenMode,
    fallback_server_url: Option<String>,
}

impl HttpTokenSource {
    /// Create a token source for `mode`.
    pub fn new(mode: TokenMode) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| SessionError::config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, mode, fallback_server_url: None })
    }

    /// Create the token source selected by `config`.
    ///
    /// Fails with [`SessionError::NoTokenSource`] when neither a sandbox id
    /// nor a token endpoint is configured.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mode = TokenMode::from_config(config).ok_or(SessionError::NoTokenSource)?;
        let source = Self::new(mode)?;
        Ok(match &config.server_url {
            Some(url) => source.with_fallback_server_url(url.clone()),
            None => source,
        })
    }

    /// Server URL used when an endpoint response carries none.
    pub fn with_fallback_server_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_server_url = Some(url.into());
        self
    }

    /// Point sandbox requests at another base URL.
    pub fn with_sandbox_base_url(mut self, url: impl Into<String>) -> Self {
        if let TokenMode::Sandbox { base_url, .. } = &mut self.mode {
            *base_url = Some(url.into());
        }
        self
    }

    /// Configured mode.
    pub fn mode(&self) -> &TokenMode {
        &self.mode
    }

    async fn fetch_sandbox(
        &self,
        sandbox_id: &str,
        base_url: Option<&str>,
        request: &TokenRequest,
    ) -> Result<ConnectionDetails> {
        let base = base_url.unwrap_or(SANDBOX_API_BASE);
        let url = format!("{}/api/sandbox/connection-details", base.trim_end_matches('/'));
        let body = SandboxRequest {
            room_name: &request.room_name,
            participant_name: request.participant_name.as_deref(),
            room_config: request
                .agent_name
                .as_deref()
                .map(|agent_name| RoomConfig { agents: vec![AgentDispatch { agent_name }] }),
        };

        let response = self
            .client
            .post(&url)
            .header("X-Sandbox-ID", sandbox_id)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::token_response(
                "Sandbox fetch failed",
                status.canonical_reason().unwrap_or(status.as_str()),
            ));
        }

        let details: SandboxResponse = response.json().await?;
        if details.participant_token.is_empty() || details.server_url.is_empty() {
            return Err(SessionError::InvalidTokenResponse(
                "sandbox returned an empty token or server URL".to_string(),
            ));
        }

        Ok(ConnectionDetails {
            server_url: details.server_url,
            participant_token: details.participant_token,
            room_name: details.room_name,
            participant_name: details.participant_name,
        })
    }

    async fn fetch_endpoint(&self, url: &str) -> Result<ConnectionDetails> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::token_response(
                "Failed to fetch token",
                status.canonical_reason().unwrap_or(status.as_str()),
            ));
        }

        let body: EndpointResponse = response.json().await?;
        let participant_token = [body.access_token, body.token, body.participant_token]
            .into_iter()
            .flatten()
            .find(|t| !t.is_empty())
            .ok_or_else(|| {
                SessionError::InvalidTokenResponse("token endpoint returned no token".to_string())
            })?;
        let server_url = [body.url, body.server_url, self.fallback_server_url.clone()]
            .into_iter()
            .flatten()
            .find(|u| !u.is_empty())
            .ok_or_else(|| {
                SessionError::InvalidTokenResponse(
                    "token endpoint returned no server URL and LIVEKIT_URL is not set".to_string(),
                )
            })?;

        Ok(ConnectionDetails { server_url, participant_token, room_name: None, participant_name: None })
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn fetch(&self, request: &TokenRequest) -> Result<ConnectionDetails> {
        let span = token_fetch_span(self.mode.name());
        async {
            debug!(room = %request.room_name, "Requesting connection details");
            let details = match &self.mode {
                TokenMode::Sandbox { sandbox_id, base_url } => {
                    self.fetch_sandbox(sandbox_id, base_url.as_deref(), request).await?
                }
                TokenMode::Endpoint { url } => self.fetch_endpoint(url).await?,
            };
            info!(server_url = %details.server_url, "Connection details received");
            Ok(details)
        }
        .instrument(span)
        .await
    }
}
