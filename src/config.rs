//! Configuration types.

use std::net::SocketAddr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Azure AI Agents REST API version.
pub const DEFAULT_API_VERSION: &str = "2025-05-01";

/// How the relay authenticates against the agent service.
#[derive(Debug, Clone)]
pub enum AgentCredential {
    /// `Authorization: Bearer <token>` (Entra ID access token).
    Bearer(SecretString),
    /// `api-key: <key>` header.
    ApiKey(SecretString),
    /// No credential header; e.g. a local proxy that injects auth.
    None,
}

/// Connection settings for the hosted agent service.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Project endpoint, e.g. `https://<resource>.services.ai.azure.com/api/projects/<project>`.
    pub endpoint: String,
    /// Identifier of the agent (assistant) that processes runs.
    pub agent_id: String,
    pub api_version: String,
    pub credential: AgentCredential,
    /// Timeout applied to every individual HTTP request.
    pub request_timeout: Duration,
    /// Delay between run status polls.
    pub poll_interval: Duration,
}

/// Relay service configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub agent: AgentConfig,
    /// Upper bound on all collaborator work for one chat turn.
    pub turn_timeout: Duration,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl RelayConfig {
    /// Build configuration from environment variables.
    ///
    /// Accepts the legacy `azureEndpoint` / `getAgent` names as fallbacks.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let endpoint = get("AZURE_AGENT_ENDPOINT")
            .or_else(|| get("azureEndpoint"))
            .ok_or_else(|| ConfigError::MissingEnvVar("AZURE_AGENT_ENDPOINT".to_string()))?;

        let agent_id = get("AZURE_AGENT_ID")
            .or_else(|| get("getAgent"))
            .ok_or_else(|| ConfigError::MissingEnvVar("AZURE_AGENT_ID".to_string()))?;

        let api_version =
            get("AZURE_AGENT_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        let credential = if let Some(token) = get("AZURE_AGENT_TOKEN") {
            AgentCredential::Bearer(SecretString::from(token))
        } else if let Some(key) = get("AZURE_AGENT_API_KEY") {
            AgentCredential::ApiKey(SecretString::from(key))
        } else {
            AgentCredential::None
        };

        let port: u16 = parse_or(&get, "RELAY_PORT", 3000)?;
        let bind = get("RELAY_BIND").unwrap_or_else(|| "0.0.0.0".to_string());
        let bind_addr: SocketAddr =
            format!("{bind}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                    key: "RELAY_BIND".to_string(),
                    message: e.to_string(),
                })?;

        let request_timeout_secs: u64 = parse_or(&get, "RELAY_REQUEST_TIMEOUT_SECS", 30)?;
        let turn_timeout_secs: u64 = parse_or(&get, "RELAY_TURN_TIMEOUT_SECS", 120)?;
        let poll_interval_ms: u64 = parse_or(&get, "RELAY_POLL_INTERVAL_MS", 500)?;

        let cors_origins: Vec<String> = get("RELAY_CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            bind_addr,
            agent: AgentConfig {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                agent_id,
                api_version,
                credential,
                request_timeout: Duration::from_secs(request_timeout_secs),
                poll_interval: Duration::from_millis(poll_interval_ms),
            },
            turn_timeout: Duration::from_secs(turn_timeout_secs),
            cors_origins,
        })
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(default),
    }
}
