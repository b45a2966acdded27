use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::RefreshToken;
use crate::util::urljoin;

pub const DEFAULT_API_URL: &str = "https://api.grndwork.com";

/// Endpoint URLs derived from the API base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub tokens: String,
    pub stations: String,
    pub data: String,
    pub qc: String,
}

impl Endpoints {
    pub fn new(api_url: &str) -> Self {
        Self {
            tokens: urljoin(api_url, "/v1/tokens"),
            stations: urljoin(api_url, "/v1/stations"),
            data: urljoin(api_url, "/v1/data"),
            qc: urljoin(api_url, "/v1/qc"),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

/// Request options handed to the transport on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub request_timeout: Duration,
    /// Extra attempts for a GET answered with a transient status.
    pub request_retries: u32,
    /// Initial wait between retries, doubled after each one.
    pub request_backoff: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            request_retries: 3,
            request_backoff: Duration::from_secs(30),
        }
    }
}

impl ClientOptions {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_request_retries(mut self, retries: u32) -> Self {
        self.request_retries = retries;
        self
    }

    pub fn with_request_backoff(mut self, backoff: Duration) -> Self {
        self.request_backoff = backoff;
        self
    }
}

/// Everything needed to construct a client from the environment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoints: Endpoints,
    pub refresh_token: RefreshToken,
}

/// Loads configuration from the process environment.
///
/// - `GROUNDWORK_API_URL` overrides the API base URL.
/// - `GROUNDWORK_TOKEN_PATH` points at a JSON file `{"subject": ..., "token": ...}`.
/// - Otherwise `GROUNDWORK_SUBJECT` and `GROUNDWORK_TOKEN` must both be set.
pub fn load_config() -> Result<ClientConfig> {
    load_config_with(|name| std::env::var(name).ok())
}

/// Same as [`load_config`], reading variables through `lookup`.
pub fn load_config_with<F>(lookup: F) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let api_url = var("GROUNDWORK_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let refresh_token = match var("GROUNDWORK_TOKEN_PATH") {
        Some(path) => read_token_file(Path::new(&path))?,
        None => match (var("GROUNDWORK_SUBJECT"), var("GROUNDWORK_TOKEN")) {
            (Some(subject), Some(token)) => RefreshToken { subject, token },
            _ => {
                return Err(Error::Configuration(
                    "Could not get refresh token from environment".to_string(),
                ));
            }
        },
    };

    if refresh_token.subject.is_empty() || refresh_token.token.is_empty() {
        return Err(Error::Configuration(
            "Refresh token is missing a subject or token".to_string(),
        ));
    }

    Ok(ClientConfig {
        endpoints: Endpoints::new(&api_url),
        refresh_token,
    })
}

fn read_token_file(path: &Path) -> Result<RefreshToken> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!(
            "failed to read token file {}: {}",
            path.display(),
            e
        ))
    })?;

    serde_json::from_str(&text).map_err(|e| {
        Error::Configuration(format!(
            "failed to parse token file {}: {}",
            path.display(),
            e
        ))
    })
}
