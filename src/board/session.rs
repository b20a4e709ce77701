use std::fmt;
use std::time::Duration;

use reqwest::{RequestBuilder, Url};

use super::models::BoardId;
use crate::config::ClientConfig;
use crate::errors::BoardError;

/// A bearer credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Result<Self, BoardError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(BoardError::Unauthorized("missing credential".into()));
        }
        Ok(Self(token))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Everything a board view needs to talk to the backend.
///
/// Built once at view entry and shared (`Arc<Session>`) by the fetcher, the
/// command dispatcher and the notification channel.
#[derive(Debug, Clone)]
pub struct Session {
    api_base: String,
    ws_base: String,
    credential: Credential,
    http: reqwest::Client,
}

impl Session {
    pub fn new(config: &ClientConfig, credential: Credential) -> Result<Self, BoardError> {
        let api_base = normalize_base(&config.server.api_url, &["http", "https"])?;
        let ws_base = normalize_base(&config.server.ws_url, &["ws", "wss"])?;
        let http = build_http_client(config.server.request_timeout_secs)?;
        Ok(Self {
            api_base,
            ws_base,
            credential,
            http,
        })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Absolute REST URL for `path` (which must start with `/`).
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Push channel URL for a board, with the credential as a query parameter.
    pub fn channel_url(&self, board_id: BoardId) -> Result<Url, BoardError> {
        let mut url = Url::parse(&format!("{}/ws/{}", self.ws_base, board_id))
            .map_err(|e| BoardError::InvalidConfig(format!("bad channel URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("token", self.credential.expose());
        Ok(url)
    }

    pub fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.credential.expose())
    }
}

pub(crate) fn build_http_client(timeout_secs: Option<u64>) -> Result<reqwest::Client, BoardError> {
    let mut builder = reqwest::Client::builder().user_agent("boardsync");
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| BoardError::InvalidConfig(format!("failed to build HTTP client: {}", e)))
}

/// Validate a base URL's scheme and strip trailing slashes.
pub(crate) fn normalize_base(raw: &str, schemes: &[&str]) -> Result<String, BoardError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| BoardError::InvalidConfig(format!("'{}': {}", raw, e)))?;
    if !schemes.contains(&url.scheme()) {
        return Err(BoardError::InvalidConfig(format!(
            "'{}' must use one of: {}",
            raw,
            schemes.join(", ")
        )));
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}
