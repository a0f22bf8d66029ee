//! HTTP client for the streaming avatar API
//!
//! Every call is a single JSON `POST` authenticated with the `X-Api-Key`
//! header. Status handling:
//! - 5xx: generic server error
//! - 400 on `streaming.new`: the vendor's message, meant for the user
//! - other 4xx: API error with whatever message the body carries
//! - anything else: the JSON body, with the payload under `data`

use crate::heygen::types::{
    Endpoint, Envelope, ErrorBody, IceRequest, NewSessionRequest, SessionInfo,
    StartSessionRequest, StopSessionRequest, TaskRequest,
};
use crate::session::peer::{IceCandidateInit, SessionDescription};
use crate::{BridgeError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// Default API base URL
pub const DEFAULT_API_URL: &str = "https://api.heygen.com";

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Operations of the streaming avatar service
#[async_trait]
pub trait AvatarApi: Send + Sync {
    /// Create a session; returns its id, the server offer and ICE servers
    async fn new_session(&self, request: &NewSessionRequest) -> Result<SessionInfo>;

    /// Hand the local answer to the server and start streaming
    async fn start_session(&self, session_id: &str, answer: &SessionDescription)
        -> Result<Value>;

    /// Submit one local ICE candidate
    async fn send_ice_candidate(
        &self,
        session_id: &str,
        candidate: &IceCandidateInit,
    ) -> Result<Value>;

    /// Have the avatar speak `text`
    async fn speak(&self, session_id: &str, text: &str) -> Result<Value>;

    /// Stop the session
    async fn stop_session(&self, session_id: &str) -> Result<Value>;
}

/// API client configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Set the base URL (trailing slashes are ignored)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), endpoint.path())
    }
}

/// `reqwest`-backed [`AvatarApi`]
#[derive(Clone, Debug)]
pub struct HeyGenClient {
    config: ApiConfig,
    client: reqwest::Client,
}

impl HeyGenClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BridgeError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// POST `body` and apply the status policy; returns the decoded JSON body
    async fn post<B: Serialize + ?Sized>(&self, endpoint: Endpoint, body: &B) -> Result<Value> {
        let url = self.config.url(endpoint);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BridgeError::TransportError(format!("{} timed out", endpoint))
                } else {
                    BridgeError::TransportError(format!("{}: {}", endpoint, e))
                }
            })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BridgeError::TransportError(format!("{}: {}", endpoint, e)))?;

        check_status(endpoint, status, &bytes)?;

        serde_json::from_slice(&bytes).map_err(|e| {
            BridgeError::DecodeError(format!("{} returned invalid JSON: {}", endpoint, e))
        })
    }

    async fn post_for_data<B, T>(&self, endpoint: Endpoint, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.post(endpoint, body).await?;
        let envelope: Envelope<T> = serde_json::from_value(body).map_err(|e| {
            BridgeError::DecodeError(format!("{} returned an unexpected payload: {}", endpoint, e))
        })?;
        Ok(envelope.data)
    }
}

/// Map error statuses to [`BridgeError`]s
fn check_status(endpoint: Endpoint, status: StatusCode, body: &[u8]) -> Result<()> {
    if status.is_server_error() {
        error!("Server error from {} ({})", endpoint, status);
        return Err(BridgeError::ServerError {
            endpoint: endpoint.to_string(),
        });
    }

    if status.is_client_error() {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

        if status == StatusCode::BAD_REQUEST && endpoint == Endpoint::NewSession {
            error!("Bad request creating session: {}", message);
            return Err(BridgeError::BadRequest(message));
        }

        error!("{} rejected with {}: {}", endpoint, status, message);
        return Err(BridgeError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    Ok(())
}

#[async_trait]
impl AvatarApi for HeyGenClient {
    async fn new_session(&self, request: &NewSessionRequest) -> Result<SessionInfo> {
        self.post_for_data(Endpoint::NewSession, request)
            .await?
            .ok_or_else(|| BridgeError::DecodeError("streaming.new returned no session".into()))
    }

    async fn start_session(
        &self,
        session_id: &str,
        answer: &SessionDescription,
    ) -> Result<Value> {
        let request = StartSessionRequest {
            session_id,
            sdp: answer,
        };
        Ok(self
            .post_for_data(Endpoint::StartSession, &request)
            .await?
            .unwrap_or(Value::Null))
    }

    async fn send_ice_candidate(
        &self,
        session_id: &str,
        candidate: &IceCandidateInit,
    ) -> Result<Value> {
        let request = IceRequest {
            session_id,
            candidate,
        };
        self.post(Endpoint::Ice, &request).await
    }

    async fn speak(&self, session_id: &str, text: &str) -> Result<Value> {
        let request = TaskRequest { session_id, text };
        Ok(self
            .post_for_data(Endpoint::Task, &request)
            .await?
            .unwrap_or(Value::Null))
    }

    async fn stop_session(&self, session_id: &str) -> Result<Value> {
        let request = StopSessionRequest { session_id };
        Ok(self
            .post_for_data(Endpoint::StopSession, &request)
            .await?
            .unwrap_or(Value::Null))
    }
}

/// Body shape returned by `streaming.task`
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub task_id: Option<String>,
}
