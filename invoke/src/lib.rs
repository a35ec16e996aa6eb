//! Minimal client for the mystery inference endpoint.
//!
//! The endpoint runs a draft/critique/refine loop server-side and returns
//! every stage of it. This crate only speaks the wire format:
//! - `POST {API_URL}/invoke/` with the actor's ledger and chat history
//! - `GET {API_URL}/health` for a liveness probe

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the endpoint base URL.
pub const API_URL_ENV: &str = "MYSTERY_API_URL";

/// Errors that can occur when calling the endpoint.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API URL not configured - set {API_URL_ENV}")]
    NoApiUrl,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API request failed (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Inference endpoint client.
#[derive(Clone)]
pub struct InvokeClient {
    client: reqwest::Client,
    api_url: String,
    timeout: Duration,
}

impl InvokeClient {
    /// Create a client for the endpoint at `api_url`.
    pub fn new(api_url: impl Into<String>) -> Result<Self, Error> {
        let api_url = api_url.into();
        let api_url = api_url.trim().trim_end_matches('/').to_string();
        if api_url.is_empty() {
            return Err(Error::NoApiUrl);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Create a client from the `MYSTERY_API_URL` environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_url = std::env::var(API_URL_ENV).map_err(|_| Error::NoApiUrl)?;
        Self::new(api_url)
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The normalized base URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask the endpoint for the actor's next line.
    pub async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResponse, Error> {
        tracing::debug!(
            actor = %request.actor.name,
            messages = request.actor.messages.len(),
            "invoking endpoint"
        );

        let response = self
            .client
            .post(format!("{}/invoke/", self.api_url))
            .headers(json_headers())
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        parse_invocation_response(&body)
    }

    /// Probe `GET /health`. Returns `Ok(false)` for a reachable but unhealthy server.
    pub async fn health(&self) -> Result<bool, Error> {
        let response = self
            .client
            .get(format!("{}/health", self.api_url))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let status: HealthStatus = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;
        Ok(status.status == "ok")
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::Network(e.to_string())
        }
    }
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// Parse the body of a successful `/invoke/` call.
pub fn parse_invocation_response(body: &str) -> Result<InvocationResponse, Error> {
    serde_json::from_str(body).map_err(|e| Error::Parse(e.to_string()))
}

// ============================================================================
// Wire types
// ============================================================================

/// The role of a chat message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in an actor's chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The actor as the endpoint sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorPayload {
    pub name: String,
    pub bio: String,
    pub personality: String,
    pub context1: String,
    pub secret: String,
    pub violation: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hurt: Option<String>,
}

/// Body of `POST /invoke/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub global_story: String,
    pub actor: ActorPayload,
    pub session_id: String,
    pub character_file_version: String,
}

/// Body returned by `POST /invoke/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub original_response: String,
    pub critique_response: String,
    pub problems_detected: bool,
    pub final_response: String,
    #[serde(default)]
    pub refined_response: Option<String>,
}

impl InvocationResponse {
    /// A response whose every stage is `text`, as the server reports when
    /// critique is skipped.
    pub fn unrefined(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            original_response: text.clone(),
            critique_response: "NONE!".to_string(),
            problems_detected: false,
            final_response: text,
            refined_response: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HealthStatus {
    status: String,
}
