//! Broker addressing, wire types and the shared HTTP client.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::context::ClientContext;
use crate::error::{ClientError, Result};
use crate::request::SessionRequest;

/// Where the broker listens. Supplied by configuration; only used to build
/// request and stream addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    host: String,
    port: u16,
}

impl BrokerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.authority(), path)
    }

    /// The broker serves session streams at `/ws/<secret>`.
    pub fn fallback_stream_url(&self, secret: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("ws://{}/ws", self.authority()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidResponse("broker url cannot carry a path".into()))?
            .push(secret);
        Ok(url)
    }

    /// Pick the streaming address out of a successful session response.
    pub fn stream_url_for(&self, response: &SessionResponse) -> Result<Url> {
        if let Some(raw) = non_blank(response.websocket_url.as_deref()) {
            return normalize_stream_url(raw);
        }
        if let Some(secret) = non_blank(response.session_secret.as_deref()) {
            return self.fallback_stream_url(secret);
        }
        Err(ClientError::InvalidResponse(
            "session response carries neither websocket_url nor session_secret".into(),
        ))
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

pub fn normalize_stream_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let normalized = if raw.starts_with("ws://") || raw.starts_with("wss://") {
        raw.to_string()
    } else if let Some(rest) = raw.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = raw.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if raw.contains("://") {
        return Err(ClientError::InvalidResponse(format!(
            "unsupported stream url scheme: {raw}"
        )));
    } else {
        format!("ws://{raw}")
    };
    Ok(Url::parse(&normalized)?)
}

/// One known remote target as listed by `GET /devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDescriptor {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
    /// Unix seconds of the remote's last heartbeat.
    #[serde(default, rename = "timestamp", skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<i64>,
}

impl RemoteDescriptor {
    /// Name to show the operator; remotes that never reported one fall back
    /// to their id.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            self.id.to_string()
        } else {
            self.name.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<RemoteDescriptor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionResponse {
    #[serde(default)]
    pub session_secret: Option<String>,
    #[serde(default)]
    pub websocket_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<Value>,
}

/// Reason phrase of the status line, or the bare code when there is none.
fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| status.as_str().to_string())
}

/// Prefer the broker's own `error` string; anything else (missing body,
/// non-string error payloads) falls back to the status text.
pub fn rejection_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error)
        .and_then(|error| error.as_str().map(str::trim).map(ToOwned::to_owned))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| status_text(status))
}

/// HTTP client for the broker's REST surface.
#[derive(Debug, Clone)]
pub struct BrokerClient {
    http: Client,
    endpoint: BrokerEndpoint,
    timeout: Duration,
}

impl BrokerClient {
    pub fn new(ctx: &ClientContext) -> Result<Self> {
        let http = Client::builder().timeout(ctx.request_timeout()).build()?;
        Ok(Self {
            http,
            endpoint: ctx.broker().clone(),
            timeout: ctx.request_timeout(),
        })
    }

    pub fn endpoint(&self) -> &BrokerEndpoint {
        &self.endpoint
    }

    fn transport_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            ClientError::Http(err)
        }
    }

    /// `GET /devices`.
    pub async fn list_devices(&self) -> Result<Vec<RemoteDescriptor>> {
        let response = self
            .http
            .get(self.endpoint.http_url("/devices"))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(ClientError::rejected(
                rejection_message(status, &body),
                status.as_u16(),
            ));
        }

        let parsed: DevicesResponse = serde_json::from_slice(&body)?;
        Ok(parsed.devices)
    }

    /// `POST /session`.
    pub async fn create_session(&self, request: &SessionRequest) -> Result<SessionResponse> {
        let response = self
            .http
            .post(self.endpoint.http_url("/session"))
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(ClientError::rejected(
                rejection_message(status, &body),
                status.as_u16(),
            ));
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
