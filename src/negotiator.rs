//! Turns a validated session request into a streaming endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use url::Url;
use uuid::Uuid;

use crate::broker::BrokerClient;
use crate::error::{ClientError, Result};
use crate::request::SessionRequest;

/// Result of a successful handshake. Exists only while its session is live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub remote_id: Uuid,
    pub stream_url: Url,
    pub session_secret: Option<String>,
}

#[derive(Clone)]
pub struct SessionNegotiator {
    broker: BrokerClient,
    in_flight: Arc<AtomicBool>,
}

/// Clears the in-flight flag however the request future ends, including
/// being dropped mid-flight.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionNegotiator {
    pub fn new(broker: BrokerClient) -> Self {
        Self {
            broker,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Sends exactly one `POST /session`. A second call while one is
    /// outstanding fails with [`ClientError::RequestInFlight`] without
    /// touching the network. Failures are never retried here.
    pub async fn connect(&self, request: &SessionRequest) -> Result<SessionHandle> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ClientError::RequestInFlight);
        }
        let _guard = InFlightGuard(self.in_flight.clone());

        tracing::info!(
            target = "easyshell::negotiator",
            client_id = %request.client_id(),
            remote_id = %request.remote_id(),
            "requesting session"
        );

        let response = match self.broker.create_session(request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(
                    target = "easyshell::negotiator",
                    remote_id = %request.remote_id(),
                    status = ?error.status(),
                    error = %error,
                    "session request failed"
                );
                return Err(error);
            }
        };

        let stream_url = self.broker.endpoint().stream_url_for(&response)?;
        tracing::info!(
            target = "easyshell::negotiator",
            remote_id = %request.remote_id(),
            endpoint = %redacted(&stream_url),
            "session granted"
        );

        Ok(SessionHandle {
            remote_id: request.remote_id(),
            stream_url,
            session_secret: response.session_secret,
        })
    }
}

/// The stream path carries the session secret; keep it out of logs.
fn redacted(url: &Url) -> String {
    format!(
        "{}://{}",
        url.scheme(),
        url.host_str().unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerEndpoint;
    use crate::context::ClientContext;
    use crate::request::SessionRequestBuilder;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use std::time::Duration;

    const REMOTE: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

    fn context_for(server: &MockServer, timeout: Duration) -> ClientContext {
        ClientContext::new(BrokerEndpoint::new(server.host(), server.port()), timeout)
    }

    fn request(ctx: &ClientContext, code: &str) -> SessionRequest {
        let mut form = SessionRequestBuilder::new();
        form.set_remote_id(REMOTE).set_otp(code);
        form.build(ctx.identity()).unwrap()
    }

    fn negotiator(ctx: &ClientContext) -> SessionNegotiator {
        SessionNegotiator::new(BrokerClient::new(ctx).unwrap())
    }

    #[tokio::test]
    async fn success_returns_stream_endpoint() {
        let server = MockServer::start();
        let ctx = context_for(&server, Duration::from_secs(5));
        let session = server.mock(|when, then| {
            when.method(POST)
                .path("/session")
                .json_body_partial(format!(
                    r#"{{"client_id":"{}","remote_id":"{REMOTE}","auth_type":"otp","auth_value":"482913"}}"#,
                    ctx.identity()
                ));
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"session_secret":"s3cr3t","websocket_url":"ws://broker.lan:7843/ws/s3cr3t"}"#);
        });

        let handle = negotiator(&ctx).connect(&request(&ctx, "482913")).await.unwrap();
        assert_eq!(handle.stream_url.as_str(), "ws://broker.lan:7843/ws/s3cr3t");
        assert_eq!(handle.session_secret.as_deref(), Some("s3cr3t"));
        assert_eq!(handle.remote_id.to_string(), REMOTE);
        session.assert_hits(1);
    }

    #[tokio::test]
    async fn rejection_surfaces_broker_error_text() {
        let server = MockServer::start();
        let ctx = context_for(&server, Duration::from_secs(5));
        let session = server.mock(|when, then| {
            when.method(POST).path("/session");
            then.status(401)
                .header("content-type", "application/json")
                .body(r#"{"error":"invalid code"}"#);
        });

        let negotiator = negotiator(&ctx);
        let err = negotiator.connect(&request(&ctx, "482913")).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid code");
        assert!(err.is_auth_rejection());
        assert!(!negotiator.is_in_flight());
        session.assert_hits(1);
    }

    #[tokio::test]
    async fn rejection_without_body_uses_status_text() {
        let server = MockServer::start();
        let ctx = context_for(&server, Duration::from_secs(5));
        let session = server.mock(|when, then| {
            when.method(POST).path("/session");
            then.status(503);
        });

        let err = negotiator(&ctx)
            .connect(&request(&ctx, "482913"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Service Unavailable");
        assert_eq!(err.status(), Some(503));
        session.assert_hits(1);
    }

    #[tokio::test]
    async fn hung_broker_times_out() {
        let server = MockServer::start();
        let ctx = context_for(&server, Duration::from_millis(200));
        let _session = server.mock(|when, then| {
            when.method(POST).path("/session");
            then.status(200)
                .delay(Duration::from_secs(3))
                .body(r#"{"session_secret":"late"}"#);
        });

        let err = negotiator(&ctx)
            .connect(&request(&ctx, "482913"))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
    }

    #[tokio::test]
    async fn duplicate_connect_is_refused_while_in_flight() {
        let server = MockServer::start();
        let ctx = context_for(&server, Duration::from_secs(5));
        let session = server.mock(|when, then| {
            when.method(POST).path("/session");
            then.status(200)
                .header("content-type", "application/json")
                .delay(Duration::from_millis(200))
                .body(r#"{"session_secret":"once"}"#);
        });

        let negotiator = negotiator(&ctx);
        let req = request(&ctx, "482913");
        let (first, second) = tokio::join!(negotiator.connect(&req), negotiator.connect(&req));

        assert!(first.is_ok());
        assert!(matches!(second, Err(ClientError::RequestInFlight)));
        assert!(!negotiator.is_in_flight());
        session.assert_hits(1);
    }

    #[tokio::test]
    async fn secret_only_response_derives_broker_stream_path() {
        let server = MockServer::start();
        let ctx = context_for(&server, Duration::from_secs(5));
        let _session = server.mock(|when, then| {
            when.method(POST).path("/session");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"session_secret":"abc123"}"#);
        });

        let handle = negotiator(&ctx).connect(&request(&ctx, "000000")).await.unwrap();
        assert_eq!(
            handle.stream_url.as_str(),
            format!("ws://{}:{}/ws/abc123", server.host(), server.port())
        );
    }

    #[tokio::test]
    async fn success_without_endpoint_is_invalid_response() {
        let server = MockServer::start();
        let ctx = context_for(&server, Duration::from_secs(5));
        let _session = server.mock(|when, then| {
            when.method(POST).path("/session");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"status":"ok"}"#);
        });

        let err = negotiator(&ctx)
            .connect(&request(&ctx, "000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }
}
