//! Process-scoped state shared by reference with every component.

use std::time::Duration;

use crate::broker::BrokerEndpoint;
use crate::identity::ClientIdentity;

/// Built once at start-up; the identity it carries lives as long as the
/// process does.
#[derive(Debug, Clone)]
pub struct ClientContext {
    identity: ClientIdentity,
    broker: BrokerEndpoint,
    request_timeout: Duration,
}

impl ClientContext {
    pub fn new(broker: BrokerEndpoint, request_timeout: Duration) -> Self {
        Self::with_identity(ClientIdentity::generate(), broker, request_timeout)
    }

    pub fn with_identity(
        identity: ClientIdentity,
        broker: BrokerEndpoint,
        request_timeout: Duration,
    ) -> Self {
        tracing::debug!(
            target = "easyshell::context",
            client_id = %identity,
            broker = %broker,
            "client context created"
        );
        Self {
            identity,
            broker,
            request_timeout,
        }
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn broker(&self) -> &BrokerEndpoint {
        &self.broker
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}
