//! Best-effort listing of remote targets known to the broker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::broker::{BrokerClient, RemoteDescriptor};

#[derive(Clone)]
pub struct RegistryClient {
    broker: BrokerClient,
    remotes: Arc<Mutex<Vec<RemoteDescriptor>>>,
    generation: Arc<AtomicU64>,
}

impl RegistryClient {
    pub fn new(broker: BrokerClient) -> Self {
        Self {
            broker,
            remotes: Arc::new(Mutex::new(Vec::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Snapshot of the last successfully fetched list.
    pub fn remotes(&self) -> Vec<RemoteDescriptor> {
        self.remotes.lock().clone()
    }

    /// Fetch the list again and replace the cached one wholesale.
    ///
    /// Failures keep the previous list and are only logged. A response that
    /// lands after a newer refresh was started is dropped. Returns whether
    /// the cached list was replaced.
    pub async fn refresh(&self) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let devices = match self.broker.list_devices().await {
            Ok(devices) => devices,
            Err(error) => {
                tracing::warn!(
                    target = "easyshell::registry",
                    broker = %self.broker.endpoint(),
                    error = %error,
                    "device listing failed; keeping previous list"
                );
                return false;
            }
        };

        let mut remotes = self.remotes.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(
                target = "easyshell::registry",
                generation,
                "discarding superseded device listing"
            );
            return false;
        }
        tracing::debug!(
            target = "easyshell::registry",
            count = devices.len(),
            "device list refreshed"
        );
        *remotes = devices;
        true
    }
}
