use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use ostack_common::{Credentials, Flavor, Image, Server, Volume, VolumeSnapshot};

/// A booted server plus what the control plane remembers about it beyond
/// the wire shape.
#[derive(Debug, Clone)]
pub(crate) struct ServerRecord {
    pub server: Server,
    /// Whether the flavor used at boot carried a root disk. Snapshots of
    /// rootless instances fail and terminate `deleted`.
    pub root_disk: bool,
}

/// Shared in-memory state of the simulated control plane. Status changes
/// settle asynchronously so clients genuinely have to poll.
#[derive(Clone)]
pub struct CloudState {
    pub(crate) settle: Duration,
    pub(crate) servers: Arc<DashMap<String, ServerRecord>>,
    pub(crate) flavors: Arc<DashMap<String, Flavor>>,
    pub(crate) images: Arc<DashMap<String, Image>>,
    pub(crate) volumes: Arc<DashMap<String, Volume>>,
    pub(crate) snapshots: Arc<DashMap<String, VolumeSnapshot>>,
    /// volume id -> server id
    pub(crate) attachments: Arc<DashMap<String, String>>,
    pub(crate) credentials: Arc<DashMap<String, Credentials>>,
}

impl CloudState {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            servers: Arc::new(DashMap::new()),
            flavors: Arc::new(DashMap::new()),
            images: Arc::new(DashMap::new()),
            volumes: Arc::new(DashMap::new()),
            snapshots: Arc::new(DashMap::new()),
            attachments: Arc::new(DashMap::new()),
            credentials: Arc::new(DashMap::new()),
        }
    }

    /// Run `apply` against the state after the settle delay.
    pub(crate) fn after_settle<F>(&self, apply: F)
    where
        F: FnOnce(&CloudState) + Send + 'static,
    {
        let state = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(state.settle).await;
            apply(&state);
        });
    }
}

impl Default for CloudState {
    fn default() -> Self {
        Self::new(Duration::from_millis(25))
    }
}
