//! Operations orchestrator
//!
//! Each operation composes transport, allocation and the replication
//! state model against one configuration:
//!
//! - `add`, `status`, `get`, `ls`, `peers`: single-shot, never retried
//! - `health`: peer and pin summary with an exit code
//! - `repair`, `tag_pins`, `ensure_pins`, `rebalance`: bulk passes over
//!   every pin with bounded per-pin concurrency
//!
//! Bulk passes finish even when individual pins fail and report counts.
//! Nothing is cached between calls: every operation reads the cluster
//! fresh.

mod add;
mod ensure;
mod errors;
mod get;
mod health;
mod pool;
mod rebalance;
mod repair;
mod reports;
mod results;
mod status;
mod tag;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{OpsError, OpsResult};
pub use reports::{
    BrokenPin, EnsureError, EnsureReport, HealthReport, HealthStatus, NodeHealth, PeerSummary,
    PinErrorEntry, PinSummary, RebalanceAction, RebalanceReport, RepairReport, TagReport,
};
pub use results::{AddOutcome, AddResult, CidEntry, GetResult, PeerInfo, PinReport};

use crate::allocation::Topology;
use crate::config::{CcsConfig, NodeConfig};
use crate::observability::{warn_event, Event};
use crate::transport::{ClusterClient, Gateway};

/// Entry point for every operation.
///
/// Borrows the configuration; `host` overrides which node's API (and
/// gateway) is used. A host that names a configured node uses that
/// node's ports, any other value is treated as a bare hostname with
/// default ports.
#[derive(Debug, Clone)]
pub struct Operations<'a> {
    config: &'a CcsConfig,
    host: Option<String>,
}

impl<'a> Operations<'a> {
    pub fn new(config: &'a CcsConfig) -> Self {
        Self { config, host: None }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn config(&self) -> &CcsConfig {
        self.config
    }

    /// Node to talk to: explicit host, then `preferred`, then `default_node`
    pub(crate) fn target_node(&self, preferred: Option<&str>) -> OpsResult<NodeConfig> {
        let name = self
            .host
            .as_deref()
            .or(preferred)
            .or(self.config.default_node.as_deref())
            .ok_or_else(|| {
                OpsError::Config("no cluster node to talk to: set default_node or pass a host".into())
            })?;

        Ok(self
            .config
            .get_node(name)
            .cloned()
            .unwrap_or_else(|| NodeConfig::new(name, name)))
    }

    pub(crate) fn client_for(&self, node: &NodeConfig) -> OpsResult<ClusterClient> {
        Ok(ClusterClient::new(
            node.api_url(),
            self.config.auth.clone(),
            self.config.timeout(),
        )?)
    }

    pub(crate) fn gateway_for(&self, node: &NodeConfig) -> OpsResult<Gateway> {
        Ok(Gateway::new(node.gateway_url(), self.config.timeout())?)
    }

    /// Client for the default target
    pub(crate) fn client(&self) -> OpsResult<ClusterClient> {
        self.client_for(&self.target_node(None)?)
    }

    /// Configured topology annotated with live membership and free space.
    ///
    /// Either lookup may fail; the snapshot then keeps the configured
    /// assumption (online, free space unknown) for what it could not read.
    pub(crate) async fn topology(&self, client: &ClusterClient) -> Topology {
        let mut topology = Topology::from_config(self.config);

        match client.list_peers().await {
            Ok(peers) => topology = topology.with_peers(&peers),
            Err(e) => warn_event(Event::PeersUnavailable, &[("reason", &e.to_string())]),
        }

        match client.freespace().await {
            Ok(metrics) => topology = topology.with_freespace(&metrics),
            Err(e) => warn_event(Event::FreespaceUnavailable, &[("reason", &e.to_string())]),
        }

        topology
    }
}
