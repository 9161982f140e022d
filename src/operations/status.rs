//! Read-only lookups: one pin, every pin, cluster peers

use std::collections::BTreeMap;

use super::errors::OpsResult;
use super::results::{PeerInfo, PinReport};
use super::Operations;
use crate::config::CcsConfig;
use crate::replication::Pin;
use crate::transport::PeerRecord;

impl<'a> Operations<'a> {
    /// Observed peer map, target allocation and derived predicates for one CID
    pub async fn status(&self, cid: &str) -> OpsResult<PinReport> {
        let pin = self.client()?.pin_status(cid).await?;
        Ok(PinReport::from(pin))
    }

    /// Every pin the cluster tracks
    pub async fn ls(&self) -> OpsResult<Vec<Pin>> {
        Ok(self.client()?.list_pins().await?)
    }

    pub async fn peers(&self) -> OpsResult<Vec<PeerInfo>> {
        let peers = self.client()?.list_peers().await?;
        Ok(peers.into_iter().map(PeerInfo::from).collect())
    }

    /// Peer ids the cluster reports for configured nodes that have none,
    /// keyed by node name. Nothing is written.
    pub async fn discover_peer_ids(&self) -> OpsResult<BTreeMap<String, String>> {
        let peers = self.client()?.list_peers().await?;
        Ok(missing_peer_ids(self.config, &peers))
    }
}

/// A node matches the peer whose peername is the node's name or host
fn missing_peer_ids(config: &CcsConfig, peers: &[PeerRecord]) -> BTreeMap<String, String> {
    config
        .nodes
        .values()
        .filter(|node| node.peer_id.is_none())
        .filter_map(|node| {
            peers
                .iter()
                .filter(|p| !p.id.is_empty())
                .find(|p| p.peername == node.name || p.peername == node.host)
                .map(|p| (node.name.clone(), p.id.clone()))
        })
        .collect()
}
