//! Download content from a peer that holds it

use std::path::Path;

use super::errors::{OpsError, OpsResult};
use super::results::GetResult;
use super::Operations;
use crate::config::NodeConfig;
use crate::observability::{log_event_with_fields, Event};
use crate::replication::Pin;

impl<'a> Operations<'a> {
    /// Fetch `cid` into `dest` through the gateway of a peer reporting
    /// `pinned`. The profile's primary is preferred when it has the data.
    pub async fn get(&self, cid: &str, dest: &Path, profile: Option<&str>) -> OpsResult<GetResult> {
        let primary_peer = match profile {
            Some(name) => {
                let profile = self
                    .config
                    .get_profile(name)
                    .ok_or_else(|| OpsError::UnknownProfile(name.to_string()))?;
                self.config.peer_id(&profile.primary)
            }
            None => None,
        };

        let pin = self.client()?.pin_status(cid).await?;
        let candidates = download_order(&pin, primary_peer);
        if candidates.is_empty() {
            return Err(OpsError::NotPinnedAnywhere(cid.to_string()));
        }

        let (peer_id, node) = candidates
            .iter()
            .find_map(|id| self.config.node_by_peer_id(id).map(|n| (*id, n)))
            .ok_or_else(|| OpsError::NoGatewayAddress {
                cid: cid.to_string(),
                peers: candidates.join(", "),
            })?;

        self.download_from(cid, dest, peer_id, node).await
    }

    async fn download_from(
        &self,
        cid: &str,
        dest: &Path,
        peer_id: &str,
        node: &NodeConfig,
    ) -> OpsResult<GetResult> {
        let destination = dest.display().to_string();
        log_event_with_fields(
            Event::DownloadStart,
            &[("cid", cid), ("dest", &destination), ("node", &node.name)],
        );

        let download = self.gateway_for(node)?.download(cid, dest).await?;

        log_event_with_fields(
            Event::DownloadComplete,
            &[
                ("bytes", &download.bytes.to_string()),
                ("cid", cid),
                ("node", &node.name),
            ],
        );

        Ok(GetResult {
            cid: cid.to_string(),
            node: node.name.clone(),
            peer_id: peer_id.to_string(),
            destination,
            kind: download.kind,
            bytes: download.bytes,
        })
    }
}

/// Pinned peers, the preferred one first and the rest in peer id order
fn download_order<'p>(pin: &'p Pin, preferred: Option<&str>) -> Vec<&'p str> {
    let mut pinned = pin.pinned_peers();
    if let Some(first) = preferred {
        if let Some(pos) = pinned.iter().position(|id| *id == first) {
            let id = pinned.remove(pos);
            pinned.insert(0, id);
        }
    }
    pinned
}
