//! Allocation resolver
//!
//! Maps a profile and a topology snapshot to an ordered peer list:
//!
//! 1. the profile's primary node
//! 2. the shared backup node, when configured
//! 3. cross-organization peers, up to `cross_org_replicas` and never past
//!    `replication_max`
//!
//! Cross-org candidates must be online, have a peer id, not be listed
//! already, and have free space above their reserve when it is known.
//! They are taken tier by tier (cross-org role from another org, then
//! other orgs' primaries and untagged nodes of other orgs, then overflow
//! and org-less nodes), most free space first.
//!
//! Resolution is deterministic for a given snapshot except among
//! candidates in the same tier with equal free space: those are ordered
//! randomly. `resolve_with_rng` takes the RNG so the order can be pinned.

use std::cmp::Reverse;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::topology::{ClusterNode, Topology};
use crate::config::{CcsConfig, NodeRole, ProfileConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("Profile '{0}' not found in config")]
    UnknownProfile(String),

    #[error("Node '{0}' not found in config")]
    UnknownNode(String),

    #[error("Node '{0}' has no peer_id in config")]
    MissingPeerId(String),
}

impl AllocationError {
    pub fn code(&self) -> &'static str {
        match self {
            AllocationError::UnknownProfile(_) => "CCS_ALLOCATION_UNKNOWN_PROFILE",
            AllocationError::UnknownNode(_) => "CCS_ALLOCATION_UNKNOWN_NODE",
            AllocationError::MissingPeerId(_) => "CCS_ALLOCATION_MISSING_PEER_ID",
        }
    }
}

/// Replication policy the resolver works against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPolicy {
    pub backup_node: Option<String>,
    pub replication_min: usize,
    pub replication_max: usize,
    pub cross_org_replicas: usize,
}

impl AllocationPolicy {
    pub fn from_config(config: &CcsConfig) -> Self {
        Self {
            backup_node: config.backup_node.clone(),
            replication_min: config.replication_min,
            replication_max: config.replication_max,
            cross_org_replicas: config.cross_org_replicas,
        }
    }
}

/// An ordered peer list for one profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Peer ids: primary, backup, then cross-org picks
    pub peers: Vec<String>,
    /// Fewer than `replication_min` peers resolved; the cluster's own
    /// allocator fills the rest
    pub shortfall: bool,
}

impl Allocation {
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers.iter().any(|p| p == peer_id)
    }
}

/// Resolve with thread-local randomness for tie-breaks
pub fn resolve(
    profile: &ProfileConfig,
    topology: &Topology,
    policy: &AllocationPolicy,
) -> Result<Allocation, AllocationError> {
    resolve_with_rng(profile, topology, policy, &mut rand::thread_rng())
}

pub fn resolve_with_rng<R: Rng + ?Sized>(
    profile: &ProfileConfig,
    topology: &Topology,
    policy: &AllocationPolicy,
    rng: &mut R,
) -> Result<Allocation, AllocationError> {
    let mut peers = required_peers(profile, topology, policy)?;

    let slots = policy
        .cross_org_replicas
        .min(policy.replication_max.saturating_sub(peers.len()));

    if slots > 0 {
        let mut candidates: Vec<(u8, &ClusterNode)> = topology
            .nodes()
            .iter()
            .filter(|n| n.online && n.has_room())
            .filter(|n| match &n.peer_id {
                Some(id) => !peers.contains(id),
                None => false,
            })
            .filter_map(|n| cross_org_tier(n, &profile.name).map(|tier| (tier, n)))
            .collect();

        candidates.shuffle(rng);
        candidates.sort_by_key(|(tier, node)| (*tier, rank(node)));

        peers.extend(
            candidates
                .into_iter()
                .filter_map(|(_, n)| n.peer_id.clone())
                .take(slots),
        );
    }

    let shortfall = peers.len() < policy.replication_min;
    Ok(Allocation { peers, shortfall })
}

/// Primary and backup peer ids for a profile, in that order
pub fn required_peers(
    profile: &ProfileConfig,
    topology: &Topology,
    policy: &AllocationPolicy,
) -> Result<Vec<String>, AllocationError> {
    let mut peers = vec![peer_id_of(topology, &profile.primary)?];
    if let Some(backup) = &policy.backup_node {
        let id = peer_id_of(topology, backup)?;
        if !peers.contains(&id) {
            peers.push(id);
        }
    }
    Ok(peers)
}

fn peer_id_of(topology: &Topology, name: &str) -> Result<String, AllocationError> {
    let node = topology
        .node(name)
        .ok_or_else(|| AllocationError::UnknownNode(name.to_string()))?;
    node.peer_id
        .clone()
        .ok_or_else(|| AllocationError::MissingPeerId(name.to_string()))
}

/// Lower tiers are preferred; None means not a cross-org candidate
fn cross_org_tier(node: &ClusterNode, org: &str) -> Option<u8> {
    let other_org = node.org.as_deref().map(|o| o != org);
    match (node.role, other_org) {
        (_, Some(false)) => None,
        (Some(NodeRole::Backup), _) => None,
        (Some(NodeRole::CrossOrg), Some(true)) => Some(0),
        (Some(NodeRole::Primary), Some(true)) | (None, Some(true)) => Some(1),
        (Some(NodeRole::Overflow), _) | (None, None) => Some(2),
        (Some(NodeRole::CrossOrg), None) | (Some(NodeRole::Primary), None) => Some(2),
    }
}

/// Ranking within a tier: most free space first, unknown last.
/// This is the one place a pin-queue-depth signal would be folded in.
fn rank(node: &ClusterNode) -> Reverse<u64> {
    Reverse(node.free_bytes.unwrap_or(0))
}
