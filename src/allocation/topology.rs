//! Cluster topology snapshot used for allocation

use crate::config::{CcsConfig, NodeRole};
use crate::transport::{FreespaceMetric, PeerRecord};

/// One storage peer as seen at resolution time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    /// Configured node name
    pub name: String,
    pub peer_id: Option<String>,
    pub role: Option<NodeRole>,
    pub org: Option<String>,
    pub online: bool,
    /// Free space in bytes, when a metric is available
    pub free_bytes: Option<u64>,
    /// Free space below which the node takes no new replicas
    pub reserved_bytes: u64,
}

impl ClusterNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            peer_id: None,
            role: None,
            org: None,
            online: true,
            free_bytes: None,
            reserved_bytes: 0,
        }
    }

    pub fn with_peer_id(mut self, peer_id: impl Into<String>) -> Self {
        self.peer_id = Some(peer_id.into());
        self
    }

    pub fn with_role(mut self, role: NodeRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }

    pub fn with_free_bytes(mut self, bytes: u64) -> Self {
        self.free_bytes = Some(bytes);
        self
    }

    pub fn with_reserved_bytes(mut self, bytes: u64) -> Self {
        self.reserved_bytes = bytes;
        self
    }

    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    /// Free space is above the reserve, or unknown
    pub fn has_room(&self) -> bool {
        self.free_bytes
            .map(|free| free > self.reserved_bytes)
            .unwrap_or(true)
    }
}

/// Nodes known to the configuration, annotated with what the cluster
/// currently reports about them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    nodes: Vec<ClusterNode>,
}

impl Topology {
    pub fn new(nodes: Vec<ClusterNode>) -> Self {
        Self { nodes }
    }

    /// Every configured node, assumed online, free space unknown
    pub fn from_config(config: &CcsConfig) -> Self {
        let nodes = config
            .nodes
            .values()
            .map(|n| ClusterNode {
                name: n.name.clone(),
                peer_id: n.peer_id.clone(),
                role: n.role,
                org: n.org.clone(),
                online: true,
                free_bytes: None,
                reserved_bytes: n.reserved_min_bytes(),
            })
            .collect();
        Self { nodes }
    }

    /// Mark nodes online only if the cluster lists their peer id without
    /// an error
    pub fn with_peers(mut self, peers: &[PeerRecord]) -> Self {
        for node in &mut self.nodes {
            node.online = match &node.peer_id {
                Some(id) => peers.iter().any(|p| &p.id == id && p.is_online()),
                None => false,
            };
        }
        self
    }

    pub fn with_freespace(mut self, metrics: &[FreespaceMetric]) -> Self {
        for node in &mut self.nodes {
            if let Some(id) = &node.peer_id {
                if let Some(metric) = metrics.iter().find(|m| &m.peer == id) {
                    node.free_bytes = Some(metric.bytes);
                }
            }
        }
        self
    }

    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_by_peer_id(&self, peer_id: &str) -> Option<&ClusterNode> {
        self.nodes
            .iter()
            .find(|n| n.peer_id.as_deref() == Some(peer_id))
    }

    pub fn free_bytes(&self, peer_id: &str) -> Option<u64> {
        self.node_by_peer_id(peer_id).and_then(|n| n.free_bytes)
    }
}
