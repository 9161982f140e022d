//! Node, profile and credential entries of the configuration file

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Default cluster REST API port
pub const DEFAULT_API_PORT: u16 = 9094;

/// Default public-read gateway port
pub const DEFAULT_GATEWAY_PORT: u16 = 8080;

const BYTES_PER_GB: u64 = 1_000_000_000;

/// Role tag assigned to a node at provisioning time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    /// An organization's own storage node
    Primary,
    /// The shared backup node
    Backup,
    /// A node that holds replicas for other organizations
    CrossOrg,
    /// Spare capacity
    Overflow,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Primary => "primary",
            NodeRole::Backup => "backup",
            NodeRole::CrossOrg => "cross-org",
            NodeRole::Overflow => "overflow",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(NodeRole::Primary),
            "backup" => Ok(NodeRole::Backup),
            "cross-org" => Ok(NodeRole::CrossOrg),
            "overflow" => Ok(NodeRole::Overflow),
            other => Err(format!("unknown node role '{}'", other)),
        }
    }
}

/// Configuration for a single cluster node.
///
/// In the file a node is either a bare hostname string or an object.
/// `name` is the map key and is filled in after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeConfig {
    #[serde(skip)]
    pub name: String,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<NodeRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    pub api_port: u16,
    pub gateway_port: u16,
    /// Free space (decimal GB) below which the node takes no new replicas
    #[serde(skip_serializing_if = "is_zero")]
    pub reserved_min_gb: u64,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl NodeConfig {
    /// Create a node entry with default ports and no tags
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            peer_id: None,
            role: None,
            org: None,
            api_port: DEFAULT_API_PORT,
            gateway_port: DEFAULT_GATEWAY_PORT,
            reserved_min_gb: 0,
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

    pub fn with_ports(mut self, api_port: u16, gateway_port: u16) -> Self {
        self.api_port = api_port;
        self.gateway_port = gateway_port;
        self
    }

    pub fn with_reserved_min_gb(mut self, gb: u64) -> Self {
        self.reserved_min_gb = gb;
        self
    }

    /// Base URL of the cluster REST API on this node
    pub fn api_url(&self) -> String {
        format!("http://{}:{}", self.host, self.api_port)
    }

    /// Base URL of the public-read gateway on this node
    pub fn gateway_url(&self) -> String {
        format!("http://{}:{}", self.host, self.gateway_port)
    }

    /// Reserved free space in bytes
    pub fn reserved_min_bytes(&self) -> u64 {
        self.reserved_min_gb.saturating_mul(BYTES_PER_GB)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NodeEntry {
    Host(String),
    Full(NodeFields),
}

#[derive(Deserialize)]
struct NodeFields {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    peer_id: Option<String>,
    #[serde(default)]
    role: Option<NodeRole>,
    #[serde(default)]
    org: Option<String>,
    #[serde(default = "default_api_port")]
    api_port: u16,
    #[serde(default = "default_gateway_port")]
    gateway_port: u16,
    #[serde(default)]
    reserved_min_gb: u64,
}

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_gateway_port() -> u16 {
    DEFAULT_GATEWAY_PORT
}

impl<'de> Deserialize<'de> for NodeConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let node = match NodeEntry::deserialize(deserializer)? {
            NodeEntry::Host(host) => NodeConfig::new(String::new(), host),
            NodeEntry::Full(fields) => NodeConfig {
                name: String::new(),
                // An empty host is replaced by the node name once it is known
                host: fields.host.unwrap_or_default(),
                peer_id: fields.peer_id.filter(|p| !p.is_empty()),
                role: fields.role,
                org: fields.org,
                api_port: fields.api_port,
                gateway_port: fields.gateway_port,
                reserved_min_gb: fields.reserved_min_gb,
            },
        };
        Ok(node)
    }
}

/// Organization profile: the org name and the node that is its primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(skip)]
    pub name: String,
    pub primary: String,
}

impl ProfileConfig {
    pub fn new(name: impl Into<String>, primary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary: primary.into(),
        }
    }
}

/// Basic-auth credentials for the cluster REST API
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAuth {
    #[serde(rename = "basic_auth_user")]
    pub user: String,
    #[serde(rename = "basic_auth_password")]
    pub password: String,
}

impl ClusterAuth {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for ClusterAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterAuth")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}
