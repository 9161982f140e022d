//! Cluster configuration
//!
//! The configuration is the only source of topology facts this crate does
//! not discover from the cluster itself: which nodes exist, their peer ids,
//! role and org tags, which node is the shared backup, and which node each
//! organization profile treats as its primary.
//!
//! Loaded once, validated explicitly, then passed by reference into every
//! operation. There is no global configuration state.
//!
//! File format (JSON, default `~/.ccs/config.json`):
//!
//! ```json
//! {
//!   "cluster": {"basic_auth_user": "admin", "basic_auth_password": "..."},
//!   "backup_node": "chll",
//!   "default_node": "nas",
//!   "profiles": {"hrdag": {"primary": "nas"}},
//!   "nodes": {"nas": {"host": "nas", "peer_id": "12D3KooW...", "role": "primary", "org": "hrdag"}}
//! }
//! ```

mod errors;
mod node;

pub use errors::{ConfigError, ConfigResult};
pub use node::{
    ClusterAuth, NodeConfig, NodeRole, ProfileConfig, DEFAULT_API_PORT, DEFAULT_GATEWAY_PORT,
};

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observability::{log_event_with_fields, warn_event, Event};

fn default_replication_min() -> usize {
    3
}
fn default_replication_max() -> usize {
    5
}
fn default_cross_org_replicas() -> usize {
    1
}
fn default_concurrency() -> usize {
    8
}
fn default_timeout_secs() -> u64 {
    30
}

/// Complete ccs configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcsConfig {
    /// Cluster REST API credentials
    #[serde(rename = "cluster", default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ClusterAuth>,

    /// Name of the shared backup node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_node: Option<String>,

    /// Node whose API is used when no host is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_node: Option<String>,

    /// Minimum replicas per pin (cluster-enforced)
    #[serde(default = "default_replication_min")]
    pub replication_min: usize,

    /// Maximum replicas per pin (cluster-enforced)
    #[serde(default = "default_replication_max")]
    pub replication_max: usize,

    /// Cross-organization peers added after primary and backup
    #[serde(default = "default_cross_org_replicas")]
    pub cross_org_replicas: usize,

    /// Per-pin calls in flight during bulk operations
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout applied to every cluster and gateway call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,

    #[serde(default)]
    pub nodes: BTreeMap<String, NodeConfig>,
}

impl Default for CcsConfig {
    fn default() -> Self {
        Self {
            auth: None,
            backup_node: None,
            default_node: None,
            replication_min: default_replication_min(),
            replication_max: default_replication_max(),
            cross_org_replicas: default_cross_org_replicas(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            profiles: BTreeMap::new(),
            nodes: BTreeMap::new(),
        }
    }
}

/// Outcome of `CcsConfig::validate`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl CcsConfig {
    /// Default config location: `$HOME/.ccs/config.json`
    pub fn default_path() -> PathBuf {
        let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
        home.join(".ccs").join("config.json")
    }

    /// Load configuration from file.
    ///
    /// Parsing only; call `validate` before running operations.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config = Self::from_json_str(&content)?;
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("nodes", &config.nodes.len().to_string()),
                ("path", &path.display().to_string()),
                ("profiles", &config.profiles.len().to_string()),
            ],
        );
        Ok(config)
    }

    /// Parse configuration from a JSON string
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: CcsConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.fill_names();
        Ok(config)
    }

    /// Load and reject configurations with validation errors.
    /// Warnings are logged.
    pub fn load_validated(path: &Path) -> ConfigResult<Self> {
        let config = Self::load(path)?;
        let report = config.validate();
        for warning in &report.warnings {
            warn_event(Event::ConfigWarning, &[("warning", warning)]);
        }
        if !report.is_ok() {
            return Err(ConfigError::Invalid(report.errors));
        }
        Ok(config)
    }

    fn fill_names(&mut self) {
        for (name, node) in self.nodes.iter_mut() {
            node.name = name.clone();
            if node.host.is_empty() {
                node.host = name.clone();
            }
        }
        for (name, profile) in self.profiles.iter_mut() {
            profile.name = name.clone();
        }
    }

    /// Save configuration to file with owner-only permissions.
    ///
    /// The file is created 0600, and an existing file is narrowed to 0600
    /// before any content is written.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let write_err = |e: std::io::Error| ConfigError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }

        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        Ok(())
    }

    /// Add or replace a node entry, keeping its name in sync with the key
    pub fn insert_node(&mut self, node: NodeConfig) {
        self.nodes.insert(node.name.clone(), node);
    }

    /// Add or replace a profile entry
    pub fn insert_profile(&mut self, profile: ProfileConfig) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn get_node(&self, name: &str) -> Option<&NodeConfig> {
        self.nodes.get(name)
    }

    pub fn get_profile(&self, name: &str) -> Option<&ProfileConfig> {
        self.profiles.get(name)
    }

    /// Primary node of a profile
    pub fn primary_for_profile(&self, profile: &str) -> Option<&NodeConfig> {
        self.get_profile(profile)
            .and_then(|p| self.get_node(&p.primary))
    }

    /// The shared backup node
    pub fn backup(&self) -> Option<&NodeConfig> {
        self.backup_node.as_deref().and_then(|n| self.get_node(n))
    }

    /// Peer id of a node by name
    pub fn peer_id(&self, node_name: &str) -> Option<&str> {
        self.get_node(node_name).and_then(|n| n.peer_id.as_deref())
    }

    /// Node whose configured peer id matches
    pub fn node_by_peer_id(&self, peer_id: &str) -> Option<&NodeConfig> {
        self.nodes
            .values()
            .find(|n| n.peer_id.as_deref() == Some(peer_id))
    }

    /// All configured peer ids
    pub fn known_peer_ids(&self) -> Vec<&str> {
        self.nodes
            .values()
            .filter_map(|n| n.peer_id.as_deref())
            .collect()
    }

    /// Timeout applied to every network call
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate configuration.
    ///
    /// Errors make the configuration unusable for operations; warnings
    /// flag entries that will degrade some of them.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        match self.backup_node.as_deref() {
            None => report.errors.push("backup_node is not set".to_string()),
            Some(name) if !self.nodes.contains_key(name) => report
                .errors
                .push(format!("backup_node '{}' not found in nodes", name)),
            Some(_) => {}
        }

        if let Some(name) = self.default_node.as_deref() {
            if !self.nodes.contains_key(name) {
                report
                    .errors
                    .push(format!("default_node '{}' not found in nodes", name));
            }
        }

        for (name, profile) in &self.profiles {
            if !self.nodes.contains_key(&profile.primary) {
                report.errors.push(format!(
                    "profile '{}' references unknown node '{}'",
                    name, profile.primary
                ));
            }
        }

        if self.replication_min < 1 {
            report
                .errors
                .push("replication_min must be >= 1".to_string());
        }
        if self.replication_max < self.replication_min {
            report.errors.push(format!(
                "replication_max must be >= replication_min ({} < {})",
                self.replication_max, self.replication_min
            ));
        }
        if self.concurrency == 0 {
            report.errors.push("concurrency must be >= 1".to_string());
        }
        if self.timeout_secs == 0 {
            report.errors.push("timeout_secs must be >= 1".to_string());
        }

        for (name, node) in &self.nodes {
            if node.peer_id.is_none() {
                report.warnings.push(format!(
                    "node '{}' has no peer_id (provisioning must populate it)",
                    name
                ));
            }
        }

        if !self.auth.as_ref().map(|a| a.is_complete()).unwrap_or(false) {
            report
                .warnings
                .push("no cluster auth configured".to_string());
        }

        if self.replication_min > self.nodes.len() {
            report.warnings.push(format!(
                "replication_min ({}) exceeds node count ({})",
                self.replication_min,
                self.nodes.len()
            ));
        }

        report
    }
}
