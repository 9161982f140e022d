//! Records returned by single-shot operations
//!
//! All of them serialize to flat JSON and deserialize back to an equal
//! value, so a caller can persist them and rebuild them later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::replication::{Pin, PinCondition};
use crate::transport::{DownloadKind, PeerRecord};

/// Outcome code of an add
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum AddOutcome {
    /// Every file was added
    Success = 0,
    /// The cluster accepted the add but some files are missing from its answer
    Partial = 1,
    /// Nothing was added
    Failed = 2,
    /// Profile, node or peer id missing from the configuration
    ConfigError = 3,
}

impl AddOutcome {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<AddOutcome> for u8 {
    fn from(outcome: AddOutcome) -> Self {
        outcome.code()
    }
}

impl TryFrom<u8> for AddOutcome {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AddOutcome::Success),
            1 => Ok(AddOutcome::Partial),
            2 => Ok(AddOutcome::Failed),
            3 => Ok(AddOutcome::ConfigError),
            other => Err(format!("unknown add return code {}", other)),
        }
    }
}

/// One file or directory produced by an add
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidEntry {
    /// Path relative to the added root's parent
    pub path: String,
    /// Empty when the entry failed
    pub cid: String,
    pub size: u64,
    #[serde(default)]
    pub is_root: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl CidEntry {
    pub fn ok(&self) -> bool {
        self.error.is_none() && !self.cid.is_empty()
    }
}

/// Result of adding a file or directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddResult {
    /// Empty unless something was added
    pub root_cid: String,
    pub root_path: String,
    pub entries: Vec<CidEntry>,
    /// Peer ids requested as explicit allocation
    pub allocations: Vec<String>,
    pub profile: Option<String>,
    pub added_at: DateTime<Utc>,
    /// Node whose API received the add
    pub cluster_host: String,
    pub returncode: AddOutcome,
    pub error: Option<String>,
    /// Peers reporting `pinned` right after the add, when known
    #[serde(default)]
    pub replica_count: Option<usize>,
}

impl AddResult {
    /// A result carrying no entries and an error
    pub fn failure(
        root_path: impl Into<String>,
        profile: Option<&str>,
        cluster_host: impl Into<String>,
        allocations: Vec<String>,
        returncode: AddOutcome,
        error: impl Into<String>,
    ) -> Self {
        debug_assert!(returncode != AddOutcome::Success);
        Self {
            root_cid: String::new(),
            root_path: root_path.into(),
            entries: Vec::new(),
            allocations,
            profile: profile.map(str::to_string),
            added_at: Utc::now(),
            cluster_host: cluster_host.into(),
            returncode,
            error: Some(error.into()),
            replica_count: None,
        }
    }

    pub fn ok(&self) -> bool {
        self.returncode == AddOutcome::Success
    }

    pub fn root_entry(&self) -> Option<&CidEntry> {
        self.entries.iter().find(|e| e.is_root)
    }

    pub fn child_entries(&self) -> impl Iterator<Item = &CidEntry> {
        self.entries.iter().filter(|e| !e.is_root)
    }

    /// Sum of non-root entry sizes
    pub fn total_size(&self) -> u64 {
        self.child_entries().map(|e| e.size).sum()
    }
}

/// Pin record plus the derived replication predicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinReport {
    pub pin: Pin,
    pub fully_pinned: bool,
    pub pinned_count: usize,
    pub has_error: bool,
    pub needs_repair: bool,
    pub condition: PinCondition,
}

impl From<Pin> for PinReport {
    fn from(pin: Pin) -> Self {
        Self {
            fully_pinned: pin.is_fully_pinned(),
            pinned_count: pin.pinned_count(),
            has_error: pin.has_error(),
            needs_repair: pin.needs_repair(),
            condition: pin.condition(),
            pin,
        }
    }
}

/// One cluster peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub name: String,
    pub peer_id: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl From<PeerRecord> for PeerInfo {
    fn from(record: PeerRecord) -> Self {
        Self {
            name: record.peername,
            peer_id: record.id,
            addresses: record.addresses,
            error: Some(record.error).filter(|e| !e.is_empty()),
        }
    }
}

/// Result of a download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResult {
    pub cid: String,
    /// Node whose gateway served the content
    pub node: String,
    pub peer_id: String,
    pub destination: String,
    pub kind: DownloadKind,
    pub bytes: u64,
}
