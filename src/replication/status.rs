//! Per-peer pin status as reported by the cluster

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status one peer reports for one pin.
///
/// Unknown strings are kept verbatim in `Other` so newer cluster
/// versions never fail parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PeerStatus {
    /// Data held locally
    Pinned,
    /// Fetch in progress
    Pinning,
    /// Waiting in the peer's pin queue
    PinQueued,
    /// Pinning failed; `recover` retries it
    PinError,
    /// Unpinning failed
    UnpinError,
    /// The peer's cluster component errored
    ClusterError,
    /// Not pinned on this peer
    Unpinned,
    /// Allocated elsewhere; this peer tracks it only
    Remote,
    Other(String),
}

impl PeerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PeerStatus::Pinned => "pinned",
            PeerStatus::Pinning => "pinning",
            PeerStatus::PinQueued => "pin_queued",
            PeerStatus::PinError => "pin_error",
            PeerStatus::UnpinError => "unpin_error",
            PeerStatus::ClusterError => "cluster_error",
            PeerStatus::Unpinned => "unpinned",
            PeerStatus::Remote => "remote",
            PeerStatus::Other(s) => s,
        }
    }

    /// Pinning failed on this peer. The only state that makes a pin
    /// need repair.
    pub fn is_pin_error(&self) -> bool {
        *self == PeerStatus::PinError
    }

    /// Any of the error states, `pin_error` included
    pub fn is_error(&self) -> bool {
        match self {
            PeerStatus::PinError | PeerStatus::UnpinError | PeerStatus::ClusterError => true,
            PeerStatus::Other(s) => s == "error",
            _ => false,
        }
    }

    /// The peer holds the data or is on its way to holding it
    pub fn holds_or_fetching(&self) -> bool {
        matches!(
            self,
            PeerStatus::Pinned | PeerStatus::Pinning | PeerStatus::PinQueued
        )
    }
}

impl From<String> for PeerStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pinned" => PeerStatus::Pinned,
            "pinning" => PeerStatus::Pinning,
            "pin_queued" => PeerStatus::PinQueued,
            "pin_error" => PeerStatus::PinError,
            "unpin_error" => PeerStatus::UnpinError,
            "cluster_error" => PeerStatus::ClusterError,
            "unpinned" => PeerStatus::Unpinned,
            "remote" => PeerStatus::Remote,
            _ => PeerStatus::Other(s),
        }
    }
}

impl From<&str> for PeerStatus {
    fn from(s: &str) -> Self {
        PeerStatus::from(s.to_string())
    }
}

impl From<PeerStatus> for String {
    fn from(status: PeerStatus) -> Self {
        match status {
            PeerStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
