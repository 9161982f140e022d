//! Reports produced by bulk operations
//!
//! Bulk operations always finish a full pass. Per-pin failures are
//! counted and listed here instead of aborting the pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::replication::PinCondition;

/// Overall cluster health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Error,
}

impl HealthStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            HealthStatus::Ok => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Error => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Ok => "ok",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSummary {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
}

/// Per-state pin counts summed over every peer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSummary {
    pub total: usize,
    pub pinned: usize,
    pub pinning: usize,
    pub queued: usize,
    pub pin_error: usize,
    /// `unpin_error`, `cluster_error` and other error states
    pub other_error: usize,
    pub remote: usize,
}

/// Health of one cluster peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHealth {
    pub name: String,
    pub peer_id: String,
    pub online: bool,
    pub status: HealthStatus,
    pub pinned: usize,
    pub pinning: usize,
    pub queued: usize,
    pub pin_error: usize,
    /// `unpin_error`, `cluster_error` and other error states
    pub other_error: usize,
    pub remote: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinErrorEntry {
    pub cid: String,
    /// Peer name reporting the error
    pub node: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub exit_code: i32,
    pub peers: PeerSummary,
    pub pins: PinSummary,
    pub nodes: Vec<NodeHealth>,
    pub pin_errors: Vec<PinErrorEntry>,
    pub checked_at: DateTime<Utc>,
}

/// A pin found broken during repair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenPin {
    pub cid: String,
    pub name: String,
    pub condition: PinCondition,
    pub error_peers: Vec<String>,
    pub recovered: bool,
    pub recover_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    pub total_pins: usize,
    pub clean: usize,
    pub broken: usize,
    pub recoverable: usize,
    /// Broken pins no peer holds or is fetching
    pub lost: usize,
    pub recovered: usize,
    pub recover_errors: usize,
    pub dry_run: bool,
    pub broken_pins: Vec<BrokenPin>,
    pub exit_code: i32,
    pub checked_at: DateTime<Utc>,
}

impl RepairReport {
    /// 0 nothing broken; 1 at least one recover succeeded, or a dry run
    /// found pins it would recover; 2 at least one pin lost, or every
    /// recover call failed.
    pub fn compute_exit_code(broken: usize, recovered: usize, lost: usize, dry_run: bool) -> i32 {
        if lost > 0 {
            2
        } else if broken == 0 {
            0
        } else if recovered > 0 || dry_run {
            1
        } else {
            2
        }
    }
}

/// One pass of metadata tagging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagReport {
    pub pass_id: Uuid,
    pub profile: String,
    pub total: usize,
    /// Pins updated (or that would be, in a dry run)
    pub tagged: usize,
    /// Pins already carrying this profile's org and a size
    pub skipped: usize,
    /// Pins owned by another org
    pub foreign: usize,
    pub errors: usize,
    /// Pins tagged with org only because no size could be found
    pub size_unavailable: usize,
    pub dry_run: bool,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsureError {
    pub cid: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsureReport {
    pub profile: String,
    pub total: usize,
    pub already_correct: usize,
    pub fixed: usize,
    pub errors: usize,
    pub dry_run: bool,
    /// Primary and backup peer ids every pin must carry
    pub required_peers: Vec<String>,
    pub error_details: Vec<EnsureError>,
}

/// Allocation change planned or applied for one pin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceAction {
    pub cid: String,
    pub name: String,
    pub org: String,
    pub before: Vec<String>,
    pub after: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceReport {
    pub total_pins: usize,
    pub already_correct: usize,
    /// Pins without an org, or whose org has no profile
    pub skipped: usize,
    /// Pins that gained at least one peer
    pub added_replicas: usize,
    /// Pins that lost at least one peer
    pub removed_replicas: usize,
    pub errors: usize,
    pub actions: Vec<RebalanceAction>,
    pub dry_run: bool,
    pub replication_min: usize,
    pub replication_max: usize,
    pub exit_code: i32,
    pub checked_at: DateTime<Utc>,
}

impl RebalanceReport {
    /// 0 nothing to change, 1 changes planned or applied, 2 any error
    pub fn compute_exit_code(changed: usize, errors: usize) -> i32 {
        if errors > 0 {
            2
        } else if changed > 0 {
            1
        } else {
            0
        }
    }
}
