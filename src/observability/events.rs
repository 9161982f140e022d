//! Observability events for ccs
//!
//! Every lifecycle step an operator may want to grep for has a typed
//! event here. Events are explicit; free-form event names are only used
//! by `ObservationScope`.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded and validated
    ConfigLoaded,
    /// Configuration produced warnings
    ConfigWarning,
    /// Configuration file rewritten
    ConfigSaved,

    // Transport
    /// Outgoing cluster API request
    ClusterRequest,
    /// Cluster API response received
    ClusterResponse,
    /// Gateway served HTML where content was expected; retrying as tar
    GatewayTarFallback,
    /// Freespace metrics unavailable, allocation proceeds without them
    FreespaceUnavailable,
    /// Peer list unavailable, configured nodes assumed online
    PeersUnavailable,

    // Add
    /// Add started
    AddStart,
    /// Add finished with entries
    AddComplete,
    /// Add failed
    AddFailed,
    /// Post-add status lookup failed
    ReplicaCountUnavailable,

    // Get
    /// Download started from a chosen peer
    DownloadStart,
    /// Download finished
    DownloadComplete,

    // Bulk operations
    /// Pin recovery requested
    PinRecover,
    /// Pin recovery request failed
    PinRecoverFailed,
    /// Pin found with no node holding data
    PinLost,
    /// Metadata applied to a pin
    PinTagged,
    /// Metadata update failed
    PinTagFailed,
    /// Gateway size lookup failed; pin tagged with org only
    PinSizeUnavailable,
    /// Pin re-issued with new allocations
    PinReallocated,
    /// Re-issuing a pin failed
    PinReallocateFailed,
    /// Tag passes finished, converged or not
    TagConvergence,

    // Health
    /// Health summary computed
    HealthCheck,
    /// Peer reported offline
    PeerOffline,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ConfigWarning => "CONFIG_WARNING",
            Event::ConfigSaved => "CONFIG_SAVED",

            Event::ClusterRequest => "CLUSTER_REQUEST",
            Event::ClusterResponse => "CLUSTER_RESPONSE",
            Event::GatewayTarFallback => "GATEWAY_FALLBACK_TAR",
            Event::FreespaceUnavailable => "FREESPACE_UNAVAILABLE",
            Event::PeersUnavailable => "PEERS_UNAVAILABLE",

            Event::AddStart => "ADD_START",
            Event::AddComplete => "ADD_COMPLETE",
            Event::AddFailed => "ADD_FAILED",
            Event::ReplicaCountUnavailable => "REPLICA_COUNT_UNAVAILABLE",

            Event::DownloadStart => "DOWNLOAD_START",
            Event::DownloadComplete => "DOWNLOAD_COMPLETE",

            Event::PinRecover => "PIN_RECOVER",
            Event::PinRecoverFailed => "PIN_RECOVER_FAILED",
            Event::PinLost => "PIN_LOST",
            Event::PinTagged => "PIN_TAGGED",
            Event::PinTagFailed => "PIN_TAG_FAILED",
            Event::PinSizeUnavailable => "PIN_SIZE_UNAVAILABLE",
            Event::PinReallocated => "PIN_REALLOCATED",
            Event::PinReallocateFailed => "PIN_REALLOCATE_FAILED",
            Event::TagConvergence => "TAG_CONVERGENCE",

            Event::HealthCheck => "HEALTH_CHECK",
            Event::PeerOffline => "PEER_OFFLINE",
        }
    }

    /// True for events that report a failure of the step they name
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::AddFailed
                | Event::PinRecoverFailed
                | Event::PinLost
                | Event::PinTagFailed
                | Event::PinReallocateFailed
        )
    }

    /// True for events that only matter when debugging the wire protocol
    pub fn is_trace(&self) -> bool {
        matches!(self, Event::ClusterRequest | Event::ClusterResponse)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
