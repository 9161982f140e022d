//! Operation errors

use thiserror::Error;

use crate::allocation::AllocationError;
use crate::config::ConfigError;
use crate::transport::TransportError;

pub type OpsResult<T> = Result<T, OpsError>;

/// Failure of a single-shot operation.
///
/// Transport errors pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpsError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("{0}")]
    Config(String),

    #[error("Profile '{0}' not found in config")]
    UnknownProfile(String),

    /// No peer reports the CID as pinned
    #[error("CID {0} is not pinned on any peer")]
    NotPinnedAnywhere(String),

    /// Pinned only on peers this configuration has no address for
    #[error("CID {cid} is pinned only on peers without a configured address: {peers}")]
    NoGatewayAddress { cid: String, peers: String },
}

impl OpsError {
    pub fn code(&self) -> &'static str {
        match self {
            OpsError::Transport(e) => e.code(),
            OpsError::Allocation(e) => e.code(),
            OpsError::Config(_) => "CCS_OPS_CONFIG",
            OpsError::UnknownProfile(_) => "CCS_OPS_UNKNOWN_PROFILE",
            OpsError::NotPinnedAnywhere(_) => "CCS_OPS_NOT_PINNED",
            OpsError::NoGatewayAddress { .. } => "CCS_OPS_NO_GATEWAY_ADDRESS",
        }
    }

    /// Errors caused by the configuration rather than the cluster
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            OpsError::Allocation(_) | OpsError::Config(_) | OpsError::UnknownProfile(_)
        )
    }
}

impl From<ConfigError> for OpsError {
    fn from(err: ConfigError) -> Self {
        OpsError::Config(err.to_string())
    }
}
