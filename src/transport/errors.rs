//! Transport errors
//!
//! Every failure of a cluster or gateway call surfaces as exactly one of
//! these variants. An empty answer is never a success.

use thiserror::Error;

/// Result type for transport calls
pub type TransportResult<T> = Result<T, TransportError>;

/// Substring the cluster uses when it cannot satisfy replication_min
const INSUFFICIENT_PEERS_MARKER: &str = "not enough peers";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// 2xx with nothing in it; the cluster failed after committing to a status
    #[error("Empty response from {0}: server-side failure")]
    EmptyResponse(String),

    /// Error reported by the cluster, verbatim
    #[error("Cluster error ({code}): {message}")]
    ClusterReported { message: String, code: i64 },

    /// The cluster cannot place the requested number of replicas
    #[error("Insufficient replicas: {message}")]
    InsufficientReplicas { message: String },

    /// Body did not parse into any known record shape
    #[error("Invalid response shape: {0}")]
    InvalidResponseShape(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unauthorized: check basic auth credentials")]
    Unauthorized,

    /// Local filesystem failure while reading upload content or writing a download
    #[error("Local I/O error on {path}: {message}")]
    LocalIo { path: String, message: String },
}

impl TransportError {
    /// Build a cluster-reported error, promoting replication-minimum
    /// failures to `InsufficientReplicas`.
    pub fn cluster(message: impl Into<String>, code: i64) -> Self {
        let message = message.into();
        if message.to_lowercase().contains(INSUFFICIENT_PEERS_MARKER) {
            TransportError::InsufficientReplicas { message }
        } else {
            TransportError::ClusterReported { message, code }
        }
    }

    pub fn local_io(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        TransportError::LocalIo {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::EmptyResponse(_) => "CCS_TRANSPORT_EMPTY_RESPONSE",
            TransportError::ClusterReported { .. } => "CCS_TRANSPORT_CLUSTER_ERROR",
            TransportError::InsufficientReplicas { .. } => "CCS_TRANSPORT_INSUFFICIENT_REPLICAS",
            TransportError::InvalidResponseShape(_) => "CCS_TRANSPORT_INVALID_RESPONSE",
            TransportError::NetworkUnavailable(_) => "CCS_TRANSPORT_NETWORK_UNAVAILABLE",
            TransportError::Timeout => "CCS_TRANSPORT_TIMEOUT",
            TransportError::Unauthorized => "CCS_TRANSPORT_UNAUTHORIZED",
            TransportError::LocalIo { .. } => "CCS_TRANSPORT_LOCAL_IO",
        }
    }

    /// True when the cluster answered 404 for the requested object
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::ClusterReported { code: 404, .. })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::InvalidResponseShape(err.to_string())
        } else {
            TransportError::NetworkUnavailable(err.to_string())
        }
    }
}
