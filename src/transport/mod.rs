//! Transport: the cluster control-plane API and the public-read gateway
//!
//! - `ClusterClient` issues cluster REST calls and folds every response
//!   shape (array, object, NDJSON, error record in a 2xx body) into one
//!   typed result or one `TransportError`.
//! - `Gateway` retrieves content and sizes by CID.
//! - `PinOptions` is the only way to re-issue a pin; metadata travels as
//!   `meta-<key>` query parameters, never in a body.

mod client;
mod content;
mod errors;
mod gateway;
mod pin_options;
mod records;

pub use client::ClusterClient;
pub use content::{AddContent, AddFile};
pub use errors::{TransportError, TransportResult};
pub use gateway::{Download, DownloadKind, Gateway, Probe};
pub use pin_options::PinOptions;
pub use records::{
    extract_cid, is_error_record, parse_records, AddedRecord, FreespaceMetric, PeerRecord,
    ResponseBody,
};
