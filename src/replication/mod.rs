//! Replication state model
//!
//! A `Pin` is the cluster's record for one CID: the peers it is targeted
//! to and what each peer currently reports. The predicates here are the
//! single definition of "adequately replicated" used by every operation.
//!
//! - `is_fully_pinned`: allocation non-empty and every allocated peer pinned
//! - `pinned_count`: peers reporting pinned, allocated or not
//! - `has_error`: any peer reporting `pin_error`
//! - `needs_repair`: `has_error || pinned_count == 0`

mod condition;
mod pin;
mod status;

pub use condition::PinCondition;
pub use pin::{PeerPinStatus, Pin, META_ORG, META_SIZE};
pub use status::PeerStatus;

pub(crate) use pin::null_as_default;
