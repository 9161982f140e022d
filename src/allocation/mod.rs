//! Allocation: which peers a profile's content is targeted to
//!
//! Pure and side-effect free. The caller assembles a `Topology` from the
//! configuration and whatever the cluster reports (membership, freespace)
//! and gets back an ordered `Allocation`.

mod resolver;
mod topology;

pub use resolver::{
    required_peers, resolve, resolve_with_rng, Allocation, AllocationError, AllocationPolicy,
};
pub use topology::{ClusterNode, Topology};

pub use crate::config::{NodeRole, ProfileConfig as Profile};
