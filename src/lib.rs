//! ccs - pinning orchestrator for a private multi-organization cluster
//!
//! Decides where content lives (primary, backup, cross-org peers), adds
//! it with those allocations, tracks per-peer pin state and keeps the
//! cluster converged through repair, tagging and re-allocation passes.

pub mod allocation;
pub mod cli;
pub mod config;
pub mod observability;
pub mod operations;
pub mod replication;
pub mod transport;
