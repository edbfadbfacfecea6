//! Cluster Core
//!
//! Core types shared by the cluster worker and its broker client.
//!
//! This crate contains:
//! - Domain types: jobs, capabilities, heartbeat records, control commands
//! - Naming helpers for the keys and channels a worker owns in shared state

pub mod domain;
pub mod keys;
