//! Core domain types
//!
//! These types are shared between the worker (which executes jobs) and the
//! broker client (which moves them over the wire). They carry no behavior
//! beyond parsing and small invariants.

pub mod capability;
pub mod control;
pub mod heartbeat;
pub mod job;
