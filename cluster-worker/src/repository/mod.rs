//! Repository layer
//!
//! Repositories are thin wrappers over the broker client. They expose the
//! two pieces of shared state the dispatcher touches (the job queue and the
//! heartbeat store) without any business logic.
//!
//! All repositories are trait-based so the scheduler can be tested without
//! a live broker.

mod heartbeats;
mod queue;

// Re-export traits
pub use heartbeats::HeartbeatStore;
pub use queue::JobQueue;

// Re-export implementations
pub use heartbeats::RedisHeartbeatStore;
pub use queue::RedisJobQueue;
