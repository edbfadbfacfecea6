//! Service layer
//!
//! Services contain the worker's decision logic: sampling local resources,
//! deciding whether a job may be admitted, and deciding what happens to a
//! job whose handler failed.
//!
//! The resource monitor and capability matcher are trait-based so the
//! dispatcher can be tested with fixed resource readings.

mod capabilities;
mod resources;
mod retry;

// Re-export traits
pub use capabilities::CapabilityMatcher;
pub use resources::ResourceMonitor;

// Re-export implementations
pub use capabilities::StandardCapabilityMatcher;
pub use resources::{ResourceSample, SystemResourceMonitor};
pub use retry::{RetryDecision, RetryPolicy};
