//! Scheduler layer for the worker
//!
//! This layer runs the worker's concurrent units:
//! - The control listener, which pauses and resumes the worker
//! - The job dispatcher, which pulls one job at a time and sees it through
//! - A heartbeat publisher per in-flight job
//!
//! The ready flag shared by the listener and dispatcher lives in `ready`.

pub mod control;
pub mod dispatcher;
pub mod heartbeat;
pub mod ready;

pub use control::ControlListener;
pub use dispatcher::JobDispatcher;
pub use ready::ready_flag;
