//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! push notification
//!     → listening loader reload attempt
//!     → On "no change" or failure: backoff.rs (next delay, total wait cap)
//!     → retry until published or the cap is exceeded
//! ```
//!
//! Timeouts belong to the sources; the orchestrator imposes none.

pub mod backoff;

pub use backoff::{calculate_backoff, BackoffPolicy};
