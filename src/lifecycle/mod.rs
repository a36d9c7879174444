//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build services → Start loaders
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast to loaders → Loaders stop → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then services, then loaders
//! - Shutdown never interrupts a reload that is already running

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start_services, Document, RunningService, StartupError};
