//! Hot-reloadable service instances.
//!
//! A `ServiceHandle<T>` holds the current instance built from an external
//! resource. Loaders keep it fresh on a schedule or on change
//! notifications; reload actions gate and cascade reloads between handles.

pub mod action;
pub mod config;
pub mod error;
pub mod forward;
pub mod lifecycle;
pub mod loader;
pub mod observability;
pub mod resilience;
pub mod runtime;
pub mod service;
pub mod source;
pub mod state;
pub mod translate;
pub mod version;

pub use config::schema::ReloaderConfig;
pub use error::{BuildError, ConfigurationError, ReloadError};
pub use lifecycle::Shutdown;
pub use loader::{BackoffPolicy, LoaderHandle, ScheduleSpec};
pub use runtime::ReloadRuntime;
pub use service::{Reloadable, ServiceBuilder, ServiceHandle};
pub use source::Source;
pub use translate::Translator;
pub use version::{ResourceId, Version};
