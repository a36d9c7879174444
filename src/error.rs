//! Error taxonomy for the reload engine.
//!
//! # Categories
//! - `SourceError`: the backend could not produce the resource bytes
//! - `TranslateError`: the bytes could not be turned into an instance
//! - `ConfigurationError`: wiring mistakes, always raised eagerly
//! - `ActionError`: a reload action could not reach a decision
//!
//! A skipped reload (another one already in flight) is not an error; it is
//! reported as `Ok(false)`.

use thiserror::Error;

/// Boxed error used at plugin seams (factories, custom sources).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure raised by a `Source` while fetching or subscribing.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("I/O error on {resource}: {source}")]
    Io {
        resource: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error on {resource}: {source}")]
    Http {
        resource: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {resource}")]
    Status { resource: String, status: u16 },

    #[error("watch error on {resource}: {source}")]
    Watch {
        resource: String,
        #[source]
        source: notify::Error,
    },

    #[error("source {0} does not support push notifications")]
    NotListenable(String),

    #[error("unsupported resource {resource} for source {source_name}")]
    UnsupportedResource {
        resource: String,
        source_name: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Failure raised by a translator or a factory.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML payload: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("factory failed: {0}")]
    Factory(BoxError),

    #[error("{0}")]
    Other(String),
}

impl TranslateError {
    /// Wrap any error raised while constructing an instance.
    pub fn factory<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        TranslateError::Factory(err.into())
    }
}

/// Wiring mistakes. These never reach an `ErrorHandler`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("service {0}: no source configured")]
    MissingSource(String),

    #[error("service {0}: no translator configured")]
    MissingTranslator(String),

    #[error("service {service}: source {source_name} is not listenable")]
    NotListenable { service: String, source_name: String },

    #[error("service {service}: subscription failed: {reason}")]
    Subscribe { service: String, reason: String },

    #[error("invalid cron expression {expression:?}: {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("polling interval must be greater than zero")]
    ZeroInterval,

    #[error("no tokio runtime is running")]
    NoRuntime,

    #[error("reload runtime has been shut down")]
    RuntimeShutDown,
}

/// A reload action failed to produce a verdict.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("versions {left} and {right} are not comparable")]
    Incomparable { left: String, right: String },

    #[error("cascaded reload of {service} failed: {source}")]
    Cascade {
        service: String,
        #[source]
        source: Box<ReloadError>,
    },

    #[error("action task panicked or was cancelled: {0}")]
    Join(String),

    #[error("{0}")]
    Other(String),
}

/// Failure surfaced by a reload when no `ErrorHandler` absorbed it.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("reload task failed to complete: {0}")]
    Join(String),
}

/// Failure while building a `ServiceHandle`.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("initial load of {service} failed: {source}")]
    InitialLoad {
        service: String,
        #[source]
        source: ReloadError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_error_keeps_source_message() {
        let err: ReloadError = SourceError::NotFound("/etc/missing".into()).into();
        assert_eq!(err.to_string(), "resource not found: /etc/missing");
    }

    #[test]
    fn factory_error_wraps_any_error() {
        let err = TranslateError::factory("port out of range");
        assert!(err.to_string().contains("port out of range"));
    }
}
