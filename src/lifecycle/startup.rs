//! Startup orchestration.
//!
//! # Responsibilities
//! - Build one service handle per configured resource
//! - Pick the source by resource kind, the translator by payload format
//! - Attach a polling or listening loader to each handle
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - One source instance is shared by all services of the same kind
//! - Services start in config order, not concurrently

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::schema::{PayloadFormat, ReloadMode, ReloaderConfig, ServiceConfig};
use crate::error::{BuildError, ConfigurationError, SourceError};
use crate::loader::{BackoffPolicy, LoaderHandle, ScheduleSpec};
use crate::runtime::ReloadRuntime;
use crate::service::{ErrorHandler, LoggingErrorHandler, ServiceHandle};
use crate::source::{FileSource, HttpSource, Source};
use crate::translate::{Json, Toml, Utf8};
use crate::version::ResourceId;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("service '{service}': {source}")]
    Configuration {
        service: String,
        source: ConfigurationError,
    },

    #[error("service '{service}': invalid url: {source}")]
    Url {
        service: String,
        source: url::ParseError,
    },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("HTTP source unavailable: {0}")]
    Http(#[from] SourceError),
}

/// A resource as the daemon holds it: parsed enough to prove it is valid.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Text(String),
    Json(serde_json::Value),
    Toml(toml::Value),
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Document::Text(text) => write!(f, "text, {} lines", text.lines().count()),
            Document::Json(value) => write!(f, "json {}", shape(value.is_object(), value.is_array())),
            Document::Toml(value) => write!(f, "toml {}", shape(value.is_table(), value.is_array())),
        }
    }
}

fn shape(is_map: bool, is_list: bool) -> &'static str {
    match (is_map, is_list) {
        (true, _) => "object",
        (_, true) => "array",
        _ => "scalar",
    }
}

/// A configured service and the loader driving it.
pub struct RunningService {
    pub handle: ServiceHandle<Document>,
    pub loader: LoaderHandle,
}

/// Build and start every configured service on `runtime`.
///
/// Dropping the returned services stops their loaders.
pub async fn start_services(
    config: &ReloaderConfig,
    runtime: &ReloadRuntime,
) -> Result<Vec<RunningService>, StartupError> {
    let file_source: Arc<dyn Source> = Arc::new(
        FileSource::new()
            .with_poll_interval(Duration::from_millis(config.sources.file_poll_interval_ms)),
    );
    let http_source: Arc<dyn Source> = Arc::new(HttpSource::new(Duration::from_secs(
        config.sources.http_timeout_secs,
    ))?);
    let error_handler: Arc<dyn ErrorHandler> = Arc::new(LoggingErrorHandler::new());
    let backoff = BackoffPolicy::from(&config.retry);

    let mut running = Vec::with_capacity(config.services.len());
    for service in &config.services {
        let (resource, source) = match (&service.path, &service.url) {
            (_, Some(raw)) => {
                let url = Url::parse(raw).map_err(|source| StartupError::Url {
                    service: service.name.clone(),
                    source,
                })?;
                (ResourceId::Url(url), http_source.clone())
            }
            (Some(path), None) => (ResourceId::Path(PathBuf::from(path)), file_source.clone()),
            (None, None) => {
                return Err(configuration(
                    service,
                    ConfigurationError::MissingSource(service.name.clone()),
                ))
            }
        };

        let builder = ServiceHandle::<Document>::builder(&service.name, resource)
            .shared_source(source)
            .shared_error_handler(error_handler.clone());
        let builder = match service.format {
            PayloadFormat::Text => builder.translator_with(Utf8, |text| Ok(Document::Text(text))),
            PayloadFormat::Json => builder.translator_with(Json::<serde_json::Value>::new(), |v| {
                Ok(Document::Json(v))
            }),
            PayloadFormat::Toml => builder.translator_with(Toml::<toml::Value>::new(), |v| {
                Ok(Document::Toml(v))
            }),
        };
        let handle = builder.build(runtime).await?;

        let loader = match service.mode {
            ReloadMode::Poll => handle.start_polling(schedule_for(service)?),
            ReloadMode::Listen => handle.start_listening(backoff.clone()),
        }
        .map_err(|e| configuration(service, e))?;

        tracing::info!(
            service = %service.name,
            document = %handle.current_instance(),
            loader = %loader.id(),
            "Service started"
        );
        running.push(RunningService { handle, loader });
    }

    Ok(running)
}

fn schedule_for(service: &ServiceConfig) -> Result<ScheduleSpec, StartupError> {
    let schedule = match (&service.cron, service.interval_secs) {
        (Some(expression), _) => ScheduleSpec::cron(expression),
        (None, Some(secs)) => ScheduleSpec::interval(Duration::from_secs(secs)),
        (None, None) => ScheduleSpec::interval(DEFAULT_POLL_INTERVAL),
    };
    schedule.map_err(|e| configuration(service, e))
}

fn configuration(service: &ServiceConfig, source: ConfigurationError) -> StartupError {
    StartupError::Configuration {
        service: service.name.clone(),
        source,
    }
}
