//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, jitter within [0, 1])
//! - Check that each service names exactly one resource and a usable schedule
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ReloaderConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{ReloadMode, ReloaderConfig, ServiceConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("runtime.max_concurrent_reloads must be at least 1")]
    NoReloadSlots,

    #[error("unknown log level '{0}'")]
    LogLevel(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("retry.multiplier must be at least 1.0")]
    Multiplier,

    #[error("retry.jitter_ratio must be within 0.0 and 1.0")]
    JitterRatio,

    #[error("retry.initial_delay_ms must be greater than zero")]
    InitialDelay,

    #[error("service name must not be empty")]
    EmptyName,

    #[error("service '{0}' is defined more than once")]
    DuplicateService(String),

    #[error("service '{0}' needs exactly one of path or url")]
    Resource(String),

    #[error("service '{name}': invalid url: {reason}")]
    Url { name: String, reason: String },

    #[error("service '{0}': HTTP resources cannot be listened to")]
    ListenOnHttp(String),

    #[error("service '{0}': interval_secs must be greater than zero")]
    ZeroInterval(String),

    #[error("service '{0}': set interval_secs or cron, not both")]
    ScheduleConflict(String),

    #[error("service '{0}': schedule settings only apply in poll mode")]
    ScheduleInListenMode(String),

    #[error("service '{name}': invalid cron '{expression}': {reason}")]
    Cron {
        name: String,
        expression: String,
        reason: String,
    },
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &ReloaderConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.runtime.max_concurrent_reloads == 0 {
        errors.push(ValidationError::NoReloadSlots);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.retry.multiplier < 1.0 || config.retry.multiplier.is_nan() {
        errors.push(ValidationError::Multiplier);
    }
    if !(0.0..=1.0).contains(&config.retry.jitter_ratio) {
        errors.push(ValidationError::JitterRatio);
    }
    if config.retry.initial_delay_ms == 0 {
        errors.push(ValidationError::InitialDelay);
    }

    let mut seen = HashSet::new();
    for service in &config.services {
        if service.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
        } else if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        validate_service(service, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_service(service: &ServiceConfig, errors: &mut Vec<ValidationError>) {
    let name = &service.name;

    match (&service.path, &service.url) {
        (Some(_), None) => {}
        (None, Some(raw)) => {
            if let Err(e) = url::Url::parse(raw) {
                errors.push(ValidationError::Url {
                    name: name.clone(),
                    reason: e.to_string(),
                });
            }
            if service.mode == ReloadMode::Listen {
                errors.push(ValidationError::ListenOnHttp(name.clone()));
            }
        }
        _ => errors.push(ValidationError::Resource(name.clone())),
    }

    match service.mode {
        ReloadMode::Poll => {
            if service.interval_secs.is_some() && service.cron.is_some() {
                errors.push(ValidationError::ScheduleConflict(name.clone()));
            }
            if service.interval_secs == Some(0) {
                errors.push(ValidationError::ZeroInterval(name.clone()));
            }
            if let Some(expression) = &service.cron {
                if let Err(e) = cron::Schedule::from_str(expression) {
                    errors.push(ValidationError::Cron {
                        name: name.clone(),
                        expression: expression.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        ReloadMode::Listen => {
            if service.interval_secs.is_some() || service.cron.is_some() {
                errors.push(ValidationError::ScheduleInListenMode(name.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PayloadFormat;

    fn service(name: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            path: Some(format!("/tmp/{name}")),
            url: None,
            format: PayloadFormat::Text,
            mode: ReloadMode::Poll,
            interval_secs: None,
            cron: None,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ReloaderConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ReloaderConfig::default();
        config.retry.multiplier = 0.0;
        config.retry.jitter_ratio = 1.5;

        let mut both = service("both");
        both.url = Some("https://example.com".to_string());
        let mut zero = service("zero");
        zero.interval_secs = Some(0);
        config.services = vec![service("dup"), service("dup"), both, zero];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::Multiplier));
        assert!(errors.contains(&ValidationError::JitterRatio));
        assert!(errors.contains(&ValidationError::DuplicateService("dup".to_string())));
        assert!(errors.contains(&ValidationError::Resource("both".to_string())));
        assert!(errors.contains(&ValidationError::ZeroInterval("zero".to_string())));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn shrinking_multiplier_is_rejected() {
        let mut config = ReloaderConfig::default();
        config.retry.multiplier = 0.5;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::Multiplier])
        );

        config.retry.multiplier = 1.0;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn listen_mode_rejects_http_and_schedules() {
        let mut http = service("remote");
        http.path = None;
        http.url = Some("https://example.com/flags".to_string());
        http.mode = ReloadMode::Listen;

        let mut scheduled = service("local");
        scheduled.mode = ReloadMode::Listen;
        scheduled.interval_secs = Some(5);

        let config = ReloaderConfig {
            services: vec![http, scheduled],
            ..ReloaderConfig::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ListenOnHttp("remote".to_string()),
                ValidationError::ScheduleInListenMode("local".to_string()),
            ]
        );
    }

    #[test]
    fn bad_cron_is_reported() {
        let mut svc = service("cron");
        svc.cron = Some("not a cron".to_string());
        let config = ReloaderConfig {
            services: vec![svc],
            ..ReloaderConfig::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::Cron { .. }));
    }
}
