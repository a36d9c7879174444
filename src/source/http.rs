//! HTTP source using conditional GET.
//!
//! The version is the response `ETag` when present, otherwise its
//! `Last-Modified` date. Conditional loads send the matching validator and
//! treat `304 Not Modified` as "unchanged". Responses carrying neither header
//! are always considered changed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::StatusCode;
use url::Url;

use crate::error::SourceError;
use crate::source::{LoadedResource, Source};
use crate::version::{ResourceId, Version};

/// Fetches `ResourceId::Url` resources.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Build a source whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reloader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| SourceError::Http {
                resource: "<client>".to_string(),
                source,
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn url<'a>(&self, id: &'a ResourceId) -> Result<&'a Url, SourceError> {
        match id {
            ResourceId::Url(u) => Ok(u),
            other => Err(SourceError::UnsupportedResource {
                resource: other.to_string(),
                source_name: self.describe(),
            }),
        }
    }

    async fn fetch(
        &self,
        url: &Url,
        version: &Version,
    ) -> Result<Option<LoadedResource>, SourceError> {
        let mut request = self.client.get(url.clone());
        match version {
            Version::ETag(tag) => request = request.header(IF_NONE_MATCH, tag.as_str()),
            Version::Modified(at) => request = request.header(IF_MODIFIED_SINCE, http_date(at)),
            _ => {}
        }

        let http_error = |source: reqwest::Error| SourceError::Http {
            resource: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(http_error)?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            tracing::debug!(url = %url, "Resource not modified");
            return Ok(None);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                resource: url.to_string(),
                status: status.as_u16(),
            });
        }

        let new_version = version_from_headers(response.headers());
        let payload = response.bytes().await.map_err(http_error)?;
        Ok(Some(LoadedResource::new(
            payload.to_vec(),
            new_version,
            format!("http:{}", url),
        )))
    }
}

fn http_date(at: &DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn version_from_headers(headers: &HeaderMap) -> Version {
    if let Some(tag) = headers.get(ETAG).and_then(|v| v.to_str().ok()) {
        return Version::ETag(tag.to_string());
    }
    headers
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|t| Version::Modified(t.with_timezone(&Utc)))
        .unwrap_or_default()
}

#[async_trait]
impl Source for HttpSource {
    async fn load_if_modified(
        &self,
        id: &ResourceId,
        version: &Version,
    ) -> Result<Option<LoadedResource>, SourceError> {
        let url = self.url(id)?;
        match self.fetch(url, version).await? {
            Some(loaded) if !version.is_empty() && loaded.version == *version => Ok(None),
            other => Ok(other),
        }
    }

    async fn load(&self, id: &ResourceId) -> Result<LoadedResource, SourceError> {
        let url = self.url(id)?;
        self.fetch(url, &Version::Empty)
            .await?
            .ok_or_else(|| SourceError::Other(format!("unexpected 304 from {}", url)))
    }

    fn describe(&self) -> String {
        "http".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    #[test]
    fn etag_wins_over_last_modified() {
        let mut headers = HeaderMap::new();
        headers.insert(ETAG, HeaderValue::from_static("\"v1\""));
        headers.insert(
            LAST_MODIFIED,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(version_from_headers(&headers), Version::ETag("\"v1\"".into()));
    }

    #[test]
    fn last_modified_round_trips_through_http_date() {
        let at = Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(LAST_MODIFIED, HeaderValue::from_str(&http_date(&at)).unwrap());
        assert_eq!(version_from_headers(&headers), Version::Modified(at));
    }

    #[test]
    fn no_validators_means_empty_version() {
        assert_eq!(version_from_headers(&HeaderMap::new()), Version::Empty);
    }

    #[tokio::test]
    async fn http_source_is_not_listenable() {
        let source = HttpSource::new(Duration::from_secs(1)).unwrap();
        assert!(!source.is_listenable());
        let err = source.load(&ResourceId::named("x")).await.unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedResource { .. }));
    }
}
