//! HTTP source against a programmable backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reloader::service::{ErrorHandler, LoggingErrorHandler};
use reloader::source::HttpSource;
use reloader::translate::Utf8;
use reloader::{ResourceId, ServiceHandle, Version};

mod common;

use common::MockResponse;

fn source() -> HttpSource {
    HttpSource::with_client(
        reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn test_etag_drives_conditional_reload() {
    let revision = Arc::new(AtomicU32::new(1));
    let conditional_hits = Arc::new(AtomicU32::new(0));

    let rev = revision.clone();
    let hits = conditional_hits.clone();
    let addr = common::start_programmable_backend(move |head| {
        let rev = rev.clone();
        let hits = hits.clone();
        async move {
            let current = rev.load(Ordering::SeqCst);
            let tag = format!("\"v{}\"", current);
            if common::header(&head, "if-none-match") == Some(tag.as_str()) {
                hits.fetch_add(1, Ordering::SeqCst);
                return MockResponse::status(304);
            }
            MockResponse::ok(&format!("revision {}", current)).with_header("ETag", tag)
        }
    })
    .await;

    let runtime = common::runtime();
    let url = format!("http://{}/motd", addr).parse().unwrap();
    let handle = ServiceHandle::builder("motd", ResourceId::Url(url))
        .source(source())
        .translator(Utf8)
        .build(&runtime)
        .await
        .unwrap();

    assert_eq!(*handle.current_instance(), "revision 1");
    assert_eq!(handle.current_version(), Version::ETag("\"v1\"".to_string()));

    assert!(!handle.reload(false).await.unwrap());
    assert_eq!(conditional_hits.load(Ordering::SeqCst), 1);

    revision.store(2, Ordering::SeqCst);
    assert!(handle.reload(false).await.unwrap());
    assert_eq!(*handle.current_instance(), "revision 2");
    assert_eq!(handle.current_version(), Version::ETag("\"v2\"".to_string()));
}

#[tokio::test]
async fn test_server_errors_reach_error_handler() {
    let status = Arc::new(Mutex::new(200u16));
    let current = status.clone();
    let addr = common::start_programmable_backend(move |_| {
        let code = *current.lock().unwrap();
        async move {
            if code == 200 {
                MockResponse::ok("up")
            } else {
                MockResponse::status(code)
            }
        }
    })
    .await;

    let runtime = common::runtime();
    let handler = Arc::new(LoggingErrorHandler::new());
    let url = format!("http://{}/status", addr).parse().unwrap();
    let handle = ServiceHandle::builder("status", ResourceId::Url(url))
        .source(source())
        .translator(Utf8)
        .shared_error_handler(handler.clone() as Arc<dyn ErrorHandler>)
        .build(&runtime)
        .await
        .unwrap();
    // No validators: every successful response counts as a change.
    assert_eq!(handle.current_version(), Version::Empty);

    *status.lock().unwrap() = 503;
    assert!(!handle.reload(false).await.unwrap());
    *status.lock().unwrap() = 404;
    assert!(!handle.reload(false).await.unwrap());

    assert_eq!(handler.source_failures(), 2);
    assert_eq!(handler.translate_failures(), 0);
    assert_eq!(*handle.current_instance(), "up");
}
