//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

use reloader::action::ReloadAction;
use reloader::config::RuntimeConfig;
use reloader::error::{ActionError, SourceError};
use reloader::source::{ChangeCallback, LoadedResource, MemorySource, Subscription};
use reloader::translate::Utf8;
use reloader::{ReloadRuntime, Reloadable, ResourceId, ServiceHandle, Source};

pub fn runtime() -> ReloadRuntime {
    ReloadRuntime::new(&RuntimeConfig::default()).unwrap()
}

pub fn runtime_with_slots(max_concurrent_reloads: usize) -> ReloadRuntime {
    ReloadRuntime::new(&RuntimeConfig { max_concurrent_reloads }).unwrap()
}

/// Build a `String` service over a fresh memory resource holding `initial`.
pub async fn text_service(
    runtime: &ReloadRuntime,
    name: &str,
    initial: &str,
) -> (ServiceHandle<String>, MemorySource, ResourceId) {
    let id = ResourceId::named(name);
    let source = MemorySource::with(id.clone(), initial);
    let handle = ServiceHandle::builder(name, id.clone())
        .source(source.clone())
        .translator(Utf8)
        .build(runtime)
        .await
        .unwrap();
    (handle, source, id)
}

/// In-memory source whose loads can be made to fail, with manual change
/// notifications and a record of when each load happened.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    data: MemorySource,
    failures_left: Arc<AtomicU32>,
    loads: Arc<Mutex<Vec<Instant>>>,
    callbacks: Arc<Mutex<Vec<ChangeCallback>>>,
}

impl ScriptedSource {
    pub fn new(id: &ResourceId, payload: &str) -> Self {
        let source = Self::default();
        source.data.set(id.clone(), payload);
        source
    }

    /// Make the next `n` loads fail.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Change the contents without notifying anyone.
    pub fn set_quietly(&self, id: &ResourceId, payload: &str) {
        self.data.set(id.clone(), payload);
    }

    /// Fire every subscribed callback.
    pub fn poke(&self) {
        let callbacks = self.callbacks.lock().unwrap().clone();
        for callback in callbacks {
            callback();
        }
    }

    pub fn update(&self, id: &ResourceId, payload: &str) {
        self.set_quietly(id, payload);
        self.poke();
    }

    pub fn load_times(&self) -> Vec<Instant> {
        self.loads.lock().unwrap().clone()
    }

    pub fn clear_load_times(&self) {
        self.loads.lock().unwrap().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.lock().unwrap().len()
    }
}

#[async_trait]
impl Source for ScriptedSource {
    async fn load(&self, id: &ResourceId) -> Result<LoadedResource, SourceError> {
        self.loads.lock().unwrap().push(Instant::now());
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SourceError::Other("scripted failure".to_string()));
        }
        self.data.load(id).await
    }

    fn is_listenable(&self) -> bool {
        true
    }

    fn subscribe(&self, _id: &ResourceId, on_change: ChangeCallback) -> Result<Subscription, SourceError> {
        let callbacks = self.callbacks.clone();
        callbacks.lock().unwrap().push(on_change.clone());
        Ok(Subscription::new(move || {
            callbacks
                .lock()
                .unwrap()
                .retain(|cb| !Arc::ptr_eq(cb, &on_change));
        }))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Action returning a fixed verdict and counting its runs.
pub struct CountingAction {
    verdict: Result<bool, ()>,
    delay: Duration,
    runs: Arc<AtomicUsize>,
}

impl CountingAction {
    pub fn returning(verdict: bool) -> (Self, Arc<AtomicUsize>) {
        Self::build(Ok(verdict), Duration::ZERO)
    }

    pub fn failing() -> (Self, Arc<AtomicUsize>) {
        Self::build(Err(()), Duration::ZERO)
    }

    pub fn slow(verdict: bool, delay: Duration) -> (Self, Arc<AtomicUsize>) {
        Self::build(Ok(verdict), delay)
    }

    fn build(verdict: Result<bool, ()>, delay: Duration) -> (Self, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (
            Self {
                verdict,
                delay,
                runs: runs.clone(),
            },
            runs,
        )
    }
}

#[async_trait]
impl ReloadAction for CountingAction {
    async fn run(&self, _target: Arc<dyn Reloadable>) -> Result<bool, ActionError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.verdict
            .map_err(|_| ActionError::Other("counting action failed".to_string()))
    }
}

/// Poll `condition` until it holds or `limit` elapses.
pub async fn eventually<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// A response from the programmable backend.
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl MockResponse {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }
}

/// Start a programmable HTTP backend on an ephemeral port.
///
/// `f` receives the raw request head (request line plus headers).
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockResponse> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut head = Vec::new();
                        let mut buf = [0u8; 1024];
                        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => head.extend_from_slice(&buf[..n]),
                            }
                        }

                        let response = f(String::from_utf8_lossy(&head).into_owned()).await;
                        let status_text = match response.status {
                            200 => "200 OK",
                            304 => "304 Not Modified",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let mut out = format!("HTTP/1.1 {}\r\n", status_text);
                        for (name, value) in &response.headers {
                            out.push_str(&format!("{}: {}\r\n", name, value));
                        }
                        out.push_str(&format!(
                            "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.body.len(),
                            response.body
                        ));
                        let _ = socket.write_all(out.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Case-insensitive header lookup in a raw request head.
pub fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
    })
}
