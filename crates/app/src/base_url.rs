//! Watchable base URL and the task that redials when it moves.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ports::BaseUrlProvider;
use crate::transport::TransportHandle;

/// Current reachable `scheme://host:port`, shared by every consumer.
#[derive(Debug, Clone)]
pub struct SharedBaseUrl {
    sender: Arc<watch::Sender<String>>,
}

impl SharedBaseUrl {
    #[must_use]
    pub fn new(initial: impl Into<String>) -> Self {
        let (sender, _) = watch::channel(normalize(initial.into()));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish a new address. Returns `false` if it did not change.
    pub fn set(&self, url: impl Into<String>) -> bool {
        let url = normalize(url.into());
        self.sender.send_if_modified(|current| {
            if *current == url {
                false
            } else {
                tracing::info!(from = %current, to = %url, "base url changed");
                *current = url;
                true
            }
        })
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.sender.subscribe()
    }

    /// Join `path` onto the current base URL.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        join(&self.sender.borrow(), path)
    }
}

impl BaseUrlProvider for SharedBaseUrl {
    fn base_url(&self) -> String {
        self.sender.borrow().clone()
    }
}

fn normalize(url: String) -> String {
    match url.strip_suffix('/') {
        Some(trimmed) => trimmed.to_string(),
        None => url,
    }
}

/// Join `path` onto `base` with exactly one `/` between them.
#[must_use]
pub fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Dial the transport at the current address, then redial on every change.
///
/// The task ends when every [`SharedBaseUrl`] clone is dropped.
pub fn follow_base_url(
    base_url: &SharedBaseUrl,
    transport: TransportHandle,
    stream_path: impl Into<String>,
) -> JoinHandle<()> {
    let mut changes = base_url.subscribe();
    let stream_path = stream_path.into();
    tokio::spawn(async move {
        let initial = join(&changes.borrow_and_update(), &stream_path);
        transport.connect(initial);
        while changes.changed().await.is_ok() {
            let url = join(&changes.borrow_and_update(), &stream_path);
            transport.address_changed(url);
        }
        tracing::debug!("base url source dropped, no longer following");
    })
}
