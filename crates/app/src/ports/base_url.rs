//! Base-URL port — where the remote side can currently be reached.

/// Supplies the current reachable `scheme://host:port`.
///
/// The value may change at runtime (the host's address moved); see
/// [`SharedBaseUrl`](crate::base_url::SharedBaseUrl) for a watchable source.
pub trait BaseUrlProvider: Send + Sync {
    fn base_url(&self) -> String;
}
