//! # homesync-adapter-reqwest
//!
//! Client-side IO built on [reqwest](https://docs.rs/reqwest).
//!
//! - [`sse::SseConnector`] — [`PushConnector`](homesync_app::ports::PushConnector)
//!   reading a Server-Sent Events stream
//! - [`command::HttpCommandClient`] — [`RemoteCommand`](homesync_app::ports::RemoteCommand)
//!   over plain HTTP, `204` aware
//! - [`snapshot::HttpSnapshotSource`] — device and player snapshots for the
//!   polling fallback
//! - [`refresh::HttpTokenRefresher`] — exchanges a refresh token for fresh
//!   material
//!
//! Every client resolves its endpoint against a
//! [`BaseUrlProvider`](homesync_app::ports::BaseUrlProvider) on each call, so
//! an address change takes effect without rebuilding anything.

pub mod command;
pub mod error;
pub mod refresh;
pub mod snapshot;
pub mod sse;

#[cfg(test)]
pub(crate) mod test_server {
    use axum::Router;
    use homesync_app::ports::BaseUrlProvider;

    /// Base URL that never changes.
    pub struct Fixed(pub String);

    impl BaseUrlProvider for Fixed {
        fn base_url(&self) -> String {
            self.0.clone()
        }
    }

    /// Serve `router` on an ephemeral local port and return its base URL.
    pub async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }
}
