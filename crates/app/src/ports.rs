//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the sync core and the outside world.
//! They are defined here (in `app`) so that both the core and the adapter
//! layer can depend on them without creating circular dependencies.

pub mod auth;
pub mod base_url;
pub mod command;
pub mod key_value;
pub mod snapshot;
pub mod transport;

pub use auth::TokenRefresher;
pub use base_url::BaseUrlProvider;
pub use command::{CommandRequest, Method, RemoteCommand, RemoteResponse};
pub use key_value::KeyValueStore;
pub use snapshot::SnapshotSource;
pub use transport::{FrameSink, FrameStream, PushConnector};
