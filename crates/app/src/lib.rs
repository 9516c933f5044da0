//! # homesync-app
//!
//! Application core — the state-sync engine and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Own entity state: [`store::StateStore`] (timestamp ordering, debounced
//!   notification, interaction locks, staleness)
//! - Fan changes out to listeners: [`subscriptions::SubscriptionFabric`]
//! - Apply user gestures optimistically: [`coordinator::OptimisticCoordinator`]
//! - Keep one push connection alive: [`transport::TransportController`] with
//!   [`backoff::Backoff`], routing frames through [`dispatcher::FrameDispatcher`]
//! - Fan envelopes out to push clients: [`broadcast_hub::BroadcastHub`]
//! - Define **port traits** adapters implement: remote commands, push
//!   connectors, snapshots, token refresh, key-value persistence
//!
//! ## Dependency rule
//! Depends on `homesync-domain` only (plus `tokio` for timers and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod auth;
pub mod backoff;
pub mod base_url;
pub mod broadcast_hub;
pub mod coordinator;
pub mod dispatcher;
pub mod key_value;
pub mod polling;
pub mod ports;
pub mod stale_null;
pub mod store;
pub mod subscriptions;
pub mod transport;
