//! # homesync-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum) — the server side of
//! the broadcast hub.
//!
//! ## Routes
//! - `POST /api/notify` — validate an envelope, stamp it, fan it out
//! - `GET  /api/events/stream` — Server-Sent Events, one `event:` per envelope type
//! - `GET  /ws` — WebSocket, one text message per envelope
//! - `GET  /health` — liveness
//!
//! ## Dependency rule
//! Depends on `homesync-app` (for the hub) and `homesync-domain` (for the
//! envelope type). Never leaks axum types into the core.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
pub mod ws;
