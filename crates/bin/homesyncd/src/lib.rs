//! # homesyncd — homesync daemon
//!
//! Composition root that wires all adapters together and starts the
//! broadcast hub and the client sync engine.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Open the `SQLite` key-value store and restore the auth session
//! - Start the client engine against the configured relay: state store,
//!   SSE transport, polling fallback, base-URL follower
//! - Build the axum router for the broadcast hub, bind and serve
//! - Handle graceful shutdown (Ctrl-C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

pub mod config;
pub mod engine;
