//! # homesync-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the [`KeyValueStore`](homesync_app::ports::KeyValueStore) port
//!   (the persisted local-storage equivalent holding auth material)
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//!
//! ## Dependency rule
//! Depends on `homesync-app` (for port traits) and `homesync-domain` (for errors).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod kv_store;
pub mod pool;
