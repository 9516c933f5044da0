//! # homesync-domain
//!
//! Pure domain model for the homesync dashboard state engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Entity records** (a controllable device or logical channel and
//!   its last-known attribute set)
//! - Define the **typed attribute model** (closed set of known attribute
//!   names, scalar values, significance rules)
//! - Define **push frames** received from remote sources and the
//!   **broadcast envelopes** fanned out by the hub
//! - Define the **music** pseudo-entity model and **auth** material
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod auth;
pub mod entity;
pub mod envelope;
pub mod frame;
pub mod music;
