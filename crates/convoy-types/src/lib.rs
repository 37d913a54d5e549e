//! Shared domain types for Convoy.
//!
//! This crate contains the domain types used across the Convoy workspace:
//! credentials, the delivery plan, engine settings, status reporting,
//! delivery events, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, secrecy.

pub mod credential;
pub mod error;
pub mod event;
pub mod plan;
pub mod settings;
pub mod status;
