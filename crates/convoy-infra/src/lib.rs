//! Infrastructure layer for Convoy.
//!
//! Contains implementations of the ports defined in `convoy-core`:
//! the file-backed delivery plan, the `convoy.toml` settings loader, and the
//! HTTP account gateway transport.

pub mod config;
pub mod gateway;
pub mod plan_source;
