//! Session pool manager and delivery loop for Convoy.
//!
//! This crate defines the "ports" (`SessionClient`, `Authenticator`,
//! `PlanSource`) that the infrastructure layer implements, plus the logic
//! built on top of them. It depends only on `convoy-types` -- never on
//! `convoy-infra` or any HTTP/filesystem crate.

pub mod compose;
pub mod delivery;
pub mod event;
pub mod plan;
pub mod session;
