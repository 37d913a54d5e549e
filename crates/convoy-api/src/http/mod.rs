//! HTTP control surface for Convoy.
//!
//! Axum-based REST API at `/api/v1/` with envelope responses, plus the
//! `/ws/events` delivery event stream.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
