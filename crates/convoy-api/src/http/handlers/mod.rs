//! HTTP request handlers for the control surface.

pub mod control;
pub mod page;
pub mod ws;
