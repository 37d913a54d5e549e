//! Delivery event distribution.

pub mod bus;
