//! The delivery loop: sequencing state and the engine that drives ticks.

pub mod engine;
pub mod state;

pub use engine::DeliveryEngine;
