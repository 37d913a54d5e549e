//! Observability setup for Convoy: log filtering, structured output and
//! optional OpenTelemetry span export.

pub mod tracing_setup;
