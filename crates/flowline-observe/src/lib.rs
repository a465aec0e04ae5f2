//! Observability setup shared by Flowline binaries.

pub mod tracing_setup;
