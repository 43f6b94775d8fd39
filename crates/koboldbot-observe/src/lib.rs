//! Observability setup for koboldbot: subscriber installation and
//! OpenTelemetry trace export.

pub mod tracing_setup;
