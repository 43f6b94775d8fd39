//! KoboldCpp generation backend.
//!
//! [`KoboldBackend`] implements the
//! [`GenerationBackend`](koboldbot_core::generation::backend::GenerationBackend)
//! port against KoboldCpp's streaming endpoint (`/extra/generate/stream`),
//! which answers with server-sent events carrying one `token` each.

pub mod client;
pub mod streaming;

pub use client::KoboldBackend;
