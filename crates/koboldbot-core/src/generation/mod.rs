//! Streaming generation for koboldbot.
//!
//! - `GenerationBackend`: RPITIT trait for concrete backends
//! - `BoxGenerationBackend`: object-safe wrapper for dynamic dispatch
//! - `SentenceSegmenter`: token-to-sentence state machine
//! - `generate`: one backend call as a stream of `GenerationEvent`s

pub mod backend;
pub mod box_backend;
pub mod segmenter;
pub mod stream;

#[cfg(test)]
pub(crate) mod fake;
