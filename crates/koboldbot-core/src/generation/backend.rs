//! GenerationBackend trait definition.
//!
//! The seam between the turn flow and a concrete text-generation server.
//! `probe_model` uses RPITIT; `stream_tokens` returns a boxed stream so the
//! trait can be erased behind `BoxGenerationBackend`.

use std::pin::Pin;

use futures_util::Stream;

use koboldbot_types::generation::{GenerateRequest, GenerationError};

/// Raw token stream from a backend: one item per streamed event, in
/// arrival order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send + 'static>>;

/// Trait for streaming text-generation backends (KoboldCpp and compatibles).
///
/// Implementations live in koboldbot-infra (e.g., `KoboldBackend`).
pub trait GenerationBackend: Send + Sync {
    /// Human-readable backend name (e.g., "koboldcpp").
    fn name(&self) -> &str;

    /// Issue one streaming generation call.
    ///
    /// Nothing is sent until the stream is first polled. Dropping the stream
    /// closes the connection.
    fn stream_tokens(&self, request: GenerateRequest) -> TokenStream;

    /// Ask the backend which model it is serving. Used as a reachability probe.
    fn probe_model(
        &self,
    ) -> impl std::future::Future<Output = Result<String, GenerationError>> + Send;
}
