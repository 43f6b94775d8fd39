//! BoxGenerationBackend -- object-safe dynamic dispatch wrapper for
//! GenerationBackend.
//!
//! 1. `GenerationBackendDyn` is the object-safe mirror with boxed futures
//! 2. Blanket-impl `GenerationBackendDyn` for all `T: GenerationBackend`
//! 3. `BoxGenerationBackend` wraps `Box<dyn GenerationBackendDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use koboldbot_types::generation::{GenerateRequest, GenerationError};

use super::backend::{GenerationBackend, TokenStream};

/// Object-safe version of [`GenerationBackend`] with boxed futures.
pub trait GenerationBackendDyn: Send + Sync {
    fn name(&self) -> &str;

    fn stream_tokens_boxed(&self, request: GenerateRequest) -> TokenStream;

    fn probe_model_boxed<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;
}

impl<T: GenerationBackend> GenerationBackendDyn for T {
    fn name(&self) -> &str {
        GenerationBackend::name(self)
    }

    fn stream_tokens_boxed(&self, request: GenerateRequest) -> TokenStream {
        self.stream_tokens(request)
    }

    fn probe_model_boxed<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        Box::pin(self.probe_model())
    }
}

/// Type-erased generation backend for runtime selection.
///
/// Since `GenerationBackend` uses RPITIT it cannot be a trait object
/// directly; this wrapper exposes the same methods over a
/// `GenerationBackendDyn` trait object.
pub struct BoxGenerationBackend {
    inner: Box<dyn GenerationBackendDyn + Send + Sync>,
}

impl BoxGenerationBackend {
    pub fn new<T: GenerationBackend + 'static>(backend: T) -> Self {
        Self {
            inner: Box::new(backend),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Issue one streaming generation call. Returns the raw token stream.
    pub fn stream_tokens(&self, request: GenerateRequest) -> TokenStream {
        self.inner.stream_tokens_boxed(request)
    }

    /// Ask the backend which model it is serving.
    pub async fn probe_model(&self) -> Result<String, GenerationError> {
        self.inner.probe_model_boxed().await
    }
}
