//! Streaming generation: raw tokens in, sentence-aligned emissions out.
//!
//! One call to [`generate`] issues exactly one backend request. The returned
//! stream yields a [`GenerationEvent::Boundary`] each time a sentence
//! completes and a single [`GenerationEvent::Finished`] when the backend
//! closes the stream or the token budget runs out. A transport error ends
//! the stream with `Err` and no `Finished` event.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tracing::{debug, info_span};

use koboldbot_types::generation::{
    FinishReason, GenerateRequest, GenerationError, GenerationEvent,
};

use super::backend::TokenStream;
use super::box_backend::BoxGenerationBackend;
use super::segmenter::SentenceSegmenter;

/// Boxed stream of generation events.
pub type GenerationEventStream =
    Pin<Box<dyn Stream<Item = Result<GenerationEvent, GenerationError>> + Send + 'static>>;

/// Start one generation for `request`.
///
/// The backend request is issued lazily on first poll. Dropping the stream
/// before it finishes closes the backend connection.
pub fn generate(backend: &BoxGenerationBackend, request: GenerateRequest) -> GenerationEventStream {
    let span = info_span!(
        "koboldbot.generate",
        backend = backend.name(),
        max_length = request.token_budget(),
        prompt_chars = request.prompt.len(),
    );
    let budget = request.token_budget();
    let tokens = backend.stream_tokens(request);

    Box::pin(StreamInSpan::new(segment(tokens, budget), span))
}

fn segment(
    mut tokens: TokenStream,
    budget: u32,
) -> impl Stream<Item = Result<GenerationEvent, GenerationError>> + Send + 'static {
    async_stream::try_stream! {
        let mut segmenter = SentenceSegmenter::new(budget);

        let reason = loop {
            if segmenter.is_exhausted() {
                break FinishReason::TokenBudget;
            }
            match tokens.next().await {
                Some(token) => {
                    let token = token?;
                    if let Some(text) = segmenter.push(&token) {
                        yield GenerationEvent::Boundary(text);
                    }
                }
                None => break FinishReason::BackendClosed,
            }
        };
        // Stop reading before the final event so a budget cutoff closes
        // the connection right away.
        drop(tokens);

        let token_count = segmenter.token_count();
        let text = segmenter.finish();
        debug!(%reason, tokens = token_count, chars = text.len(), "Generation finished");
        yield GenerationEvent::Finished { text, reason };
    }
}

pin_project_lite::pin_project! {
    /// Keeps a tracing span entered while the wrapped stream is polled, so
    /// every event logged by the stream is attributed to the generation.
    pub struct StreamInSpan<S> {
        #[pin]
        inner: S,
        span: tracing::Span,
    }
}

impl<S> StreamInSpan<S> {
    pub fn new(inner: S, span: tracing::Span) -> Self {
        Self { inner, span }
    }
}

impl<S: Stream> Stream for StreamInSpan<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let _enter = this.span.enter();
        this.inner.poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::generation::fake::{Ending, ScriptedBackend};
    use koboldbot_types::generation::SamplingConfig;

    fn request(max_length: u32) -> GenerateRequest {
        let sampling = SamplingConfig {
            max_length,
            ..SamplingConfig::default()
        };
        GenerateRequest::new(sampling, "### Instruction:\nalice: Hello")
    }

    async fn collect(stream: GenerationEventStream) -> Vec<Result<GenerationEvent, GenerationError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_boundary_emissions_then_finished() {
        let backend = BoxGenerationBackend::new(ScriptedBackend::new(
            &["Hello", " world", ".", " Bye", "."],
            Ending::Close,
        ));

        let events: Vec<GenerationEvent> = collect(generate(&backend, request(100)))
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(
            events,
            vec![
                GenerationEvent::Boundary("Hello world.".to_string()),
                GenerationEvent::Boundary("Hello world. Bye.".to_string()),
                GenerationEvent::Finished {
                    text: "Hello world. Bye.".to_string(),
                    reason: FinishReason::BackendClosed,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_token_budget_stops_without_backend_closure() {
        let scripted = ScriptedBackend::new(&["a", "b", "c"], Ending::Hang);
        let closed = scripted.closed.clone();
        let backend = BoxGenerationBackend::new(scripted);

        let events = tokio::time::timeout(
            Duration::from_secs(5),
            collect(generate(&backend, request(3))),
        )
        .await
        .expect("generation must stop at the token budget");

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &GenerationEvent::Finished {
                text: String::new(),
                reason: FinishReason::TokenBudget,
            }
        );
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_transport_failure_after_partial_output() {
        let backend = BoxGenerationBackend::new(ScriptedBackend::new(
            &["Fine.", " Then"],
            Ending::Fail("connection reset".to_string()),
        ));

        let events = collect(generate(&backend, request(100))).await;

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &GenerationEvent::Boundary("Fine.".to_string())
        );
        assert!(matches!(events[1], Err(GenerationError::Transport(_))));
    }

    #[tokio::test]
    async fn test_one_backend_call_per_generation() {
        let scripted = ScriptedBackend::new(&["Ok."], Ending::Close);
        let calls = scripted.calls.clone();
        let prompt = scripted.last_prompt.clone();
        let backend = BoxGenerationBackend::new(scripted);

        let _ = collect(generate(&backend, request(100))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            prompt.lock().unwrap().as_deref(),
            Some("### Instruction:\nalice: Hello")
        );
    }

    #[tokio::test]
    async fn test_dropping_stream_closes_backend() {
        let scripted = ScriptedBackend::new(&["One."], Ending::Hang);
        let closed = scripted.closed.clone();
        let backend = BoxGenerationBackend::new(scripted);

        let mut stream = generate(&backend, request(100));
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, GenerationEvent::Boundary("One.".to_string()));
        assert!(!closed.load(Ordering::SeqCst));

        drop(stream);
        assert!(closed.load(Ordering::SeqCst));
    }
}
