//! SSE stream adapter for KoboldCpp's `/extra/generate/stream`.
//!
//! The server answers a generation request with a `text/event-stream` whose
//! events each carry `{"token": "..."}`. The stream ends when the server
//! closes the connection; dropping the returned stream closes it early.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use tracing::debug;

use koboldbot_core::generation::backend::TokenStream;
use koboldbot_types::generation::{GenerateRequest, GenerationError, TokenPayload};

/// Decode one event's `data` field into its token.
///
/// Returns `None` for events without data (keep-alives).
pub fn parse_token(data: &str) -> Option<Result<String, GenerationError>> {
    if data.trim().is_empty() {
        return None;
    }
    Some(
        serde_json::from_str::<TokenPayload>(data)
            .map(|payload| payload.token)
            .map_err(|e| GenerationError::Deserialization(format!("bad token event: {e}"))),
    )
}

/// Open a streaming generation against `url`.
///
/// Nothing is sent until the returned stream is first polled.
pub fn create_kobold_stream(
    client: &reqwest::Client,
    url: &str,
    request: GenerateRequest,
) -> TokenStream {
    let client = client.clone();
    let url = url.to_string();

    Box::pin(async_stream::try_stream! {
        let response = client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            Err::<(), _>(GenerationError::Status { status: status.as_u16(), body })?;
            return;
        }
        debug!(url = %url, "Generation stream opened");

        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| GenerationError::Transport(e.to_string()))?;
            if let Some(token) = parse_token(&event.data) {
                let token = token?;
                yield token;
            }
        }
    })
}
