//! KoboldBackend -- concrete [`GenerationBackend`] for a KoboldCpp server.

use koboldbot_core::generation::backend::{GenerationBackend, TokenStream};
use koboldbot_types::generation::{GenerateRequest, GenerationError};
use serde::Deserialize;

use super::streaming::create_kobold_stream;

/// Streaming client for the KoboldCpp HTTP API.
///
/// No request timeout is set: a generation runs as long as the server keeps
/// the event stream open or until the caller drops the stream.
pub struct KoboldBackend {
    client: reqwest::Client,
    base_url: String,
}

/// Response of `GET /v1/model`.
#[derive(Debug, Deserialize)]
struct ModelResponse {
    result: String,
}

impl KoboldBackend {
    /// Create a backend for the API rooted at `base_url`
    /// (e.g. `http://127.0.0.1:5000/api`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a backend sharing an existing HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the full API URL for a given path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl GenerationBackend for KoboldBackend {
    fn name(&self) -> &str {
        "koboldcpp"
    }

    fn stream_tokens(&self, request: GenerateRequest) -> TokenStream {
        let url = self.url("/extra/generate/stream");
        create_kobold_stream(&self.client, &url, request)
    }

    async fn probe_model(&self) -> Result<String, GenerationError> {
        let response = self
            .client
            .get(self.url("/v1/model"))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let model: ModelResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Deserialization(format!("failed to parse model: {e}")))?;
        Ok(model.result)
    }
}
