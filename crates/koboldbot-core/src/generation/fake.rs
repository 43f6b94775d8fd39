//! Scripted in-memory backends for the core unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures_util::{StreamExt, stream};

use koboldbot_types::generation::{GenerateRequest, GenerationError};

use super::backend::{GenerationBackend, TokenStream};

/// What the scripted stream does after its last token.
#[derive(Debug, Clone)]
pub enum Ending {
    /// Close the stream.
    Close,
    /// Never yield again (an open connection that stays silent).
    Hang,
    /// Fail with a transport error.
    Fail(String),
}

/// Set when the stream is dropped, i.e. the connection is closed.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct ScriptedBackend {
    tokens: Vec<String>,
    ending: Ending,
    pub closed: Arc<AtomicBool>,
    pub calls: Arc<AtomicUsize>,
    pub last_prompt: Arc<std::sync::Mutex<Option<String>>>,
}

impl ScriptedBackend {
    pub fn new(tokens: &[&str], ending: Ending) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ending,
            closed: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(AtomicUsize::new(0)),
            last_prompt: Arc::new(std::sync::Mutex::new(None)),
        }
    }
}

impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn stream_tokens(&self, request: GenerateRequest) -> TokenStream {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(request.prompt);

        let flag = DropFlag(self.closed.clone());
        let head = stream::iter(self.tokens.clone().into_iter().map(Ok));
        let tail: TokenStream = match &self.ending {
            Ending::Close => Box::pin(stream::empty()),
            Ending::Hang => Box::pin(stream::pending()),
            Ending::Fail(message) => Box::pin(stream::once(std::future::ready(Err(
                GenerationError::Transport(message.clone()),
            )))),
        };

        Box::pin(head.chain(tail).map(move |item| {
            let _keep = &flag;
            item
        }))
    }

    async fn probe_model(&self) -> Result<String, GenerationError> {
        Ok("scripted/test-model".to_string())
    }
}
