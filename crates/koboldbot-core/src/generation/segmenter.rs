//! Sentence segmentation of a raw token stream.
//!
//! Tokens are appended to a pending fragment. Whenever the fragment ends in
//! sentence-terminal punctuation (`.`, `?`, `!`), optionally followed by
//! whitespace, everything up to and including the punctuation is folded into
//! the accumulated response and the whole accumulated response is emitted.
//! The trailing whitespace seeds the next fragment so spacing between
//! sentences survives.

use std::sync::LazyLock;

use regex::Regex;

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.*[.?!])(\s*)$").expect("sentence pattern is valid")
});

/// Pure state machine behind the generation stream.
#[derive(Debug, Clone)]
pub struct SentenceSegmenter {
    accumulated: String,
    pending: String,
    tokens: u32,
    budget: u32,
}

impl SentenceSegmenter {
    /// `budget` is the number of tokens after which the segmenter reports
    /// itself exhausted.
    pub fn new(budget: u32) -> Self {
        Self {
            accumulated: String::new(),
            pending: String::new(),
            tokens: 0,
            budget,
        }
    }

    /// Feed one token. Returns the full accumulated text when the token
    /// completed a sentence.
    pub fn push(&mut self, token: &str) -> Option<String> {
        self.tokens = self.tokens.saturating_add(1);
        self.pending.push_str(token);

        let (sentence, trailing) = {
            let caps = SENTENCE_END.captures(&self.pending)?;
            let sentence = caps.get(1)?;
            let trailing = caps.get(2).map_or("", |m| m.as_str());
            (sentence.as_str().to_string(), trailing.to_string())
        };

        self.accumulated.push_str(&sentence);
        self.pending = trailing;
        Some(self.accumulated.clone())
    }

    /// Whether the token budget has been used up.
    pub fn is_exhausted(&self) -> bool {
        self.tokens >= self.budget
    }

    pub fn token_count(&self) -> u32 {
        self.tokens
    }

    /// Text emitted so far (untrimmed).
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Final response: the accumulated text, trimmed. A trailing fragment
    /// without terminal punctuation is dropped.
    pub fn finish(self) -> String {
        self.accumulated.trim().to_string()
    }
}
