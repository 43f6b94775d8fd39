//! Role-play prompt template.
//!
//! Rendering happens in two stages:
//!
//! 1. [`render_structure`] lays the character's description, persona line,
//!    scripted examples, transcript and the new user text into the fixed
//!    template. The result is a [`PersonaTemplate`] whose only remaining
//!    template syntax is the persona placeholders.
//! 2. [`PersonaTemplate::render`] replaces `{{char}}` and `{{user}}` with the
//!    character and user display names. Names are inserted literally and are
//!    never scanned again, so a name that itself looks like a placeholder
//!    stays as typed.
//!
//! Layout:
//! ```text
//! You're {{char}} in this fictional never-ending roleplay with {{user}}.
//!
//! Avoid repetition, ...
//!
//! ### Input:
//! {description}
//! [{persona_line}]
//! ### New Roleplay:
//! {examples, joined by a blank line}
//! ### New Roleplay:
//! {transcript, each entry followed by a blank line}### Instruction:
//! {{user}}: {user_text}
//!
//! ### Response:
//! {{char}}:
//! ```

use koboldbot_types::character::Turn;

/// Placeholder for the character's display name.
pub const CHAR_PLACEHOLDER: &str = "{{char}}";

/// Placeholder for the user's display name.
pub const USER_PLACEHOLDER: &str = "{{user}}";

const PREAMBLE: &str = "You're {{char}} in this fictional never-ending roleplay with {{user}}.\n\
\n\
Avoid repetition, don't loop. Develop the plot slowly, always stay in character. \
Describe all actions in full, elaborate and vivid detail. \
Mention all relevant sensory perceptions.\n\
\n";

/// Output of the structural pass: fully laid out, persona placeholders
/// still unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaTemplate(String);

impl PersonaTemplate {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute the persona placeholders in a single left-to-right scan.
    ///
    /// Any brace sequence other than the two placeholders is copied through
    /// unchanged.
    pub fn render(&self, char_name: &str, user_name: &str) -> String {
        let mut out = String::with_capacity(self.0.len() + 64);
        let mut rest = self.0.as_str();

        while let Some(pos) = rest.find("{{") {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(CHAR_PLACEHOLDER) {
                out.push_str(char_name);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(USER_PLACEHOLDER) {
                out.push_str(user_name);
                rest = after;
            } else {
                // Advance one brace so "{{{char}}" still resolves its placeholder.
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// Render one (prompt, response) pair through the shared turn sub-template.
///
/// Used for scripted examples and transcript entries alike.
pub fn render_turn(turn: &Turn) -> String {
    format!(
        "### Instruction:\n{USER_PLACEHOLDER}: {}\n\n### Response:\n{CHAR_PLACEHOLDER}: {}\n",
        turn.prompt, turn.response
    )
}

/// Structural pass. Pure: no I/O, no persona substitution.
pub fn render_structure(
    description: &str,
    persona_line: &str,
    examples: &[Turn],
    history: &[Turn],
    user_text: &str,
) -> PersonaTemplate {
    let examples = examples
        .iter()
        .map(render_turn)
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut out = String::with_capacity(
        PREAMBLE.len() + description.len() + examples.len() + user_text.len() + 256,
    );
    out.push_str(PREAMBLE);
    out.push_str("### Input:\n");
    out.push_str(description);
    out.push_str("\n[");
    out.push_str(persona_line);
    out.push_str("]\n### New Roleplay:\n");
    out.push_str(&examples);
    out.push_str("\n### New Roleplay:\n");
    for turn in history {
        out.push_str(&render_turn(turn));
        out.push_str("\n\n");
    }
    out.push_str("### Instruction:\n");
    out.push_str(USER_PLACEHOLDER);
    out.push_str(": ");
    out.push_str(user_text);
    out.push_str("\n\n### Response:\n");
    out.push_str(CHAR_PLACEHOLDER);
    out.push(':');

    PersonaTemplate(out)
}
