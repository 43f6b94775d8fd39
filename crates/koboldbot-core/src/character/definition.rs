//! Parser for the character-definition command.
//!
//! ```text
//! !add <Name>
//! description: <free text, may span lines>
//! pline: <single line>
//! examples:
//! {{user}}: <user turn>
//! {{char}}: <character turn>
//! ...
//! ```
//!
//! The examples block must be consumed entirely by alternating
//! `{{user}}:` / `{{char}}:` pairs; any unmatched text rejects the whole
//! command.

use std::sync::LazyLock;

use regex::Regex;

use koboldbot_types::character::{CharacterDefinition, OwnerId, Turn};
use koboldbot_types::error::DefinitionError;

/// Command prefix that introduces a character definition.
pub const DEFINE_COMMAND: &str = "!add";

static COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^!add\s+(\w+)\ndescription:([\s\S]*)\npline:(.*)\nexamples:\n([\s\S]*)$")
        .expect("definition pattern is valid")
});

static EXAMPLE_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{user\}\}:([\s\S]*?)\n\{\{char\}\}:([\s\S]*?)(?:\n|$)")
        .expect("example pattern is valid")
});

/// Whether a message is a definition command rather than chat.
pub fn is_definition_command(message: &str) -> bool {
    message.trim_start().starts_with(DEFINE_COMMAND)
}

/// Parse a definition command into an upsert request for `owner`.
///
/// Surrounding whitespace of the whole command is ignored; every extracted
/// field is trimmed.
pub fn parse_definition(owner: &OwnerId, text: &str) -> Result<CharacterDefinition, DefinitionError> {
    let caps = COMMAND.captures(text.trim()).ok_or(DefinitionError::Syntax)?;
    let field = |i: usize| caps.get(i).map_or("", |m| m.as_str());

    let examples = parse_examples(field(4))?;

    Ok(CharacterDefinition {
        owner_id: owner.clone(),
        name: field(1).trim().to_string(),
        description: field(2).trim().to_string(),
        persona_line: field(3).trim().to_string(),
        examples,
    })
}

/// Match the examples block as a sequence of (user, character) pairs.
///
/// The matched pairs must cover the block exactly.
pub fn parse_examples(block: &str) -> Result<Vec<Turn>, DefinitionError> {
    let mut matched = 0;
    let mut examples = Vec::new();

    for caps in EXAMPLE_PAIR.captures_iter(block) {
        let whole = caps.get(0).map_or(0, |m| m.len());
        matched += whole;
        let prompt = caps.get(1).map_or("", |m| m.as_str()).trim();
        let response = caps.get(2).map_or("", |m| m.as_str()).trim();
        examples.push(Turn::new(prompt, response));
    }

    if matched != block.len() {
        return Err(DefinitionError::InvalidExamples {
            residual: block.len().saturating_sub(matched),
        });
    }
    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use koboldbot_types::error::DEFINITION_EXAMPLE;

    const MONICA: &str = "!add Monica
description: {{char}} is a phenomenal magician
who is well versed in the fiery arts.
pline: appearance: cloak, wizard hat; personality: kind, wise
examples:
{{user}}: {{char}}, I'm cold.
{{char}}: *casts fireball* There you go!
{{user}}: Thanks!
{{char}}: Anytime.";

    #[test]
    fn test_parse_full_definition() {
        let def = parse_definition(&OwnerId::new("42"), MONICA).unwrap();
        assert_eq!(def.owner_id, OwnerId::new("42"));
        assert_eq!(def.name, "Monica");
        assert_eq!(
            def.description,
            "{{char}} is a phenomenal magician\nwho is well versed in the fiery arts."
        );
        assert_eq!(def.persona_line, "appearance: cloak, wizard hat; personality: kind, wise");
        assert_eq!(
            def.examples,
            vec![
                Turn::new("{{char}}, I'm cold.", "*casts fireball* There you go!"),
                Turn::new("Thanks!", "Anytime."),
            ]
        );
    }

    #[test]
    fn test_usage_example_parses() {
        let body = DEFINITION_EXAMPLE.trim_matches('`');
        let def = parse_definition(&OwnerId::new("1"), body).unwrap();
        assert_eq!(def.name, "Monica");
        assert_eq!(def.examples.len(), 1);
    }

    #[test]
    fn test_trailing_newline_is_accepted() {
        let text = format!("{MONICA}\n\n");
        let def = parse_definition(&OwnerId::new("42"), &text).unwrap();
        assert_eq!(def.examples.len(), 2);
    }

    #[test]
    fn test_missing_section_is_syntax_error() {
        let text = "!add Monica\ndescription: a magician\nexamples:\n{{user}}: hi\n{{char}}: hello";
        assert_eq!(
            parse_definition(&OwnerId::new("42"), text),
            Err(DefinitionError::Syntax)
        );
        assert_eq!(
            parse_definition(&OwnerId::new("42"), "!add"),
            Err(DefinitionError::Syntax)
        );
    }

    #[test]
    fn test_residual_text_rejects_examples() {
        let text = "!add Monica\ndescription: d\npline: p\nexamples:\n\
                    {{user}}: hi\n{{char}}: hello\nstray line";
        assert_eq!(
            parse_definition(&OwnerId::new("42"), text),
            Err(DefinitionError::InvalidExamples { residual: 10 })
        );
    }

    #[test]
    fn test_out_of_order_turns_reject_examples() {
        let block = "{{char}}: hello\n{{user}}: hi";
        assert!(matches!(
            parse_examples(block),
            Err(DefinitionError::InvalidExamples { .. })
        ));
    }

    #[test]
    fn test_empty_examples_block() {
        assert_eq!(parse_examples(""), Ok(vec![]));
    }

    #[test]
    fn test_matched_pairs_cover_valid_blocks_exactly() {
        let blocks = [
            "{{user}}: a\n{{char}}: b",
            "{{user}}: a\n{{char}}: b\n",
            "{{user}}:a\n{{char}}:b\n{{user}}: c c\n{{char}}: d. e!",
            "{{user}}: multi\n{{char}}: x\n{{user}}: y\n{{char}}: z\n",
        ];
        for block in blocks {
            let total: usize = EXAMPLE_PAIR
                .find_iter(block)
                .map(|m| m.len())
                .sum();
            assert_eq!(total, block.len(), "block: {block:?}");
            assert!(parse_examples(block).is_ok());
        }
    }

    #[test]
    fn test_is_definition_command() {
        assert!(is_definition_command("!add Monica\n..."));
        assert!(!is_definition_command("Monica, !add"));
    }
}
