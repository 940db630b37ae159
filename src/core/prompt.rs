/// Prompt construction for the external text generator, and decoding of its
/// replies into paragraphs or noise proposals.
use serde::{Deserialize, Serialize};

use crate::core::config::Prompts;
use crate::core::noise::NoiseProposal;
use crate::core::pipeline::GeneratorError;
use crate::schema::story::PARAGRAPH_COUNT;

/// A system/user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Accepted reply shapes for a story.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoryReply {
    Object { paragraphs: Vec<String> },
    List(Vec<String>),
}

/// The first-attempt prompt: topic, words and every placement rule.
pub fn strict_prompt(prompts: &Prompts, words: &[String], topic: Option<&str>, marker: &str) -> Prompt {
    let mut user = String::new();
    user.push_str(&prompts.instructions);
    user.push('\n');
    if let Some(topic) = topic.map(str::trim).filter(|t| !t.is_empty()) {
        user.push_str(&format!("Topic: {}\n", topic));
    }
    user.push_str(&format!("Target words: {}\n", words.join(", ")));
    user.push_str("Rules:\n");
    user.push_str(&format!(
        "- Write exactly {} paragraphs.\n",
        PARAGRAPH_COUNT
    ));
    user.push_str("- Use every target word exactly once in each paragraph.\n");
    user.push_str("- Never put two target words in the same sentence.\n");
    let example = words.first().map(String::as_str).unwrap_or("word");
    user.push_str(&format!(
        "- Wrap every target word in {m}, like {m}{w}{m}, and wrap nothing else.\n",
        m = marker,
        w = example
    ));
    user.push_str("Answer with JSON only: {\"paragraphs\": [\"...\", \"...\"]}");

    Prompt {
        system: prompts.system.clone(),
        user,
    }
}

/// The strict prompt followed by the rules the previous attempt broke.
pub fn retry_prompt(
    prompts: &Prompts,
    words: &[String],
    topic: Option<&str>,
    marker: &str,
    violations: &[String],
) -> Prompt {
    let mut prompt = strict_prompt(prompts, words, topic, marker);
    prompt.user.push_str("\n\n");
    prompt.user.push_str(&prompts.retry_preamble);
    for violation in violations {
        prompt.user.push_str("\n- ");
        prompt.user.push_str(violation);
    }
    prompt
        .user
        .push_str("\nFix every one of them and answer again in the same JSON shape.");
    prompt
}

/// Ask the generator for noise words in a finished story.
pub fn noise_prompt(prompts: &Prompts, paragraphs: &[String], words: &[String], per_paragraph: usize) -> Prompt {
    let mut user = format!(
        "For each paragraph below, pick up to {} ordinary words that are not target words \
         and do not share a sentence with a target word.\nTarget words: {}\n",
        per_paragraph,
        words.join(", ")
    );
    for (i, paragraph) in paragraphs.iter().enumerate() {
        user.push_str(&format!("Paragraph {}: {}\n", i + 1, paragraph));
    }
    user.push_str("Answer with JSON only: {\"noise\": [[\"...\"], [\"...\"]]}");

    Prompt {
        system: prompts.system.clone(),
        user,
    }
}

/// Remove a surrounding Markdown code fence, if present.
fn strip_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn looks_like_json(text: &str) -> bool {
    text.starts_with('{') || text.starts_with('[')
}

/// Decode a story reply into paragraphs.
///
/// JSON replies must decode; anything else is prose split on blank lines.
pub fn decode_paragraphs(reply: &str) -> Result<Vec<String>, GeneratorError> {
    let body = strip_fences(reply);

    let paragraphs: Vec<String> = if looks_like_json(body) {
        let decoded: StoryReply =
            serde_json::from_str(body).map_err(|e| GeneratorError::Malformed(e.to_string()))?;
        let list = match decoded {
            StoryReply::Object { paragraphs } | StoryReply::List(paragraphs) => paragraphs,
        };
        list.into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    } else {
        split_blank_lines(body)
    };

    if paragraphs.is_empty() {
        return Err(GeneratorError::Malformed("reply has no paragraphs".to_string()));
    }
    Ok(paragraphs)
}

/// Decode a noise reply.
pub fn decode_noise(reply: &str) -> Result<NoiseProposal, GeneratorError> {
    serde_json::from_str(strip_fences(reply)).map_err(|e| GeneratorError::Malformed(e.to_string()))
}

/// Split prose into paragraphs on blank lines, joining wrapped lines with a space.
pub fn split_blank_lines(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words() -> Vec<String> {
        vec!["harbor".to_string(), "meadow".to_string()]
    }

    #[test]
    fn strict_prompt_states_rules() {
        let prompt = strict_prompt(&Prompts::default(), &words(), Some("a fishing village"), "**");
        assert_eq!(prompt.system, Prompts::default().system);
        assert!(prompt.user.contains("Topic: a fishing village"));
        assert!(prompt.user.contains("Target words: harbor, meadow"));
        assert!(prompt.user.contains("exactly 5 paragraphs"));
        assert!(prompt.user.contains("**harbor**"));
        assert!(prompt.user.contains("\"paragraphs\""));
    }

    #[test]
    fn blank_topic_is_omitted() {
        let prompt = strict_prompt(&Prompts::default(), &words(), Some("  "), "**");
        assert!(!prompt.user.contains("Topic:"));
    }

    #[test]
    fn retry_prompt_lists_violations() {
        let violations = vec![
            "'harbor' occurs 4 times, expected exactly 5".to_string(),
            "paragraph 2, sentence 1 contains more than one target word: harbor, meadow".to_string(),
        ];
        let prompt = retry_prompt(&Prompts::default(), &words(), None, "**", &violations);
        assert!(prompt.user.contains("Your previous story broke these rules:"));
        for v in &violations {
            assert!(prompt.user.contains(&format!("- {}", v)), "missing: {}", v);
        }
    }

    #[test]
    fn decode_json_object() {
        let reply = r#"{"paragraphs": ["The **harbor**.", "  ", "A **meadow**."]}"#;
        assert_eq!(
            decode_paragraphs(reply).unwrap(),
            vec!["The **harbor**.".to_string(), "A **meadow**.".to_string()]
        );
    }

    #[test]
    fn decode_fenced_json_array() {
        let reply = "```json\n[\"One.\", \"Two.\"]\n```";
        assert_eq!(decode_paragraphs(reply).unwrap(), vec!["One.", "Two."]);
    }

    #[test]
    fn decode_prose_on_blank_lines() {
        let reply = "First line\ncontinues here.\n\n\nSecond paragraph.\n";
        assert_eq!(
            decode_paragraphs(reply).unwrap(),
            vec!["First line continues here.", "Second paragraph."]
        );
    }

    #[test]
    fn broken_json_is_malformed() {
        let err = decode_paragraphs(r#"{"paragraphs": ["unterminated"#).unwrap_err();
        assert!(matches!(err, GeneratorError::Malformed(_)));
        assert!(matches!(
            decode_paragraphs(r#"{"story": "wrong key"}"#),
            Err(GeneratorError::Malformed(_))
        ));
    }

    #[test]
    fn empty_reply_is_unusable() {
        assert!(decode_paragraphs("   \n\n ").is_err());
        assert!(decode_paragraphs("[]").is_err());
    }

    #[test]
    fn decode_noise_reply() {
        let proposal = decode_noise("```\n{\"noise\": [[\"gulls\", \"nets\"], []]}\n```").unwrap();
        assert_eq!(proposal.paragraphs[0], vec!["gulls", "nets"]);
        assert!(decode_noise("gulls, nets").is_err());
    }

    #[test]
    fn noise_prompt_numbers_paragraphs() {
        let paragraphs = vec!["One.".to_string(), "Two.".to_string()];
        let prompt = noise_prompt(&Prompts::default(), &paragraphs, &words(), 2);
        assert!(prompt.user.contains("Paragraph 1: One."));
        assert!(prompt.user.contains("Paragraph 2: Two."));
        assert!(prompt.user.contains("up to 2 ordinary words"));
    }
}
