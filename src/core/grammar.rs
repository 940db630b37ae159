/// Sentence templates for synthesized stories, loaded from RON and picked
/// by weight.
///
/// An anchor template carries exactly one `{word}` slot and introduces a
/// target word. A filler template has no slot and pads a paragraph. Each
/// template is exactly one sentence.
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use thiserror::Error;

use crate::core::text::sentence_spans;

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("template parse error: {0}")]
    TemplateParse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// The target word: `{word}`.
    WordSlot,
}

/// A parsed sentence template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub segments: Vec<TemplateSegment>,
    source: String,
}

/// A rendered template with the byte span of the inserted word, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub word_span: Option<Range<usize>>,
}

impl Template {
    /// Parse a template string.
    ///
    /// Syntax:
    /// - `{word}` → `WordSlot`
    /// - `{{` / `}}` → literal braces
    /// - Everything else → `Literal`
    pub fn parse(input: &str) -> Result<Template, GrammarError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            match chars[i] {
                '{' if i + 1 < len && chars[i + 1] == '{' => {
                    literal_buf.push('{');
                    i += 2;
                }
                '{' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < len && chars[end] != '}' {
                        if chars[end] == '{' {
                            return Err(GrammarError::TemplateParse(
                                "nested braces are not allowed".to_string(),
                            ));
                        }
                        end += 1;
                    }
                    if end == len {
                        return Err(GrammarError::TemplateParse("unclosed brace".to_string()));
                    }

                    let name: String = chars[start..end].iter().collect();
                    if name != "word" {
                        return Err(GrammarError::TemplateParse(format!(
                            "unknown slot '{{{}}}': only {{word}} is supported",
                            name
                        )));
                    }
                    if !literal_buf.is_empty() {
                        segments.push(TemplateSegment::Literal(std::mem::take(&mut literal_buf)));
                    }
                    segments.push(TemplateSegment::WordSlot);
                    i = end + 1;
                }
                '}' if i + 1 < len && chars[i + 1] == '}' => {
                    literal_buf.push('}');
                    i += 2;
                }
                '}' => {
                    return Err(GrammarError::TemplateParse(
                        "unmatched closing brace".to_string(),
                    ));
                }
                c => {
                    literal_buf.push(c);
                    i += 1;
                }
            }
        }

        if !literal_buf.is_empty() {
            segments.push(TemplateSegment::Literal(literal_buf));
        }

        Ok(Template {
            segments,
            source: input.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn slot_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, TemplateSegment::WordSlot))
            .count()
    }

    /// Literal text only, with each slot replaced by a single space.
    pub fn literal_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                TemplateSegment::Literal(text) => text.as_str(),
                TemplateSegment::WordSlot => " ",
            })
            .collect()
    }

    /// Render with `word` in every slot, recording the first slot's span.
    pub fn render(&self, word: &str) -> Rendered {
        let mut text = String::new();
        let mut word_span = None;
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(literal) => text.push_str(literal),
                TemplateSegment::WordSlot => {
                    let start = text.len();
                    text.push_str(word);
                    word_span.get_or_insert(start..text.len());
                }
            }
        }
        Rendered { text, word_span }
    }
}

/// RON/JSON shape of a weighted alternative.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawAlternative {
    weight: u32,
    text: String,
}

/// A weighted sentence template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAlternative", into = "RawAlternative")]
pub struct Alternative {
    pub weight: u32,
    pub template: Template,
}

impl Alternative {
    pub fn new(weight: u32, text: &str) -> Result<Self, GrammarError> {
        Ok(Self {
            weight,
            template: Template::parse(text)?,
        })
    }
}

impl TryFrom<RawAlternative> for Alternative {
    type Error = GrammarError;

    fn try_from(raw: RawAlternative) -> Result<Self, Self::Error> {
        Alternative::new(raw.weight, &raw.text)
    }
}

impl From<Alternative> for RawAlternative {
    fn from(alt: Alternative) -> Self {
        RawAlternative {
            weight: alt.weight,
            text: alt.template.source,
        }
    }
}

const DEFAULT_ANCHORS: &[(u32, &str)] = &[
    (3, "Everyone in town was talking about {word} that day."),
    (3, "Mira wrote {word} carefully in the notebook."),
    (2, "The first thing the children noticed was {word}."),
    (2, "Later, someone mentioned {word} again and smiled."),
    (2, "Nobody expected to hear about {word} so soon."),
    (1, "On the walk home, they kept thinking about {word}."),
];

const DEFAULT_FILLERS: &[(u32, &str)] = &[
    (3, "The afternoon light drifted slowly across the square."),
    (3, "A gentle breeze moved through the open windows."),
    (2, "Somewhere nearby, a dog barked twice."),
    (2, "The clock on the wall ticked quietly."),
    (2, "Footsteps echoed along the narrow street."),
    (1, "Everyone paused for a moment to listen."),
];

/// Weighted anchor and filler sentences used by the fallback generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "SentenceBank")]
pub struct SentenceBank {
    pub anchors: Vec<Alternative>,
    pub fillers: Vec<Alternative>,
}

impl Default for SentenceBank {
    fn default() -> Self {
        // The built-in templates are fixed and well-formed.
        let build = |list: &[(u32, &str)]| -> Vec<Alternative> {
            list.iter()
                .filter_map(|(weight, text)| Alternative::new(*weight, text).ok())
                .collect()
        };
        Self {
            anchors: build(DEFAULT_ANCHORS),
            fillers: build(DEFAULT_FILLERS),
        }
    }
}

impl SentenceBank {
    /// Load a sentence bank from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<SentenceBank, GrammarError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a sentence bank from a RON string.
    pub fn parse_ron(input: &str) -> Result<SentenceBank, GrammarError> {
        Ok(ron::from_str(input)?)
    }

    /// Structural problems that would break one-sentence-per-template or
    /// one-word-per-anchor.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.anchors.is_empty() {
            problems.push("sentence bank has no anchor templates".to_string());
        }
        if self.fillers.is_empty() {
            problems.push("sentence bank has no filler templates".to_string());
        }
        for alt in &self.anchors {
            if alt.template.slot_count() != 1 {
                problems.push(format!(
                    "anchor '{}' must contain exactly one {{word}} slot",
                    alt.template.source()
                ));
            }
        }
        for alt in &self.fillers {
            if alt.template.slot_count() != 0 {
                problems.push(format!(
                    "filler '{}' must not contain a {{word}} slot",
                    alt.template.source()
                ));
            }
        }
        for alt in self.anchors.iter().chain(&self.fillers) {
            let sample = alt.template.render("word");
            if sentence_spans(sample.text.trim()).len() != 1 {
                problems.push(format!(
                    "template '{}' must be a single sentence",
                    alt.template.source()
                ));
            }
            if alt.weight == 0 {
                problems.push(format!("template '{}' has zero weight", alt.template.source()));
            }
        }
        problems
    }

    /// Weighted pick of an anchor whose literal text passes `accept`.
    pub fn pick_anchor(&self, rng: &mut StdRng, accept: impl Fn(&Template) -> bool) -> Option<&Template> {
        pick(&self.anchors, rng, accept)
    }

    /// Weighted pick of a filler whose text passes `accept`.
    pub fn pick_filler(&self, rng: &mut StdRng, accept: impl Fn(&Template) -> bool) -> Option<&Template> {
        pick(&self.fillers, rng, accept)
    }
}

fn pick<'a>(
    pool: &'a [Alternative],
    rng: &mut StdRng,
    accept: impl Fn(&Template) -> bool,
) -> Option<&'a Template> {
    let eligible: Vec<&Alternative> = pool.iter().filter(|alt| accept(&alt.template)).collect();
    let weights: Vec<u32> = eligible.iter().map(|alt| alt.weight).collect();
    let dist = WeightedIndex::new(&weights).ok()?;
    Some(&eligible[dist.sample(rng)].template)
}
