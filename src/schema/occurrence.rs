use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(paragraph, sentence)` position inside a story.
///
/// Ordered paragraph-first, which is the order the scheduler and the
/// validator report positions in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SentenceKey {
    pub paragraph_index: usize,
    pub sentence_index: usize,
}

impl SentenceKey {
    pub fn new(paragraph_index: usize, sentence_index: usize) -> Self {
        Self {
            paragraph_index,
            sentence_index,
        }
    }
}

impl fmt::Display for SentenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "paragraph {}, sentence {}",
            self.paragraph_index, self.sentence_index
        )
    }
}

/// One physical appearance of a word inside a specific sentence of a
/// specific paragraph.
///
/// `char_start`/`char_end` are byte offsets into the paragraph's cleaned
/// text. They are absent for occurrences synthesized without text tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occurrence {
    pub word: String,
    pub paragraph_index: usize,
    pub sentence_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_end: Option<usize>,
}

impl Occurrence {
    /// An occurrence with no character-level tracking.
    pub fn at(word: impl Into<String>, paragraph_index: usize, sentence_index: usize) -> Self {
        Self {
            word: word.into(),
            paragraph_index,
            sentence_index,
            char_start: None,
            char_end: None,
        }
    }

    /// An occurrence spanning `start..end` of its paragraph.
    pub fn with_span(
        word: impl Into<String>,
        paragraph_index: usize,
        sentence_index: usize,
        start: usize,
        end: usize,
    ) -> Self {
        Self {
            word: word.into(),
            paragraph_index,
            sentence_index,
            char_start: Some(start),
            char_end: Some(end),
        }
    }

    pub fn key(&self) -> SentenceKey {
        SentenceKey::new(self.paragraph_index, self.sentence_index)
    }

    /// Lowercased word, the form all comparisons against target words use.
    pub fn normalized_word(&self) -> String {
        self.word.to_lowercase()
    }

    /// The byte span, if both offsets are known.
    pub fn span(&self) -> Option<std::ops::Range<usize>> {
        match (self.char_start, self.char_end) {
            (Some(start), Some(end)) if start <= end => Some(start..end),
            _ => None,
        }
    }
}
