use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::occurrence::Occurrence;

/// Every finalized story has exactly this many paragraphs.
pub const PARAGRAPH_COUNT: usize = 5;
/// Each target word occurs this many times in a finalized story.
pub const OCCURRENCES_PER_WORD: usize = 5;
/// Hard cap on target words per story.
pub const MAX_TARGET_WORDS: usize = 5;

/// Reasons a target word list is rejected before any generation starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WordListError {
    #[error("target word list is empty")]
    Empty,
    #[error("target word list has {0} words (maximum {MAX_TARGET_WORDS})")]
    TooMany(usize),
    #[error("target word at position {0} is blank")]
    Blank(usize),
    #[error("target word '{0}' contains whitespace")]
    Whitespace(String),
    #[error("target word '{0}' has no letters")]
    NotAWord(String),
    #[error("target word '{0}' may only contain letters, digits, apostrophes and hyphens")]
    InvalidCharacter(String),
    #[error("target word '{0}' appears more than once")]
    Duplicate(String),
}

/// An ordered list of 1–5 distinct, lowercased target words.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct TargetWords(Vec<String>);

impl TargetWords {
    pub fn new<I, S>(words: I) -> Result<Self, WordListError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for (i, raw) in words.into_iter().enumerate() {
            let word = raw.as_ref().trim().to_lowercase();
            if word.is_empty() {
                return Err(WordListError::Blank(i));
            }
            if word.chars().any(char::is_whitespace) {
                return Err(WordListError::Whitespace(word));
            }
            if !word.chars().any(char::is_alphabetic) {
                return Err(WordListError::NotAWord(word));
            }
            if !word
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '\'' | '-' | '\u{2019}'))
            {
                return Err(WordListError::InvalidCharacter(word));
            }
            if normalized.contains(&word) {
                return Err(WordListError::Duplicate(word));
            }
            normalized.push(word);
        }

        if normalized.is_empty() {
            return Err(WordListError::Empty);
        }
        if normalized.len() > MAX_TARGET_WORDS {
            return Err(WordListError::TooMany(normalized.len()));
        }
        Ok(Self(normalized))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, word: &str) -> bool {
        let lower = word.to_lowercase();
        self.0.iter().any(|w| *w == lower)
    }
}

impl TryFrom<Vec<String>> for TargetWords {
    type Error = WordListError;

    fn try_from(words: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(words)
    }
}

impl From<TargetWords> for Vec<String> {
    fn from(words: TargetWords) -> Self {
        words.0
    }
}

impl<'a> IntoIterator for &'a TargetWords {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The engine's one mutable artifact: finalized paragraphs plus the target
/// and noise occurrences embedded in them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub paragraphs: Vec<String>,
    pub target_occurrences: Vec<Occurrence>,
    #[serde(default)]
    pub noise_occurrences: Vec<Occurrence>,
}

impl Story {
    pub fn new(paragraphs: Vec<String>, target_occurrences: Vec<Occurrence>) -> Self {
        Self {
            paragraphs,
            target_occurrences,
            noise_occurrences: Vec::new(),
        }
    }

    /// Target occurrences of `word`, compared case-insensitively.
    pub fn occurrences_of<'a>(&'a self, word: &'a str) -> impl Iterator<Item = &'a Occurrence> + 'a {
        let lower = word.to_lowercase();
        self.target_occurrences
            .iter()
            .filter(move |occ| occ.normalized_word() == lower)
    }
}
