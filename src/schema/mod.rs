//! Plain data shapes shared by every engine component.

pub mod occurrence;
pub mod phase;
pub mod story;

pub use occurrence::{Occurrence, SentenceKey};
pub use phase::{Phase, PhasePlacement};
pub use story::{Story, TargetWords, WordListError, MAX_TARGET_WORDS, OCCURRENCES_PER_WORD, PARAGRAPH_COUNT};
