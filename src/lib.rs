//! Story Engine: vocabulary-practice stories with verifiable word placement.
//!
//! Generates five-paragraph stories in which every target word appears once
//! per paragraph, never sharing a sentence with another target word. An
//! external text generator writes the prose; marker parsing and a placement
//! validator check it, and a deterministic template fallback guarantees a
//! valid story when the generator cannot deliver. Noise distractors and
//! per-word exposure schedules are derived from the finished story.

pub mod core;
pub mod schema;

pub use crate::core::config::{ConfigError, EngineConfig};
pub use crate::core::pipeline::{
    EngineError, ExperimentPair, GeneratedStory, GeneratorError, StoryEngine, StoryRequest,
    StorySource, TextGenerator,
};
pub use crate::core::prompt::Prompt;
pub use crate::schema::{Occurrence, Phase, PhasePlacement, SentenceKey, Story, TargetWords};
