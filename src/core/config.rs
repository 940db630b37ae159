/// Engine configuration, loaded from RON.
///
/// Every field has a default, so an empty `EngineConfig()` is valid.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::fallback::DEFAULT_MIN_SENTENCES;
use crate::core::grammar::{GrammarError, SentenceBank};
use crate::core::markers::DEFAULT_MARKER;
use crate::core::noise::DEFAULT_NOISE_PER_PARAGRAPH;
use crate::core::validator::CountMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("template error: {0}")]
    Template(#[source] GrammarError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<GrammarError> for ConfigError {
    fn from(err: GrammarError) -> Self {
        match err {
            GrammarError::Io(err) => ConfigError::Io(err),
            GrammarError::Ron(err) => ConfigError::Ron(err),
            other => ConfigError::Template(other),
        }
    }
}

/// Base texts for the generator prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub system: String,
    pub instructions: String,
    pub retry_preamble: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            system: "You write short, plain stories for vocabulary practice. \
                     You follow placement rules exactly and answer only with JSON."
                .to_string(),
            instructions: "Write a story in exactly five paragraphs.".to_string(),
            retry_preamble: "Your previous story broke these rules:".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename = "EngineConfig")]
pub struct EngineConfig {
    pub seed: u64,
    pub marker: String,
    pub count_mode: CountMode,
    pub min_sentences_per_paragraph: usize,
    pub noise_per_paragraph: usize,
    pub propose_noise: bool,
    pub prompts: Prompts,
    pub sentence_bank: SentenceBank,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            marker: DEFAULT_MARKER.to_string(),
            count_mode: CountMode::Exact,
            min_sentences_per_paragraph: DEFAULT_MIN_SENTENCES,
            noise_per_paragraph: DEFAULT_NOISE_PER_PARAGRAPH,
            propose_noise: true,
            prompts: Prompts::default(),
            sentence_bank: SentenceBank::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a configuration file.
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse and validate a RON string.
    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        if self.marker.trim().is_empty() {
            problems.push("marker must not be empty".to_string());
        } else if self.marker.chars().any(char::is_whitespace) {
            problems.push(format!("marker '{}' must not contain whitespace", self.marker));
        }
        if self.min_sentences_per_paragraph == 0 {
            problems.push("min_sentences_per_paragraph must be at least 1".to_string());
        }
        problems.extend(self.sentence_bank.problems());

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")))
        }
    }
}
