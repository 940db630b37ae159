/// The generation orchestrator: target words → validated story.
///
/// Wires together the external generator, marker parsing, placement
/// validation, one stricter retry, the deterministic fallback and noise
/// selection. Every valid request ends in an accepted story.
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::core::config::{ConfigError, EngineConfig};
use crate::core::fallback::FallbackGenerator;
use crate::core::grammar::SentenceBank;
use crate::core::markers::{parse_with_marker, ParsedText};
use crate::core::noise::{NoiseProposal, NoiseSelector};
use crate::core::prompt::{self, Prompt};
use crate::core::schedule::schedule_words;
use crate::core::validator::{PlacementValidator, Verdict};
use crate::schema::occurrence::Occurrence;
use crate::schema::phase::PhasePlacement;
use crate::schema::story::{Story, TargetWords, WordListError, PARAGRAPH_COUNT};

/// Ways an external generator call can fail. The orchestrator treats them
/// all as "no usable output".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("generator timed out")]
    Timeout,
    #[error("generator refused: {0}")]
    Refused(String),
    #[error("malformed reply: {0}")]
    Malformed(String),
}

/// An external text generator: a prompt pair in, prose out.
///
/// Timeouts are the implementor's job; report them as
/// [`GeneratorError::Timeout`].
pub trait TextGenerator: Send + Sync {
    fn complete(&self, prompt: &Prompt) -> Result<String, GeneratorError>;
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<WordListError> for EngineError {
    fn from(err: WordListError) -> Self {
        EngineError::MalformedInput(err.to_string())
    }
}

/// Why an attempt did not produce an acceptable story. Never leaves this module.
#[derive(Debug, Error)]
enum AttemptFailure {
    #[error("generation unavailable: {0}")]
    GenerationUnavailable(GeneratorError),
    #[error("validation failed with {} violation(s)", .0.len())]
    ValidationFailed(Vec<String>),
}

/// States of one generation run, recorded in visiting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Requesting,
    ParsingOccurrences,
    Validating,
    RetryRequesting,
    FallbackGenerating,
    Accepted,
}

/// Which path produced the accepted story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorySource {
    /// First generator reply validated.
    Generated,
    /// The stricter retry validated.
    Retried,
    /// Synthesized by the fallback generator.
    Fallback,
}

/// Input for one story.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRequest {
    pub words: Vec<String>,
    #[serde(default)]
    pub topic: Option<String>,
    /// The other story of the same experiment, if it already exists.
    #[serde(default)]
    pub sibling: Option<Story>,
}

impl StoryRequest {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
            topic: None,
            sibling: None,
        }
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn sibling(mut self, sibling: Story) -> Self {
        self.sibling = Some(sibling);
        self
    }
}

/// An accepted story and how it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedStory {
    pub story: Story,
    pub source: StorySource,
    pub trace: Vec<GenerationState>,
    /// The last violations seen before acceptance or fallback.
    pub violations: Vec<String>,
}

/// Both stories of an experiment plus the per-word exposure schedules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentPair {
    pub first: GeneratedStory,
    pub second: GeneratedStory,
    pub schedules: BTreeMap<String, PhasePlacement>,
}

/// A marked story checked offline, without any generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inspection {
    pub story: Story,
    pub verdict: Verdict,
    pub schedules: BTreeMap<String, PhasePlacement>,
}

/// One step of the state machine, carrying what the next state needs.
enum Step {
    Request(Prompt),
    Parse(Vec<String>),
    Validate(ParsedText),
    Fallback(AttemptFailure),
    Accept(Story, StorySource),
}

impl Step {
    fn state(&self, retried: bool) -> GenerationState {
        match self {
            Step::Request(_) if retried => GenerationState::RetryRequesting,
            Step::Request(_) => GenerationState::Requesting,
            Step::Parse(_) => GenerationState::ParsingOccurrences,
            Step::Validate(_) => GenerationState::Validating,
            Step::Fallback(_) => GenerationState::FallbackGenerating,
            Step::Accept(..) => GenerationState::Accepted,
        }
    }
}

/// The story engine. Built via `StoryEngine::builder()`.
///
/// Holds no mutable state, so one engine can serve parallel requests.
pub struct StoryEngine {
    config: EngineConfig,
    generator: Option<Arc<dyn TextGenerator>>,
}

/// Builder for constructing a `StoryEngine`.
#[derive(Default)]
pub struct StoryEngineBuilder {
    config_path: Option<PathBuf>,
    sentence_bank_path: Option<PathBuf>,
    seed: Option<u64>,
    /// Directly provided configuration (for testing without files).
    config: Option<EngineConfig>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl StoryEngine {
    pub fn builder() -> StoryEngineBuilder {
        StoryEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Generate one story.
    ///
    /// Fails only on a malformed word list. Generator failures and rule
    /// violations end in the fallback story instead.
    pub fn generate(&self, request: &StoryRequest) -> Result<GeneratedStory, EngineError> {
        let words = TargetWords::new(&request.words)?;
        let words = words.as_slice();
        let topic = request.topic.as_deref();
        let sibling = request.sibling.as_ref();

        let mut trace = Vec::new();
        let mut violations = Vec::new();
        let mut retried = false;
        let mut step = Step::Request(self.strict_prompt(words, topic));

        let (mut story, source) = loop {
            trace.push(step.state(retried));
            step = match step {
                Step::Request(prompt) => match self.request(&prompt) {
                    Ok(paragraphs) => Step::Parse(paragraphs),
                    Err(err) => Step::Fallback(AttemptFailure::GenerationUnavailable(err)),
                },
                Step::Parse(paragraphs) => {
                    let parsed = self.extract(&paragraphs, words);
                    if parsed.is_empty() {
                        Step::Fallback(AttemptFailure::GenerationUnavailable(
                            GeneratorError::Malformed("no marked target words".to_string()),
                        ))
                    } else {
                        Step::Validate(parsed)
                    }
                }
                Step::Validate(parsed) => {
                    let verdict = self.check(words, &parsed, sibling);
                    if verdict.ok {
                        let source = if retried {
                            StorySource::Retried
                        } else {
                            StorySource::Generated
                        };
                        Step::Accept(Story::new(parsed.clean_paragraphs, parsed.occurrences), source)
                    } else if !retried {
                        retried = true;
                        debug!(
                            "retrying after {} violation(s): {}",
                            verdict.violations.len(),
                            verdict.violations.join("; ")
                        );
                        let prompt = self.retry_prompt(words, topic, &verdict.violations);
                        violations = verdict.violations;
                        Step::Request(prompt)
                    } else {
                        Step::Fallback(AttemptFailure::ValidationFailed(verdict.violations))
                    }
                }
                Step::Fallback(failure) => {
                    warn!("using fallback story for [{}]: {}", words.join(", "), failure);
                    if let AttemptFailure::ValidationFailed(last) = failure {
                        violations = last;
                    }
                    Step::Accept(self.fallback(words, sibling), StorySource::Fallback)
                }
                Step::Accept(story, source) => break (story, source),
            };
        };

        story.noise_occurrences = self.select_noise(&story, words);
        info!(
            "accepted story for [{}] ({:?}, {} noise words)",
            words.join(", "),
            source,
            story.noise_occurrences.len()
        );

        Ok(GeneratedStory {
            story,
            source,
            trace,
            violations,
        })
    }

    /// Generate both stories of an experiment. The second story treats the
    /// first as its sibling, so no word shares a position across them.
    pub fn generate_pair(
        &self,
        words: &[String],
        topics: [Option<&str>; 2],
    ) -> Result<ExperimentPair, EngineError> {
        let [first_topic, second_topic] = topics;

        let mut request = StoryRequest::new(words.iter().cloned());
        request.topic = first_topic.map(str::to_string);
        let first = self.generate(&request)?;

        request.topic = second_topic.map(str::to_string);
        request.sibling = Some(first.story.clone());
        let second = self.generate(&request)?;

        let normalized = TargetWords::new(words)?;
        let combined: Vec<Occurrence> = first
            .story
            .target_occurrences
            .iter()
            .chain(&second.story.target_occurrences)
            .cloned()
            .collect();
        let schedules = schedule_words(normalized.as_slice(), &combined, PARAGRAPH_COUNT);

        Ok(ExperimentPair {
            first,
            second,
            schedules,
        })
    }

    /// Parse and check an already marked story without calling a generator.
    /// Noise always comes from the local algorithm here.
    pub fn inspect<S: AsRef<str>>(
        &self,
        words: &[String],
        marked_paragraphs: &[S],
    ) -> Result<Inspection, EngineError> {
        let words = TargetWords::new(words)?;
        let words = words.as_slice();

        let parsed = self.extract(marked_paragraphs, words);
        let verdict = self.check(words, &parsed, None);
        let mut story = Story::new(parsed.clean_paragraphs, parsed.occurrences);
        story.noise_occurrences = NoiseSelector::new(self.config.noise_per_paragraph).select(
            &story.paragraphs,
            &story.target_occurrences,
            words,
        );
        let schedules = schedule_words(words, &story.target_occurrences, PARAGRAPH_COUNT);

        Ok(Inspection {
            story,
            verdict,
            schedules,
        })
    }

    fn strict_prompt(&self, words: &[String], topic: Option<&str>) -> Prompt {
        prompt::strict_prompt(&self.config.prompts, words, topic, &self.config.marker)
    }

    fn retry_prompt(&self, words: &[String], topic: Option<&str>, violations: &[String]) -> Prompt {
        prompt::retry_prompt(
            &self.config.prompts,
            words,
            topic,
            &self.config.marker,
            violations,
        )
    }

    fn request(&self, prompt: &Prompt) -> Result<Vec<String>, GeneratorError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| GeneratorError::Transport("no text generator configured".to_string()))?;
        let reply = generator.complete(prompt)?;
        prompt::decode_paragraphs(&reply)
    }

    /// Parse markers and drop marked words that are not targets.
    fn extract<S: AsRef<str>>(&self, paragraphs: &[S], words: &[String]) -> ParsedText {
        let mut parsed = parse_with_marker(paragraphs, &self.config.marker);
        parsed.occurrences.retain(|occ| {
            let target = words.contains(&occ.normalized_word());
            if !target {
                debug!("ignoring marked non-target word '{}' at {}", occ.word, occ.key());
            }
            target
        });
        parsed
    }

    fn check(&self, words: &[String], parsed: &ParsedText, sibling: Option<&Story>) -> Verdict {
        let validator = PlacementValidator::new(self.config.count_mode);
        let verdict = validator.check_story(words, &parsed.clean_paragraphs, &parsed.occurrences);
        match sibling {
            Some(other) => verdict.merge(validator.check_cross_story(
                words,
                &parsed.occurrences,
                &other.target_occurrences,
            )),
            None => verdict,
        }
    }

    fn fallback(&self, words: &[String], sibling: Option<&Story>) -> Story {
        let taken = sibling.map(|s| s.target_occurrences.as_slice()).unwrap_or(&[]);
        FallbackGenerator::new(
            &self.config.sentence_bank,
            self.config.min_sentences_per_paragraph,
            self.config.seed,
        )
        .generate_avoiding(words, taken)
    }

    fn select_noise(&self, story: &Story, words: &[String]) -> Vec<Occurrence> {
        let proposal = self.propose_noise(story, words);
        NoiseSelector::new(self.config.noise_per_paragraph).select_with_proposal(
            &story.paragraphs,
            &story.target_occurrences,
            words,
            proposal.as_ref(),
        )
    }

    /// One extra generator request for noise words. Any failure means the
    /// local algorithm decides alone.
    fn propose_noise(&self, story: &Story, words: &[String]) -> Option<NoiseProposal> {
        if !self.config.propose_noise || self.config.noise_per_paragraph == 0 {
            return None;
        }
        let generator = self.generator.as_ref()?;
        let prompt = prompt::noise_prompt(
            &self.config.prompts,
            &story.paragraphs,
            words,
            self.config.noise_per_paragraph,
        );
        match generator.complete(&prompt).and_then(|reply| prompt::decode_noise(&reply)) {
            Ok(proposal) => Some(proposal),
            Err(err) => {
                debug!("noise proposal unavailable: {}", err);
                None
            }
        }
    }
}

impl StoryEngineBuilder {
    /// Load configuration from a RON file.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load the fallback sentence bank from its own RON file, replacing the
    /// configured one.
    pub fn sentence_bank_path(mut self, path: impl AsRef<Path>) -> Self {
        self.sentence_bank_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Override the configured seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Provide configuration directly (for testing without files). Takes
    /// precedence over `config_path`.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn generator<G: TextGenerator + 'static>(mut self, generator: G) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Share a generator that is also used elsewhere.
    pub fn shared_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn build(self) -> Result<StoryEngine, EngineError> {
        let mut config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => EngineConfig::load_from_ron(&path)?,
            (None, None) => EngineConfig::default(),
        };

        if let Some(ref path) = self.sentence_bank_path {
            config.sentence_bank = SentenceBank::load_from_ron(path).map_err(ConfigError::from)?;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        config.validate()?;

        Ok(StoryEngine {
            config,
            generator: self.generator,
        })
    }
}
