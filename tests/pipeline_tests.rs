/// Pipeline integration tests: end to end from word list to accepted story.

use std::path::Path;
use std::sync::Mutex;

use story_engine::core::config::EngineConfig;
use story_engine::core::pipeline::{
    GenerationState, GeneratorError, StoryEngine, StoryRequest, StorySource, TextGenerator,
};
use story_engine::core::prompt::Prompt;
use story_engine::core::validator::PlacementValidator;
use story_engine::schema::{Phase, PARAGRAPH_COUNT};

/// Hands out canned replies in order, then reports a timeout.
struct CannedGenerator {
    replies: Mutex<Vec<String>>,
}

impl CannedGenerator {
    fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().rev().collect()),
        }
    }
}

impl TextGenerator for CannedGenerator {
    fn complete(&self, _prompt: &Prompt) -> Result<String, GeneratorError> {
        self.replies.lock().unwrap().pop().ok_or(GeneratorError::Timeout)
    }
}

fn fixture(name: &str) -> String {
    std::fs::read_to_string(Path::new("tests/fixtures").join(name)).unwrap()
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

#[test]
fn fenced_reply_is_accepted_with_noise() {
    let engine = StoryEngine::builder()
        .config_path("config/engine.ron")
        .generator(CannedGenerator::new(vec![fixture("generator_reply.json")]))
        .build()
        .unwrap();

    let request = StoryRequest::new(["Harbor", "lantern"]).topic("a fishing village");
    let result = engine.generate(&request).unwrap();

    assert_eq!(result.source, StorySource::Generated);
    assert_eq!(result.story.paragraphs.len(), PARAGRAPH_COUNT);
    assert!(result.story.paragraphs[0].starts_with("Dawn broke softly"));
    assert!(!result.story.paragraphs.iter().any(|p| p.contains("**")));

    let verdict = PlacementValidator::default().check_story(
        &words(&["harbor", "lantern"]),
        &result.story.paragraphs,
        &result.story.target_occurrences,
    );
    assert!(verdict.ok, "violations: {:?}", verdict.violations);

    // Noise never shares a sentence with a target word.
    for noise in &result.story.noise_occurrences {
        assert!(
            !result.story.target_occurrences.iter().any(|t| t.key() == noise.key()),
            "noise '{}' shares {}",
            noise.word,
            noise.key()
        );
    }
    let first: Vec<&str> = result
        .story
        .noise_occurrences
        .iter()
        .filter(|o| o.paragraph_index == 0)
        .map(|o| o.word.as_str())
        .collect();
    assert_eq!(first, vec!["Dawn", "broke"]);
}

#[test]
fn prose_reply_is_split_on_blank_lines() {
    let engine = StoryEngine::builder()
        .generator(CannedGenerator::new(vec![fixture("marked_story.txt")]))
        .build()
        .unwrap();
    let result = engine
        .generate(&StoryRequest::new(["harbor", "lantern", "meadow"]))
        .unwrap();
    assert_eq!(result.source, StorySource::Generated);
    assert_eq!(result.story.target_occurrences.len(), 15);
}

#[test]
fn fallback_is_deterministic_per_seed() {
    let build = |seed| StoryEngine::builder().seed(seed).build().unwrap();
    let request = StoryRequest::new(["harbor", "meadow", "lantern"]);

    let a = build(5).generate(&request).unwrap();
    let b = build(5).generate(&request).unwrap();
    assert_eq!(a.source, StorySource::Fallback);
    assert_eq!(a.story, b.story);
    assert_eq!(
        a.trace,
        vec![
            GenerationState::Requesting,
            GenerationState::FallbackGenerating,
            GenerationState::Accepted
        ]
    );
}

#[test]
fn at_least_mode_relaxes_only_the_total() {
    let paragraphs: Vec<String> = (0..PARAGRAPH_COUNT)
        .map(|p| {
            let extra = if p == 0 { " Then the **harbor** again." } else { "" };
            format!("Morning {} came. The **harbor** woke.{}", p, extra)
        })
        .collect();
    let reply = serde_json::json!({ "paragraphs": paragraphs }).to_string();

    // Exact mode: the doubled paragraph fails twice and falls back.
    let exact = StoryEngine::builder()
        .generator(CannedGenerator::new(vec![reply.clone(), reply.clone()]))
        .build()
        .unwrap();
    let result = exact.generate(&StoryRequest::new(["harbor"])).unwrap();
    assert_eq!(result.source, StorySource::Fallback);
    assert!(result
        .violations
        .iter()
        .any(|v| v.contains("at most once per paragraph")));

    // AtLeast relaxes only the total; the per-paragraph cap still holds.
    let config = EngineConfig::parse_ron("EngineConfig(count_mode: AtLeast)").unwrap();
    let relaxed = StoryEngine::builder()
        .config(config)
        .generator(CannedGenerator::new(vec![reply.clone(), reply]))
        .build()
        .unwrap();
    let result = relaxed.generate(&StoryRequest::new(["harbor"])).unwrap();
    assert_eq!(result.source, StorySource::Fallback);
    assert!(!result.violations.iter().any(|v| v.contains("expected at least")));
}

#[test]
fn experiment_pair_avoids_shared_positions() {
    let engine = StoryEngine::builder().seed(17).build().unwrap();
    let words = words(&["harbor", "meadow", "lantern", "pebble"]);
    let pair = engine
        .generate_pair(&words, [Some("the coast"), None])
        .unwrap();

    let validator = PlacementValidator::default();
    let verdict = validator.check_pair(
        &words,
        (pair.first.story.paragraphs.as_slice(), pair.first.story.target_occurrences.as_slice()),
        (pair.second.story.paragraphs.as_slice(), pair.second.story.target_occurrences.as_slice()),
    );
    assert!(verdict.ok, "violations: {:?}", verdict.violations);

    assert_eq!(pair.schedules.len(), 4);
    for (word, placement) in &pair.schedules {
        assert_eq!(placement.position(Phase::Recall), None);
        let mut paragraphs: Vec<usize> = Phase::EXPOSED
            .iter()
            .filter_map(|&phase| placement.position(phase))
            .map(|key| key.paragraph_index)
            .collect();
        paragraphs.dedup();
        assert_eq!(paragraphs.len(), 3, "{} phases share a paragraph", word);
    }
}

#[test]
fn generated_story_serializes_to_json() {
    let engine = StoryEngine::builder().build().unwrap();
    let result = engine.generate(&StoryRequest::new(["harbor"])).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["source"], "fallback");
    assert_eq!(json["trace"][0], "requesting");
    assert_eq!(json["story"]["paragraphs"].as_array().unwrap().len(), PARAGRAPH_COUNT);
}

#[test]
fn inspect_reports_every_violation() {
    let engine = StoryEngine::builder().build().unwrap();
    let text = fixture("broken_story.txt");
    let paragraphs = story_engine::core::prompt::split_blank_lines(&text);
    let inspection = engine
        .inspect(&words(&["harbor", "meadow"]), &paragraphs)
        .unwrap();

    let violations = &inspection.verdict.violations;
    assert!(!inspection.verdict.ok);
    assert!(violations.iter().any(|v| v.contains("story has 2 paragraphs")));
    assert!(violations.iter().any(|v| v.contains("'harbor' occurs 3 times")));
    assert!(violations.iter().any(|v| v.contains("'meadow' occurs 1 times")));
    assert!(violations
        .iter()
        .any(|v| v.contains("'harbor' occurs 2 times in paragraph 1")));
    assert!(violations
        .iter()
        .any(|v| v.contains("paragraph 0, sentence 0 contains more than one target word")));
}

#[test]
fn inspect_accepts_fixture_story() {
    let engine = StoryEngine::builder().build().unwrap();
    let paragraphs = story_engine::core::prompt::split_blank_lines(&fixture("marked_story.txt"));
    let inspection = engine
        .inspect(&words(&["harbor", "lantern", "meadow"]), &paragraphs)
        .unwrap();
    assert!(inspection.verdict.ok, "violations: {:?}", inspection.verdict.violations);

    let harbor = inspection.schedules["harbor"];
    assert_eq!(harbor.baseline.map(|k| (k.paragraph_index, k.sentence_index)), Some((0, 1)));
    assert_eq!(harbor.learning.map(|k| (k.paragraph_index, k.sentence_index)), Some((1, 2)));
    assert_eq!(harbor.reinforcement.map(|k| (k.paragraph_index, k.sentence_index)), Some((2, 3)));
}

#[test]
fn sentence_bank_file_drives_fallback() {
    let engine = StoryEngine::builder()
        .sentence_bank_path("tests/fixtures/sentence_bank.ron")
        .build()
        .unwrap();
    let result = engine.generate(&StoryRequest::new(["harbor"])).unwrap();
    assert_eq!(result.source, StorySource::Fallback);
    for paragraph in &result.story.paragraphs {
        assert!(
            paragraph.contains("chanted harbor") || paragraph.contains("showed harbor."),
            "unexpected anchor in: {}",
            paragraph
        );
    }
}
