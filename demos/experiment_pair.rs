/// Experiment pair example: two stories for one word list, plus schedules.
///
/// A toy generator writes the first story itself and then goes offline, so
/// the second story comes from the sibling-aware fallback.
///
/// Run with: cargo run --example experiment_pair

use std::sync::atomic::{AtomicUsize, Ordering};

use story_engine::core::pipeline::{GeneratorError, StoryEngine, TextGenerator};
use story_engine::core::prompt::Prompt;
use story_engine::schema::PARAGRAPH_COUNT;

/// Answers the first story prompt, then times out.
struct ToyWriter {
    calls: AtomicUsize,
}

impl TextGenerator for ToyWriter {
    fn complete(&self, prompt: &Prompt) -> Result<String, GeneratorError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(GeneratorError::Timeout);
        }
        let words: Vec<&str> = prompt
            .user
            .lines()
            .find_map(|line| line.strip_prefix("Target words: "))
            .map(|list| list.split(", ").collect())
            .unwrap_or_default();

        let paragraphs: Vec<String> = (0..PARAGRAPH_COUNT)
            .map(|p| {
                let mut sentences = vec![format!("Morning {} came early to the coast.", p + 1)];
                // Rotate the order so positions vary by paragraph.
                for i in 0..words.len() {
                    let word = words[(i + p) % words.len()];
                    sentences.push(format!("Someone pointed at the **{}** and laughed.", word));
                }
                sentences.join(" ")
            })
            .collect();
        Ok(serde_json::json!({ "paragraphs": paragraphs }).to_string())
    }
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let engine = StoryEngine::builder()
        .seed(2026)
        .generator(ToyWriter {
            calls: AtomicUsize::new(0),
        })
        .build()
        .expect("Failed to build engine");

    let words = vec!["harbor".to_string(), "lantern".to_string(), "meadow".to_string()];
    let pair = engine
        .generate_pair(&words, [Some("a fishing village"), Some("a mountain pass")])
        .expect("Failed to generate stories");

    for (label, generated) in [("A", &pair.first), ("B", &pair.second)] {
        println!("=== Story {} ({:?}) ===\n", label, generated.source);
        for paragraph in &generated.story.paragraphs {
            println!("{}\n", paragraph);
        }
        let noise: Vec<&str> = generated
            .story
            .noise_occurrences
            .iter()
            .map(|o| o.word.as_str())
            .collect();
        println!("Noise: {}\n", noise.join(", "));
    }

    println!("=== Schedules ===\n");
    for (word, placement) in &pair.schedules {
        println!("{}:", word);
        for (phase, key) in placement.iter() {
            match key {
                Some(key) => println!("  {:<14} {}", phase.name(), key),
                None => println!("  {:<14} -", phase.name()),
            }
        }
    }
}
