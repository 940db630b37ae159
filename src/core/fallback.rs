/// Deterministic fallback generator: a minimal synthetic story that always
/// satisfies the placement rules.
///
/// Each paragraph holds `max(min_sentences, words)` sentences. A seeded
/// shuffle decides the word order per paragraph, rotated by one when it
/// repeats the previous paragraph's order. The i-th word of the order goes
/// into sentence i; the remaining sentences are fillers.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rustc_hash::{FxHashSet, FxHasher};
use std::hash::{Hash, Hasher};

use crate::core::grammar::{Rendered, SentenceBank, Template};
use crate::core::text::mentions_any;
use crate::schema::occurrence::{Occurrence, SentenceKey};
use crate::schema::story::{Story, PARAGRAPH_COUNT};

/// Default lower bound on sentences per synthesized paragraph.
pub const DEFAULT_MIN_SENTENCES: usize = 4;

/// Last-resort fillers. No two share a word, so a list of at most
/// `MAX_TARGET_WORDS` words always leaves one of them clean.
const SPARE_FILLERS: [&str; 6] = [
    "Time passed.",
    "Nothing moved.",
    "Rain fell.",
    "Hours went by.",
    "Silence.",
    "Dusk came.",
];

/// Builds fallback stories from a sentence bank.
#[derive(Debug, Clone)]
pub struct FallbackGenerator<'a> {
    bank: &'a SentenceBank,
    min_sentences: usize,
    seed: u64,
}

impl<'a> FallbackGenerator<'a> {
    pub fn new(bank: &'a SentenceBank, min_sentences: usize, seed: u64) -> Self {
        Self {
            bank,
            min_sentences: min_sentences.max(1),
            seed,
        }
    }

    /// Synthesize a story for `words`. An empty list yields an empty story.
    pub fn generate(&self, words: &[String]) -> Story {
        self.generate_avoiding(words, &[])
    }

    /// Synthesize a story that also keeps every word off the sentence keys
    /// its sibling story uses for the same word.
    pub fn generate_avoiding(&self, words: &[String], sibling: &[Occurrence]) -> Story {
        if words.is_empty() {
            return Story::default();
        }

        let words: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
        let slots = self.min_sentences.max(words.len());
        let taken: FxHashSet<(String, SentenceKey)> = sibling
            .iter()
            .map(|occ| (occ.normalized_word(), occ.key()))
            .collect();

        let mut rng = StdRng::seed_from_u64(story_seed(self.seed, &words));
        let mut paragraphs = Vec::with_capacity(PARAGRAPH_COUNT);
        let mut occurrences = Vec::with_capacity(PARAGRAPH_COUNT * words.len());
        let mut previous: Option<Vec<usize>> = None;

        for p in 0..PARAGRAPH_COUNT {
            let mut order: Vec<usize> = (0..words.len()).collect();
            order.shuffle(&mut rng);
            if previous.as_ref() == Some(&order) {
                order.rotate_left(1);
            }

            let collides = |order: &[usize], slot_of: &dyn Fn(usize) -> usize| {
                order.iter().enumerate().any(|(i, &w)| {
                    taken.contains(&(words[w].clone(), SentenceKey::new(p, slot_of(i))))
                })
            };
            let (order, offset) = if taken.is_empty() {
                (order, 0)
            } else {
                arrange_around(&order, previous.as_deref(), slots, &collides)
            };

            // Slot -> word index.
            let mut assignment: Vec<Option<usize>> = vec![None; slots];
            for (i, &w) in order.iter().enumerate() {
                assignment[(i + offset) % slots] = Some(w);
            }

            let (text, placed) = self.build_paragraph(p, &assignment, &words, &mut rng);
            paragraphs.push(text);
            occurrences.extend(placed);
            previous = Some(order);
        }

        Story::new(paragraphs, occurrences)
    }

    fn build_paragraph(
        &self,
        paragraph_index: usize,
        assignment: &[Option<usize>],
        words: &[String],
        rng: &mut StdRng,
    ) -> (String, Vec<Occurrence>) {
        let mut text = String::new();
        let mut placed = Vec::new();
        let clean = |t: &Template| !mentions_any(&t.literal_text(), words);

        for (slot, word_index) in assignment.iter().enumerate() {
            if slot > 0 {
                text.push(' ');
            }
            let sentence_start = text.len();

            match word_index {
                Some(w) => {
                    let word = &words[*w];
                    let rendered = self
                        .bank
                        .pick_anchor(rng, clean)
                        .map(|t| t.render(word))
                        .unwrap_or_else(|| bare_sentence(word));
                    if let Some(span) = rendered.word_span {
                        placed.push(Occurrence::with_span(
                            word.as_str(),
                            paragraph_index,
                            slot,
                            sentence_start + span.start,
                            sentence_start + span.end,
                        ));
                    }
                    text.push_str(&rendered.text);
                }
                None => {
                    // A filler mentioning a target word would add an untracked
                    // occurrence.
                    let filler = self
                        .bank
                        .pick_filler(rng, clean)
                        .map(|t| t.render("").text)
                        .unwrap_or_else(|| spare_filler(words).to_string());
                    text.push_str(&filler);
                }
            }
        }

        (text, placed)
    }
}

/// Synthesize a fallback story with the built-in sentence bank and seed 0.
pub fn generate_fallback(words: &[String]) -> Story {
    let bank = SentenceBank::default();
    FallbackGenerator::new(&bank, DEFAULT_MIN_SENTENCES, 0).generate(words)
}

/// Seed for one word list: the configured seed mixed with a hash of the words.
fn story_seed(seed: u64, words: &[String]) -> u64 {
    let mut hasher = FxHasher::default();
    words.hash(&mut hasher);
    seed ^ hasher.finish()
}

fn spare_filler(words: &[String]) -> &'static str {
    SPARE_FILLERS
        .iter()
        .copied()
        .find(|text| !mentions_any(text, words))
        .unwrap_or(SPARE_FILLERS[0])
}

/// Anchor of last resort: the word alone, so nothing else in it can collide.
fn bare_sentence(word: &str) -> Rendered {
    Rendered {
        text: format!("{}.", word),
        word_span: Some(0..word.len()),
    }
}

/// Find an order and slot offset that avoid the sibling story's positions.
///
/// Tries cyclic offsets of the shuffled order first, then every other order
/// in lexicographic sequence except a repeat of the previous paragraph's.
/// Falls back to the shuffled order at offset 0 if nothing fits.
fn arrange_around(
    order: &[usize],
    previous: Option<&[usize]>,
    slots: usize,
    collides: &dyn Fn(&[usize], &dyn Fn(usize) -> usize) -> bool,
) -> (Vec<usize>, usize) {
    let fits = |candidate: &[usize]| {
        (0..slots).find(|&offset| !collides(candidate, &|i| (i + offset) % slots))
    };

    if let Some(offset) = fits(order) {
        return (order.to_vec(), offset);
    }

    let mut candidate: Vec<usize> = (0..order.len()).collect();
    loop {
        if candidate != order && previous != Some(candidate.as_slice()) {
            if let Some(offset) = fits(&candidate) {
                return (candidate, offset);
            }
        }
        if !next_permutation(&mut candidate) {
            break;
        }
    }

    (order.to_vec(), 0)
}

/// Advance to the next lexicographic permutation; false once wrapped.
fn next_permutation(items: &mut [usize]) -> bool {
    let Some(pivot) = items.windows(2).rposition(|w| w[0] < w[1]) else {
        return false;
    };
    let successor = items
        .iter()
        .rposition(|&x| x > items[pivot])
        .unwrap_or(pivot + 1);
    items.swap(pivot, successor);
    items[pivot + 1..].reverse();
    true
}
