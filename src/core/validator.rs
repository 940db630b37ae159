/// Placement validator: checks finalized paragraphs and occurrences against
/// the placement rules and itemizes every violation.
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::occurrence::{Occurrence, SentenceKey};
use crate::schema::story::{OCCURRENCES_PER_WORD, PARAGRAPH_COUNT};

/// How the per-word total is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountMode {
    /// Each target word occurs exactly `OCCURRENCES_PER_WORD` times.
    #[default]
    Exact,
    /// Each target word occurs at least `OCCURRENCES_PER_WORD` times.
    AtLeast,
}

/// Outcome of a validation run. `ok` is true exactly when `violations` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub ok: bool,
    pub violations: Vec<String>,
}

impl Verdict {
    fn from_violations(violations: Vec<String>) -> Self {
        Self {
            ok: violations.is_empty(),
            violations,
        }
    }

    /// Fold another verdict's violations into this one.
    pub fn merge(mut self, other: Verdict) -> Self {
        self.violations.extend(other.violations);
        self.ok = self.violations.is_empty();
        self
    }
}

/// The placement rule set. Stateless apart from the count mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementValidator {
    pub count_mode: CountMode,
}

impl PlacementValidator {
    pub fn new(count_mode: CountMode) -> Self {
        Self { count_mode }
    }

    /// Full-story check: paragraph count plus every occurrence rule.
    pub fn check_story<S: AsRef<str>>(
        &self,
        words: &[String],
        paragraphs: &[S],
        occurrences: &[Occurrence],
    ) -> Verdict {
        let mut violations = Vec::new();
        if paragraphs.len() != PARAGRAPH_COUNT {
            violations.push(format!(
                "story has {} paragraphs, expected exactly {}",
                paragraphs.len(),
                PARAGRAPH_COUNT
            ));
        }
        violations.extend(self.occurrence_violations(words, PARAGRAPH_COUNT, occurrences));
        Verdict::from_violations(violations)
    }

    /// Occurrence-only check against an externally supplied paragraph count.
    pub fn check_occurrences(
        &self,
        words: &[String],
        paragraph_count: usize,
        occurrences: &[Occurrence],
    ) -> Verdict {
        Verdict::from_violations(self.occurrence_violations(words, paragraph_count, occurrences))
    }

    /// Cross-story rule: no target word may sit at the same sentence key in
    /// both stories.
    pub fn check_cross_story(
        &self,
        words: &[String],
        first: &[Occurrence],
        second: &[Occurrence],
    ) -> Verdict {
        let targets = lowercase_set(words);
        let positions = |occurrences: &[Occurrence]| -> FxHashSet<(String, SentenceKey)> {
            occurrences
                .iter()
                .map(|occ| (occ.normalized_word(), occ.key()))
                .filter(|(word, _)| targets.contains(word))
                .collect()
        };
        let first_positions = positions(first);
        let mut shared: Vec<(String, SentenceKey)> = positions(second)
            .into_iter()
            .filter(|pos| first_positions.contains(pos))
            .collect();
        shared.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        Verdict::from_violations(
            shared
                .into_iter()
                .map(|(word, key)| {
                    format!("'{}' occupies the same position ({}) in both stories", word, key)
                })
                .collect(),
        )
    }

    /// Validate the two stories of an experiment together.
    pub fn check_pair<S: AsRef<str>>(
        &self,
        words: &[String],
        first: (&[S], &[Occurrence]),
        second: (&[S], &[Occurrence]),
    ) -> Verdict {
        let tag = |label: &str, verdict: Verdict| {
            Verdict::from_violations(
                verdict
                    .violations
                    .into_iter()
                    .map(|v| format!("{}: {}", label, v))
                    .collect(),
            )
        };
        tag("story A", self.check_story(words, first.0, first.1))
            .merge(tag("story B", self.check_story(words, second.0, second.1)))
            .merge(self.check_cross_story(words, first.1, second.1))
    }

    fn occurrence_violations(
        &self,
        words: &[String],
        paragraph_count: usize,
        occurrences: &[Occurrence],
    ) -> Vec<String> {
        let targets = lowercase_set(words);
        let mut violations = Vec::new();

        // Local groupings; only target words take part in the rules.
        let mut per_word: FxHashMap<String, usize> = FxHashMap::default();
        let mut per_paragraph: BTreeMap<(String, usize), usize> = BTreeMap::new();
        let mut per_sentence: BTreeMap<SentenceKey, Vec<String>> = BTreeMap::new();

        for occ in occurrences {
            let word = occ.normalized_word();
            if !targets.contains(&word) {
                continue;
            }
            if occ.paragraph_index >= paragraph_count {
                violations.push(format!(
                    "'{}' is placed in paragraph {}, outside the {} paragraphs",
                    word, occ.paragraph_index, paragraph_count
                ));
            }
            *per_word.entry(word.clone()).or_default() += 1;
            *per_paragraph
                .entry((word.clone(), occ.paragraph_index))
                .or_default() += 1;
            let in_sentence = per_sentence.entry(occ.key()).or_default();
            if !in_sentence.contains(&word) {
                in_sentence.push(word);
            }
        }

        for word in words {
            let word = word.to_lowercase();
            let count = per_word.get(&word).copied().unwrap_or(0);
            let bad = match self.count_mode {
                CountMode::Exact => count != OCCURRENCES_PER_WORD,
                CountMode::AtLeast => count < OCCURRENCES_PER_WORD,
            };
            if bad {
                let expected = match self.count_mode {
                    CountMode::Exact => "exactly",
                    CountMode::AtLeast => "at least",
                };
                violations.push(format!(
                    "'{}' occurs {} times, expected {} {}",
                    word, count, expected, OCCURRENCES_PER_WORD
                ));
            }
        }

        for ((word, paragraph), count) in &per_paragraph {
            if *count > 1 {
                violations.push(format!(
                    "'{}' occurs {} times in paragraph {} (at most once per paragraph)",
                    word, count, paragraph
                ));
            }
        }

        for (key, sharing) in &per_sentence {
            if sharing.len() > 1 {
                violations.push(format!(
                    "{} contains more than one target word: {}",
                    key,
                    sharing.join(", ")
                ));
            }
        }

        violations
    }
}

fn lowercase_set(words: &[String]) -> FxHashSet<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}
