/// Phase scheduler: maps a word's occurrences onto exposure phases.
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::schema::occurrence::{Occurrence, SentenceKey};
use crate::schema::phase::{Phase, PhasePlacement};

/// Assign distinct positions to baseline, learning and reinforcement.
///
/// Earliest occurrences in distinct paragraphs are taken first. When fewer
/// than three exist, placeholders at sentence 0 of the first unused
/// paragraphs fill in, so long as paragraphs remain.
pub fn schedule_phases(occurrences: &[Occurrence], paragraph_count: usize) -> PhasePlacement {
    let wanted = Phase::EXPOSED.len();

    let mut keys: Vec<SentenceKey> = occurrences.iter().map(Occurrence::key).collect();
    keys.sort();
    keys.dedup();

    let mut chosen: Vec<SentenceKey> = Vec::with_capacity(wanted);
    for key in keys {
        if chosen.len() == wanted {
            break;
        }
        if chosen.iter().all(|c| c.paragraph_index != key.paragraph_index) {
            chosen.push(key);
        }
    }

    let mut paragraph = 0;
    let mut scanned = 0;
    while chosen.len() < wanted && scanned < paragraph_count {
        if chosen.iter().all(|c| c.paragraph_index != paragraph) {
            chosen.push(SentenceKey::new(paragraph, 0));
        }
        paragraph = (paragraph + 1) % paragraph_count;
        scanned += 1;
    }

    chosen.sort();
    PhasePlacement::from_positions(&chosen)
}

/// Schedule every word from one combined occurrence list, such as the
/// target occurrences of both stories in an experiment.
pub fn schedule_words(
    words: &[String],
    occurrences: &[Occurrence],
    paragraph_count: usize,
) -> BTreeMap<String, PhasePlacement> {
    let mut by_word: FxHashMap<String, Vec<Occurrence>> = FxHashMap::default();
    for occ in occurrences {
        by_word
            .entry(occ.normalized_word())
            .or_default()
            .push(occ.clone());
    }

    words
        .iter()
        .map(|word| {
            let word = word.to_lowercase();
            let occs = by_word.get(&word).map(Vec::as_slice).unwrap_or(&[]);
            let placement = schedule_phases(occs, paragraph_count);
            (word, placement)
        })
        .collect()
}
