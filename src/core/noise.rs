/// Noise selector: picks non-target distractor words per paragraph.
///
/// A candidate is rejected when it is a target word, sits in a sentence that
/// holds a target occurrence, or is separated from a target occurrence only
/// by up to three non-letter characters. Candidates are tiered by length
/// (4+, 3+, 2+ characters, then bare alphabetic runs) and the first tier with
/// a survivor supplies the picks, earliest position first. Tokens without a
/// single letter, such as bare numbers, never enter the tiers.
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::core::text::{alphabetic_runs, find_word, sentence_index_in, sentence_spans, word_spans};
use crate::schema::occurrence::Occurrence;

/// Default number of noise words per paragraph.
pub const DEFAULT_NOISE_PER_PARAGRAPH: usize = 2;

/// Largest non-letter gap that still counts as adjacent to a target word.
const ADJACENCY_GAP: usize = 3;

/// Minimum token lengths tried in order before falling back to bare runs.
const LENGTH_TIERS: [usize; 3] = [4, 3, 2];

/// Noise words proposed by an external generator, one list per paragraph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseProposal {
    #[serde(alias = "noise")]
    pub paragraphs: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy)]
pub struct NoiseSelector {
    per_paragraph: usize,
}

impl Default for NoiseSelector {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_PER_PARAGRAPH)
    }
}

impl NoiseSelector {
    pub fn new(per_paragraph: usize) -> Self {
        Self { per_paragraph }
    }

    /// Select noise with the local algorithm only.
    pub fn select(
        &self,
        paragraphs: &[String],
        targets: &[Occurrence],
        words: &[String],
    ) -> Vec<Occurrence> {
        self.select_with_proposal(paragraphs, targets, words, None)
    }

    /// Select noise, verifying a proposal first. A paragraph whose proposal
    /// is absent or verifies to nothing uses the local algorithm.
    pub fn select_with_proposal(
        &self,
        paragraphs: &[String],
        targets: &[Occurrence],
        words: &[String],
        proposal: Option<&NoiseProposal>,
    ) -> Vec<Occurrence> {
        let words: FxHashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();
        let mut noise = Vec::new();

        for (p, text) in paragraphs.iter().enumerate() {
            let view = ParagraphView::new(p, text, targets, &words);

            let proposed = proposal
                .and_then(|prop| prop.paragraphs.get(p))
                .map(|list| view.verify(list, self.per_paragraph))
                .unwrap_or_default();

            let spans = if proposed.is_empty() {
                view.local(self.per_paragraph)
            } else {
                proposed
            };
            noise.extend(spans.into_iter().map(|span| view.occurrence(span)));
        }

        noise
    }
}

/// One paragraph plus everything the exclusion rules need to know about it.
struct ParagraphView<'a> {
    index: usize,
    text: &'a str,
    sentences: Vec<Range<usize>>,
    blocked_sentences: FxHashSet<usize>,
    target_spans: Vec<Range<usize>>,
    words: &'a FxHashSet<String>,
}

impl<'a> ParagraphView<'a> {
    fn new(
        index: usize,
        text: &'a str,
        targets: &[Occurrence],
        words: &'a FxHashSet<String>,
    ) -> Self {
        let sentences = sentence_spans(text);
        let here: Vec<&Occurrence> = targets.iter().filter(|o| o.paragraph_index == index).collect();

        let blocked_sentences = here.iter().map(|o| o.sentence_index).collect();
        let target_spans = here
            .iter()
            .filter_map(|occ| locate(text, &sentences, occ))
            .collect();

        Self {
            index,
            text,
            sentences,
            blocked_sentences,
            target_spans,
            words,
        }
    }

    fn sentence_of(&self, span: &Range<usize>) -> usize {
        sentence_index_in(&self.sentences, span.start)
    }

    fn admits(&self, span: &Range<usize>) -> bool {
        let lower = self.text[span.clone()].to_lowercase();
        !self.words.contains(&lower)
            && !self.blocked_sentences.contains(&self.sentence_of(span))
            && !self.target_spans.iter().any(|t| self.adjacent(span, t))
    }

    fn adjacent(&self, span: &Range<usize>, target: &Range<usize>) -> bool {
        let gap = if span.end <= target.start {
            &self.text[span.end..target.start]
        } else if target.end <= span.start {
            &self.text[target.end..span.start]
        } else {
            return true;
        };
        gap.chars().count() <= ADJACENCY_GAP && !gap.chars().any(char::is_alphabetic)
    }

    /// First admissible spans by position.
    fn take_first(&self, candidates: impl Iterator<Item = Range<usize>>, limit: usize) -> Vec<Range<usize>> {
        candidates.filter(|span| self.admits(span)).take(limit).collect()
    }

    fn local(&self, limit: usize) -> Vec<Range<usize>> {
        if limit == 0 {
            return Vec::new();
        }
        let tokens: Vec<Range<usize>> = word_spans(self.text)
            .into_iter()
            .filter(|span| is_wordlike(&self.text[span.clone()]))
            .collect();

        for min_len in LENGTH_TIERS {
            let tier = tokens
                .iter()
                .filter(|span| self.text[(*span).clone()].chars().count() >= min_len)
                .cloned();
            let picked = self.take_first(tier, limit);
            if !picked.is_empty() {
                return picked;
            }
        }

        let runs = alphabetic_runs(self.text, 0..self.text.len())
            .into_iter()
            .filter(|span| self.text[span.clone()].chars().count() >= 2);
        self.take_first(runs, limit)
    }

    /// Map each proposed word to its first admissible position.
    fn verify(&self, proposed: &[String], limit: usize) -> Vec<Range<usize>> {
        let mut picked: Vec<Range<usize>> = Vec::new();
        for word in proposed {
            if picked.len() >= limit {
                break;
            }
            let wanted = word.trim().to_lowercase();
            if wanted.is_empty() {
                continue;
            }
            let hit = word_spans(self.text)
                .into_iter()
                .chain(alphabetic_runs(self.text, 0..self.text.len()))
                .filter(|span| self.text[span.clone()].to_lowercase() == wanted)
                .find(|span| self.admits(span));
            match hit {
                Some(span) if !picked.contains(&span) => picked.push(span),
                Some(_) => {}
                None => log::debug!(
                    "noise proposal '{}' rejected in paragraph {}",
                    word,
                    self.index
                ),
            }
        }
        picked.sort_by_key(|span| span.start);
        picked
    }

    fn occurrence(&self, span: Range<usize>) -> Occurrence {
        Occurrence::with_span(
            &self.text[span.clone()],
            self.index,
            self.sentence_of(&span),
            span.start,
            span.end,
        )
    }
}

fn is_wordlike(token: &str) -> bool {
    token.chars().any(char::is_alphabetic)
}

/// The byte span of a target occurrence: its recorded offsets when they fit
/// the text, otherwise the first match of its word inside its sentence.
fn locate(text: &str, sentences: &[Range<usize>], occ: &Occurrence) -> Option<Range<usize>> {
    if let Some(span) = occ.span() {
        if span.end <= text.len() && text.is_char_boundary(span.start) && text.is_char_boundary(span.end) {
            return Some(span);
        }
    }
    let sentence = sentences
        .get(occ.sentence_index)
        .cloned()
        .unwrap_or(0..text.len());
    find_word(text, &occ.word, sentence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::markers::parse_marked;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    fn picked(noise: &[Occurrence], p: usize) -> Vec<&str> {
        noise
            .iter()
            .filter(|o| o.paragraph_index == p)
            .map(|o| o.word.as_str())
            .collect()
    }

    #[test]
    fn picks_first_two_outside_target_sentences() {
        let parsed = parse_marked(&[
            "The **harbor** glittered at dawn. Fishermen mended their nets slowly. Seagulls circled overhead.",
        ]);
        let noise = NoiseSelector::default().select(
            &parsed.clean_paragraphs,
            &parsed.occurrences,
            &words(&["harbor"]),
        );
        assert_eq!(picked(&noise, 0), vec!["Fishermen", "mended"]);
        assert!(noise.iter().all(|o| o.sentence_index == 1));
    }

    #[test]
    fn adjacency_across_sentence_boundary() {
        // "Waves" follows the target with only ". " between them.
        let parsed = parse_marked(&["They reached the **harbor**. Waves crashed against stone walls."]);
        let noise = NoiseSelector::default().select(
            &parsed.clean_paragraphs,
            &parsed.occurrences,
            &words(&["harbor"]),
        );
        assert_eq!(picked(&noise, 0), vec!["crashed", "against"]);
    }

    #[test]
    fn gap_with_letters_is_not_adjacent() {
        let text = "harbor. Ox Waves".to_string();
        let targets = vec![Occurrence::with_span("harbor", 0, 0, 0, 6)];
        let all = FxHashSet::default();
        let view = ParagraphView::new(0, &text, &targets, &all);
        // ". Ox " separates harbor and Waves: letters in the gap.
        assert!(!view.adjacent(&(11..16), &(0..6)));
        // ". " separates harbor and Ox: adjacent.
        assert!(view.adjacent(&(8..10), &(0..6)));
    }

    #[test]
    fn target_words_never_picked() {
        let parsed = parse_marked(&["Boats rest. The **harbor** sleeps. Meadow grass and harbor lights glow."]);
        let noise = NoiseSelector::default().select(
            &parsed.clean_paragraphs,
            &parsed.occurrences,
            &words(&["harbor", "meadow"]),
        );
        for occ in &noise {
            assert_ne!(occ.normalized_word(), "harbor");
            assert_ne!(occ.normalized_word(), "meadow");
        }
        assert_eq!(picked(&noise, 0), vec!["Boats", "rest"]);
    }

    #[test]
    fn degrades_to_shorter_tokens() {
        let paragraphs = vec!["An ox ran. The **harbor** is here.".to_string()];
        let parsed = parse_marked(&paragraphs);
        let noise = NoiseSelector::default().select(
            &parsed.clean_paragraphs,
            &parsed.occurrences,
            &words(&["harbor"]),
        );
        assert_eq!(picked(&noise, 0), vec!["ran"]);
    }

    #[test]
    fn degrades_to_two_letter_tokens() {
        let parsed = parse_marked(&["An ox. The **harbor** is here."]);
        let noise = NoiseSelector::default().select(
            &parsed.clean_paragraphs,
            &parsed.occurrences,
            &words(&["harbor"]),
        );
        assert_eq!(picked(&noise, 0), vec!["An", "ox"]);
    }

    #[test]
    fn tokens_with_digits_are_candidates() {
        let parsed = parse_marked(&["7ab 9cd. The **harbor** is here."]);
        let noise = NoiseSelector::default().select(
            &parsed.clean_paragraphs,
            &parsed.occurrences,
            &words(&["harbor"]),
        );
        assert_eq!(picked(&noise, 0), vec!["7ab", "9cd"]);

        let parsed = parse_marked(&["On 42nd street 2026 came. The **harbor** is here."]);
        let noise = NoiseSelector::default().select(
            &parsed.clean_paragraphs,
            &parsed.occurrences,
            &words(&["harbor"]),
        );
        assert_eq!(picked(&noise, 0), vec!["42nd", "street"]);
    }

    #[test]
    fn empty_when_every_sentence_has_a_target() {
        let parsed = parse_marked(&["The **harbor** glows. A **meadow** waits."]);
        let noise = NoiseSelector::default().select(
            &parsed.clean_paragraphs,
            &parsed.occurrences,
            &words(&["harbor", "meadow"]),
        );
        assert!(noise.is_empty());
    }

    #[test]
    fn targets_without_offsets_are_located() {
        let paragraphs = vec!["Rain fell. They reached the harbor. Waves crashed loudly.".to_string()];
        let targets = vec![Occurrence::at("harbor", 0, 1)];
        let noise = NoiseSelector::default().select(&paragraphs, &targets, &words(&["harbor"]));
        assert_eq!(picked(&noise, 0), vec!["Rain", "fell"]);

        let paragraphs = vec!["They reached the harbor. Waves crashed loudly.".to_string()];
        let targets = vec![Occurrence::at("harbor", 0, 0)];
        let noise = NoiseSelector::default().select(&paragraphs, &targets, &words(&["harbor"]));
        assert_eq!(picked(&noise, 0), vec!["crashed", "loudly"]);
    }

    #[test]
    fn repeated_words_are_taken_by_position() {
        let paragraphs = vec!["Bells bells bells rang. The harbor slept.".to_string()];
        let targets = vec![Occurrence::at("harbor", 0, 1)];
        let noise = NoiseSelector::default().select(&paragraphs, &targets, &words(&["harbor"]));
        let spans: Vec<(&str, Option<usize>)> =
            noise.iter().map(|o| (o.word.as_str(), o.char_start)).collect();
        assert_eq!(spans, vec![("Bells", Some(0)), ("bells", Some(6))]);
    }

    #[test]
    fn proposal_verified_and_clamped() {
        let parsed = parse_marked(&[
            "The **harbor** glittered. Fishermen mended nets. Seagulls circled overhead.",
            "A **harbor** bell rang. Children laughed nearby.",
        ]);
        let proposal = NoiseProposal {
            paragraphs: vec![
                vec![
                    "glittered".to_string(), // shares the target sentence
                    "harbor".to_string(),    // a target word
                    "Seagulls".to_string(),
                    "nets".to_string(),
                    "overhead".to_string(),
                ],
                vec![],
            ],
        };
        let noise = NoiseSelector::default().select_with_proposal(
            &parsed.clean_paragraphs,
            &parsed.occurrences,
            &words(&["harbor"]),
            Some(&proposal),
        );
        // Verified picks come back in text order, clamped to two.
        assert_eq!(picked(&noise, 0), vec!["nets", "Seagulls"]);
        // Empty proposal for paragraph 1 falls back to the local algorithm.
        assert_eq!(picked(&noise, 1), vec!["Children", "laughed"]);
    }

    #[test]
    fn proposal_json_accepts_noise_alias() {
        let proposal: NoiseProposal = serde_json::from_str(r#"{"noise": [["gulls"], []]}"#).unwrap();
        assert_eq!(proposal.paragraphs.len(), 2);
        assert_eq!(proposal.paragraphs[0], vec!["gulls".to_string()]);
    }

    #[test]
    fn offsets_and_sentences_are_exact() {
        let parsed = parse_marked(&["Rain fell softly. The **harbor** slept. Dogs barked far away."]);
        let noise = NoiseSelector::new(4).select(
            &parsed.clean_paragraphs,
            &parsed.occurrences,
            &words(&["harbor"]),
        );
        let text = &parsed.clean_paragraphs[0];
        for occ in &noise {
            let span = occ.span().unwrap();
            assert_eq!(&text[span.clone()], occ.word);
            assert_eq!(crate::core::text::sentence_index_at(text, span.start), occ.sentence_index);
            assert_ne!(occ.sentence_index, 1);
        }
        assert_eq!(noise.len(), 4);
    }
}
