/// Marker parser: extracts emphasized target words from generated prose.
///
/// Pairing is first-match-wins: an opening delimiter pairs with the next
/// delimiter in the paragraph. An empty or blank pair emits its opener as
/// literal text and rescans from the would-be closer. A delimiter with no
/// closer is literal text. Nothing here fails; zero occurrences is the
/// caller's signal that extraction produced nothing usable.
use serde::{Deserialize, Serialize};

use crate::core::text::{sentence_index_in, sentence_spans};
use crate::schema::occurrence::Occurrence;

/// Default emphasis delimiter.
pub const DEFAULT_MARKER: &str = "**";

/// Clean prose plus the occurrences found in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedText {
    pub clean_paragraphs: Vec<String>,
    pub occurrences: Vec<Occurrence>,
}

impl ParsedText {
    /// True when no marked occurrence was found.
    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }
}

/// Parse paragraphs with the default `**` delimiter.
pub fn parse_marked<S: AsRef<str>>(paragraphs: &[S]) -> ParsedText {
    parse_with_marker(paragraphs, DEFAULT_MARKER)
}

/// Parse paragraphs with an arbitrary non-empty delimiter.
pub fn parse_with_marker<S: AsRef<str>>(paragraphs: &[S], marker: &str) -> ParsedText {
    let mut parsed = ParsedText::default();

    for (paragraph_index, raw) in paragraphs.iter().enumerate() {
        let (clean, spans) = strip_markers(raw.as_ref(), marker);
        let sentences = sentence_spans(&clean);

        for span in spans {
            let sentence_index = sentence_index_in(&sentences, span.start);
            parsed.occurrences.push(Occurrence::with_span(
                &clean[span.clone()],
                paragraph_index,
                sentence_index,
                span.start,
                span.end,
            ));
        }
        parsed.clean_paragraphs.push(clean);
    }

    parsed
}

/// Remove paired markers from one paragraph, returning the cleaned text and
/// the byte spans of the marked contents within it.
fn strip_markers(raw: &str, marker: &str) -> (String, Vec<std::ops::Range<usize>>) {
    let mut clean = String::with_capacity(raw.len());
    let mut spans = Vec::new();

    if marker.is_empty() {
        clean.push_str(raw);
        return (clean, spans);
    }

    let mut rest = raw;
    while let Some(open) = rest.find(marker) {
        clean.push_str(&rest[..open]);
        let after_open = &rest[open + marker.len()..];

        let Some(close) = after_open.find(marker) else {
            // Unmatched opener: the remainder is literal.
            clean.push_str(&rest[open..]);
            return (clean, spans);
        };

        let content = &after_open[..close];
        if content.trim().is_empty() {
            clean.push_str(marker);
            clean.push_str(content);
            rest = &after_open[close..];
            continue;
        }

        let start = clean.len();
        clean.push_str(content);
        spans.push(start..clean.len());
        rest = &after_open[close + marker.len()..];
    }

    clean.push_str(rest);
    (clean, spans)
}

/// Re-wrap every occurrence of `parsed` in the marker, reversing the parse.
pub fn rewrap(parsed: &ParsedText, marker: &str) -> Vec<String> {
    parsed
        .clean_paragraphs
        .iter()
        .enumerate()
        .map(|(p, text)| {
            let mut spans: Vec<_> = parsed
                .occurrences
                .iter()
                .filter(|occ| occ.paragraph_index == p)
                .filter_map(Occurrence::span)
                .collect();
            spans.sort_by_key(|s| s.start);

            let mut out = String::with_capacity(text.len() + spans.len() * marker.len() * 2);
            let mut cursor = 0;
            for span in spans {
                if span.start < cursor || span.end > text.len() {
                    continue;
                }
                out.push_str(&text[cursor..span.start]);
                out.push_str(marker);
                out.push_str(&text[span.clone()]);
                out.push_str(marker);
                cursor = span.end;
            }
            out.push_str(&text[cursor..]);
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_marker_scenario() {
        let parsed = parse_marked(&["The **harbor** is calm."]);
        assert_eq!(parsed.clean_paragraphs, vec!["The harbor is calm."]);
        assert_eq!(parsed.occurrences.len(), 1);

        let occ = &parsed.occurrences[0];
        assert_eq!(occ.word, "harbor");
        assert_eq!(occ.paragraph_index, 0);
        assert_eq!(occ.sentence_index, 0);
        assert_eq!(occ.span(), Some(4..10));
    }

    #[test]
    fn sentence_index_follows_cleaned_text() {
        let parsed = parse_marked(&[
            "Gulls cried. Then the **harbor** woke! Far off, the **Meadow** dozed.",
        ]);
        let found: Vec<(&str, usize)> = parsed
            .occurrences
            .iter()
            .map(|o| (o.word.as_str(), o.sentence_index))
            .collect();
        assert_eq!(found, vec![("harbor", 1), ("Meadow", 2)]);
    }

    #[test]
    fn paragraph_indices_follow_input_order() {
        let parsed = parse_marked(&["No marks here.", "A **meadow** bloomed."]);
        assert_eq!(parsed.clean_paragraphs[0], "No marks here.");
        assert_eq!(parsed.occurrences[0].paragraph_index, 1);
    }

    #[test]
    fn unmatched_marker_is_literal() {
        let parsed = parse_marked(&["A **harbor** and a **loose end."]);
        assert_eq!(parsed.clean_paragraphs[0], "A harbor and a **loose end.");
        assert_eq!(parsed.occurrences.len(), 1);
    }

    #[test]
    fn empty_pair_is_literal_and_rescanned() {
        let parsed = parse_marked(&["****harbor** waits."]);
        assert_eq!(parsed.clean_paragraphs[0], "**harbor waits.");
        assert_eq!(parsed.occurrences.len(), 1);
        assert_eq!(parsed.occurrences[0].word, "harbor");
        assert_eq!(parsed.occurrences[0].span(), Some(2..8));
    }

    #[test]
    fn no_markers_is_empty_result() {
        let parsed = parse_marked(&["Plain prose only.", ""]);
        assert!(parsed.is_empty());
        assert_eq!(parsed.clean_paragraphs.len(), 2);
    }

    #[test]
    fn custom_marker() {
        let parsed = parse_with_marker(&["The __tide__ turned."], "__");
        assert_eq!(parsed.clean_paragraphs[0], "The tide turned.");
        assert_eq!(parsed.occurrences[0].word, "tide");
    }

    #[test]
    fn offsets_index_cleaned_text() {
        let raw = ["First **alpha** then **beta**. And **gamma**."];
        let parsed = parse_marked(&raw);
        let text = &parsed.clean_paragraphs[0];
        for occ in &parsed.occurrences {
            let span = occ.span().unwrap();
            assert_eq!(&text[span], occ.word);
        }
        assert_eq!(parsed.occurrences[2].sentence_index, 1);
    }

    #[test]
    fn rewrap_restores_input() {
        let raw = ["The **harbor** is calm. A **meadow** waits.", "Nothing else."];
        let parsed = parse_marked(&raw);
        assert_eq!(rewrap(&parsed, DEFAULT_MARKER), raw.to_vec());
    }
}
