/// Text segmentation shared by the marker parser, the noise selector and the
/// fallback generator. All ranges are byte ranges into the given text.
use std::ops::Range;

/// Characters that end a sentence.
const SENTENCE_ENDERS: &[char] = &['.', '!', '?'];
/// Closing quotes and brackets allowed between a sentence ender and the
/// whitespace that confirms the boundary.
const CLOSERS: &[char] = &['"', '\'', ')', ']', '\u{201D}', '\u{2019}'];
/// Characters that join two alphanumeric runs into one word ("don't", "sea-wall").
const JOINERS: &[char] = &['\'', '-', '\u{2019}'];

/// Split text into sentence spans.
///
/// A boundary sits after a run of sentence enders (optionally followed by
/// closers) only when whitespace follows. Trailing whitespace stays with the
/// preceding sentence, so the spans tile the whole text. Text without any
/// boundary, including empty text, is a single sentence.
pub fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !SENTENCE_ENDERS.contains(&c) {
            continue;
        }

        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if SENTENCE_ENDERS.contains(&next) || CLOSERS.contains(&next) {
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        if !matches!(chars.peek(), Some(&(_, next)) if next.is_whitespace()) {
            continue;
        }
        while let Some(&(j, ws)) = chars.peek() {
            if !ws.is_whitespace() {
                break;
            }
            end = j + ws.len_utf8();
            chars.next();
        }

        // Whitespace running to the end of text closes nothing new.
        if end < text.len() {
            spans.push(start..end);
            start = end;
        }
    }

    spans.push(start..text.len());
    spans
}

/// Index of the span containing `offset`. Offsets at or past the end map
/// to the last sentence.
pub fn sentence_index_in(spans: &[Range<usize>], offset: usize) -> usize {
    spans
        .iter()
        .position(|span| span.contains(&offset))
        .unwrap_or_else(|| spans.len().saturating_sub(1))
}

/// Sentence index of a byte offset, by cumulative scan over the sentences.
pub fn sentence_index_at(text: &str, offset: usize) -> usize {
    sentence_index_in(&sentence_spans(text), offset)
}

/// Word candidates: maximal alphanumeric runs, joined across internal
/// apostrophes and hyphens.
pub fn word_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut current: Option<usize> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c.is_alphanumeric() {
            current.get_or_insert(i);
            continue;
        }
        if let Some(start) = current {
            let joins = JOINERS.contains(&c)
                && chars.peek().is_some_and(|&(_, next)| next.is_alphanumeric());
            if joins {
                continue;
            }
            spans.push(start..i);
            current = None;
        }
    }

    if let Some(start) = current {
        spans.push(start..text.len());
    }
    spans
}

/// Maximal runs of alphabetic characters inside `range`.
pub fn alphabetic_runs(text: &str, range: Range<usize>) -> Vec<Range<usize>> {
    let offset = range.start;
    let mut runs = Vec::new();
    let mut current: Option<usize> = None;

    for (i, c) in text[range.clone()].char_indices() {
        if c.is_alphabetic() {
            current.get_or_insert(offset + i);
        } else if let Some(start) = current.take() {
            runs.push(start..offset + i);
        }
    }
    if let Some(start) = current {
        runs.push(start..range.end);
    }
    runs
}

/// First case-insensitive whole-word match of `word` within `range`.
///
/// Whole word candidates are tried first, then bare alphabetic runs so that
/// "harbor" is still found inside "harbor's".
pub fn find_word(text: &str, word: &str, range: Range<usize>) -> Option<Range<usize>> {
    let wanted = word.to_lowercase();
    let within = |span: &Range<usize>| span.start >= range.start && span.end <= range.end;

    word_spans(text)
        .into_iter()
        .filter(|span| within(span))
        .find(|span| text[span.clone()].to_lowercase() == wanted)
        .or_else(|| {
            alphabetic_runs(text, range.clone())
                .into_iter()
                .find(|span| text[span.clone()].to_lowercase() == wanted)
        })
}

/// True if any word of `text` equals one of `words` (already lowercased).
pub fn mentions_any(text: &str, words: &[String]) -> bool {
    let full = 0..text.len();
    word_spans(text)
        .into_iter()
        .chain(alphabetic_runs(text, full))
        .any(|span| {
            let lower = text[span].to_lowercase();
            words.iter().any(|w| *w == lower)
        })
}
