//! Punctuation-boundary segmentation of cleaned text into speech-sized
//! units. Micro-segments are absorbed into an adjacent full-size segment so
//! providers are not asked to voice two-word fragments.

use crate::tts::language::Language;

/// Segments shorter than this (in chars) are merge candidates.
pub const MERGE_THRESHOLD: usize = 10;

const GENERIC_BREAKS: &[char] = &['.', '!', '?', ',', ':', ';', '\n'];
const ARABIC_BREAKS: &[char] = &['.', '!', '?', ',', ':', ';', '\n', '؟', '،', '؛'];

fn break_set(language: Language) -> &'static [char] {
    if language == Language::Ar {
        ARABIC_BREAKS
    } else {
        GENERIC_BREAKS
    }
}

/// Split `text` on sentence/clause punctuation (kept at the end of each
/// segment), then merge: a segment under [`MERGE_THRESHOLD`] is held and
/// prepended to the next full-size segment; consecutive short segments are
/// emitted separately rather than piled into one blob. Empty input yields an
/// empty list.
pub fn segment(text: &str, language: Language) -> Vec<String> {
    let breaks = break_set(language);

    let mut raw: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if breaks.contains(&c) {
            // Absorb a run of break characters ("..", "?!") into one boundary
            while let Some(&next) = chars.peek() {
                if breaks.contains(&next) {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                raw.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        raw.push(trimmed.to_string());
    }

    let mut out: Vec<String> = Vec::new();
    let mut held: Option<String> = None;
    for seg in raw {
        let is_short = seg.chars().count() < MERGE_THRESHOLD;
        match held.take() {
            Some(prev) if !is_short => out.push(format!("{prev} {seg}")),
            Some(prev) => {
                out.push(prev);
                held = Some(seg);
            }
            None if is_short => held = Some(seg),
            None => out.push(seg),
        }
    }
    if let Some(prev) = held {
        out.push(prev);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_segments() {
        assert!(segment("", Language::En).is_empty());
        assert!(segment("   ", Language::En).is_empty());
    }

    #[test]
    fn two_short_sentences_stay_separate() {
        assert_eq!(
            segment("Hello. World!", Language::En),
            vec!["Hello.", "World!"]
        );
    }

    #[test]
    fn short_fragment_merges_into_following_segment() {
        assert_eq!(
            segment("Hi. This is a longer sentence.", Language::En),
            vec!["Hi. This is a longer sentence."]
        );
    }

    #[test]
    fn punctuation_kept_at_segment_end() {
        let segs = segment("What is happening here? Nothing much happened!", Language::En);
        assert_eq!(
            segs,
            vec!["What is happening here?", "Nothing much happened!"]
        );
    }

    #[test]
    fn punctuation_runs_collapse_into_one_boundary() {
        assert_eq!(
            segment("Are you completely sure?! Definitely positive...", Language::En),
            vec!["Are you completely sure?!", "Definitely positive..."]
        );
    }

    #[test]
    fn arabic_punctuation_splits() {
        let segs = segment("كيف حالك اليوم؟ أنا بخير والحمد لله،", Language::Ar);
        assert_eq!(segs.len(), 2);
        assert!(segs[0].ends_with('؟'));
    }

    #[test]
    fn arabic_comma_ignored_for_english() {
        // Generic break set does not include the Arabic comma
        let segs = segment("one، two، all of this stays whole", Language::En);
        assert_eq!(segs.len(), 1);
    }

    #[test]
    fn commas_and_colons_split_clauses() {
        assert_eq!(
            segment(
                "First clause here, second clause there: final words",
                Language::En
            ),
            vec!["First clause here,", "second clause there:", "final words"]
        );
    }

    #[test]
    fn unterminated_tail_is_emitted() {
        assert_eq!(
            segment("First full sentence. trailing words here", Language::En),
            vec!["First full sentence.", "trailing words here"]
        );
    }

    #[test]
    fn trailing_short_fragment_is_emitted() {
        assert_eq!(
            segment("This is a long opening sentence. Bye.", Language::En),
            vec!["This is a long opening sentence.", "Bye."]
        );
    }
}
