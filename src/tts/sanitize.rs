//! Text cleanup ahead of segmentation: emoji, URLs, and markup noise make
//! synthesis engines stutter or read junk aloud.

use crate::tts::language::Language;
use regex::Regex;
use std::sync::LazyLock;

static MARKDOWN_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]\([^)]*\)").unwrap());

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bhttps?://\S+|\bwww\.\S+|\b[a-z0-9][a-z0-9-]*\.(?:com|net|org|io|me|co)(?:/\S*)?")
        .unwrap()
});

static DASH_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-–—]{2,}").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

// Runs of Arabic diacritics; a single mark is meaningful, a pile is noise
static ARABIC_DIACRITIC_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{064B}-\u{065F}\u{0670}]{2,}").unwrap());

const ARABIC_TATWEEL: char = '\u{0640}';

const MARKUP_CHARS: &[char] = &[
    '*', '_', '~', '`', '#', '|', '<', '>', '[', ']', '{', '}', '"', '=', '+', '\\', '^', '•',
];

fn is_emoji(c: char) -> bool {
    let cp = c as u32;
    matches!(cp,
        0x1F000..=0x1FAFF   // pictographs, emoticons, transport, symbols
        | 0x2600..=0x27BF   // misc symbols, dingbats
        | 0x2B00..=0x2BFF
        | 0xFE00..=0xFE0F   // variation selectors
        | 0x200D            // zero-width joiner
        | 0x1F1E6..=0x1F1FF // regional indicators
    )
}

/// Strip everything a speech engine should not try to read. If cleaning
/// leaves nothing, the trimmed original is returned instead so the caller
/// still has something to synthesize.
pub fn sanitize(text: &str, language: Language) -> String {
    let mut s = MARKDOWN_LINK_RE.replace_all(text, " ").into_owned();
    s = URL_RE.replace_all(&s, " ").into_owned();
    s = s
        .chars()
        .filter(|c| !is_emoji(*c))
        .map(|c| if MARKUP_CHARS.contains(&c) { ' ' } else { c })
        .collect();

    if language == Language::Ar {
        s = s.replace(ARABIC_TATWEEL, "");
        s = ARABIC_DIACRITIC_RUN_RE.replace_all(&s, "").into_owned();
    }

    s = DASH_RUN_RE.replace_all(&s, " ").into_owned();
    s = WHITESPACE_RE.replace_all(&s, " ").trim().to_string();

    if s.is_empty() {
        text.trim().to_string()
    } else {
        s
    }
}
