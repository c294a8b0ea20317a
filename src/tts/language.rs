//! Language detection over a fixed set of thirteen tags.
//!
//! Script-range checks win outright; Latin-script text falls through to
//! lexical keyword scoring. The scoring deliberately favors English: any
//! nonzero English hit wins, and an all-zero score also defaults to English.
//! Downstream punctuation and voice tables depend on this exact behavior,
//! so it is preserved rather than rebalanced.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ar,
    Zh,
    Ja,
    Ko,
    Ru,
    Hi,
    En,
    De,
    Fr,
    Es,
    It,
    Pt,
    Tr,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Ar => "ar",
            Language::Zh => "zh",
            Language::Ja => "ja",
            Language::Ko => "ko",
            Language::Ru => "ru",
            Language::Hi => "hi",
            Language::En => "en",
            Language::De => "de",
            Language::Fr => "fr",
            Language::Es => "es",
            Language::It => "it",
            Language::Pt => "pt",
            Language::Tr => "tr",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::Ar => "Arabic",
            Language::Zh => "Chinese",
            Language::Ja => "Japanese",
            Language::Ko => "Korean",
            Language::Ru => "Russian",
            Language::Hi => "Hindi",
            Language::En => "English",
            Language::De => "German",
            Language::Fr => "French",
            Language::Es => "Spanish",
            Language::It => "Italian",
            Language::Pt => "Portuguese",
            Language::Tr => "Turkish",
        }
    }
}

const SCRIPT_RANGES: &[(Language, &[(u32, u32)])] = &[
    (
        Language::Ar,
        &[(0x0600, 0x06FF), (0x0750, 0x077F), (0x08A0, 0x08FF)],
    ),
    (Language::Zh, &[(0x4E00, 0x9FFF)]),
    (Language::Ja, &[(0x3040, 0x309F), (0x30A0, 0x30FF)]),
    (
        Language::Ko,
        &[(0xAC00, 0xD7AF), (0x1100, 0x11FF), (0x3130, 0x318F)],
    ),
    (Language::Ru, &[(0x0400, 0x04FF)]),
    (Language::Hi, &[(0x0900, 0x097F)]),
];

const EN_WORDS: &[&str] = &[
    "the", "and", "is", "are", "you", "that", "this", "have", "with", "for", "was", "not", "they",
    "what", "hello", "hi", "thanks", "please", "yes",
];
const DE_WORDS: &[&str] = &[
    "der", "und", "ist", "nicht", "das", "ich", "sie", "ein", "eine", "mit", "auf", "für", "aber",
    "auch", "wir", "hallo", "danke",
];
const FR_WORDS: &[&str] = &[
    "le", "la", "les", "est", "je", "ne", "pas", "que", "une", "des", "dans", "pour", "sur",
    "avec", "bonjour", "merci", "oui",
];
const ES_WORDS: &[&str] = &[
    "el", "los", "las", "una", "por", "para", "con", "está", "pero", "como", "más", "qué", "hola",
    "gracias", "muy", "sí",
];
const IT_WORDS: &[&str] = &[
    "il", "lo", "gli", "che", "per", "con", "sono", "ma", "anche", "della", "questo", "ciao",
    "grazie", "molto", "bene",
];
const PT_WORDS: &[&str] = &[
    "não", "uma", "com", "para", "mais", "como", "isso", "você", "obrigado", "olá", "muito",
    "bem", "sim", "já", "também",
];
const TR_WORDS: &[&str] = &[
    "bir", "ve", "bu", "için", "ama", "gibi", "çok", "daha", "ben", "sen", "merhaba", "teşekkür",
    "evet", "hayır", "nasıl",
];

// Scored in this order; ties keep the earlier entry
const LEXICAL: &[(Language, &[&str])] = &[
    (Language::De, DE_WORDS),
    (Language::Fr, FR_WORDS),
    (Language::Es, ES_WORDS),
    (Language::It, IT_WORDS),
    (Language::Pt, PT_WORDS),
    (Language::Tr, TR_WORDS),
];

fn in_ranges(c: char, ranges: &[(u32, u32)]) -> bool {
    let cp = c as u32;
    ranges.iter().any(|&(lo, hi)| cp >= lo && cp <= hi)
}

pub fn detect_language(text: &str) -> Language {
    for &(lang, ranges) in SCRIPT_RANGES {
        if text.chars().any(|c| in_ranges(c, ranges)) {
            return lang;
        }
    }

    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
        .collect();

    let count = |words: &[&str]| tokens.iter().filter(|t| words.contains(*t)).count();

    // English bias: a single English hit decides, regardless of other scores
    if count(EN_WORDS) > 0 {
        return Language::En;
    }

    let mut best = (Language::En, 0usize);
    for &(lang, words) in LEXICAL {
        let score = count(words);
        if score > best.1 {
            best = (lang, score);
        }
    }
    // All-zero scores keep the English default
    best.0
}
