use itertools::Itertools;
use unicode_normalization::UnicodeNormalization;

/// Case/whitespace-insensitive key used for topic identity.
pub fn normalize_topic(s: &str) -> String {
    s.nfc()
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .join(" ")
}

// Function words long enough to pass the length gate; as substrings they hit almost any post.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "your", "you", "our", "are", "was", "were", "this", "that",
    "these", "those", "into", "onto", "over", "about", "how", "what", "why", "when", "where", "who",
    "its", "but", "not", "all", "any", "can", "has", "have", "had", "get", "out", "off", "than",
    "then", "them", "they", "their", "there", "will", "just", "more", "most", "some",
];

/// Naive lexical anchors: lowercase alphanumeric runs of 3+ chars minus stopwords, first occurrence order.
pub fn keyword_tokens<S: AsRef<str>>(s: S) -> Vec<String> {
    s.as_ref()
        .nfc()
        .collect::<String>()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(|t| t.to_lowercase())
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .unique()
        .collect()
}

/// Lowercased keywords with blanks dropped; used for the hard filters.
pub fn clean_keywords(kws: &[String]) -> Vec<String> {
    kws.iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .unique()
        .collect()
}

/// 0.0 when either side has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Share of `keywords` that occur in `text_lower`, in [0, 1].
pub fn lexical_score(text_lower: &str, keywords: &[String]) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }
    let hits = keywords
        .iter()
        .filter(|k| text_lower.contains(k.as_str()))
        .count();
    hits as f32 / keywords.len() as f32
}

pub fn contains_any(text_lower: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| text_lower.contains(k.as_str()))
}

pub fn contains_all(text_lower: &str, keywords: &[String]) -> bool {
    keywords.iter().all(|k| text_lower.contains(k.as_str()))
}
