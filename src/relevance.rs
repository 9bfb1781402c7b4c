//! Heuristic text relevance: keyword extraction and a bounded [0, 1] score
//! deciding whether a retrieved article can be trusted as quiz context.
//!
//! All functions here are pure and never fail; callers feed them whatever
//! text the upstream APIs returned.

use std::collections::{HashMap, HashSet};

use crate::domain::Confidence;

/// Words too common to carry topical signal.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should", "may", "might", "must", "can", "this", "that", "these", "those",
];

/// How many terms the extractor keeps.
const MAX_KEY_TERMS: usize = 3;

/// Extract up to three key terms from free text, optionally prefixed with a
/// topic hint. Terms are ranked by frequency; ties keep first-occurrence
/// order. Words shorter than two characters and stop words are dropped.
pub fn extract_key_terms(content: &str, topic: Option<&str>) -> Vec<String> {
    let full_text = match topic {
        Some(t) => format!("{t} {content}"),
        None => content.to_string(),
    };

    // Lowercase and replace every non-word character with a space.
    let cleaned: String = full_text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for word in cleaned.split_whitespace() {
        if word.chars().count() < 2 || STOP_WORDS.contains(&word) {
            continue;
        }
        if !counts.contains_key(word) {
            first_seen.push(word);
        }
        *counts.entry(word).or_insert(0) += 1;
    }

    // Stable sort: equal counts stay in first-occurrence order.
    first_seen.sort_by(|a, b| counts[b].cmp(&counts[a]));
    first_seen
        .into_iter()
        .take(MAX_KEY_TERMS)
        .map(str::to_string)
        .collect()
}

/// Score how relevant an article (title + extract) is to the submitted
/// content. Bounded to [0, 1]:
/// - 0.3 per key term found anywhere in the article text,
/// - 0.4 once if any key term appears in the title,
/// - up to 0.3 proportional to the overlap of long words (> 3 chars)
///   between content and article.
pub fn relevance_score(content: &str, title: &str, extract: &str, key_terms: &[String]) -> f32 {
    let content_lower = content.to_lowercase();
    let article_text = format!("{} {}", title, extract).to_lowercase();
    let title_lower = title.to_lowercase();

    let mut score = 0.0f32;
    for term in key_terms {
        if article_text.contains(&term.to_lowercase()) {
            score += 0.3;
        }
    }

    if key_terms
        .iter()
        .any(|t| title_lower.contains(&t.to_lowercase()))
    {
        score += 0.4;
    }

    let content_words: Vec<&str> = content_lower
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .collect();
    let article_words: HashSet<&str> = article_text
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .collect();
    let common = content_words
        .iter()
        .filter(|w| article_words.contains(*w))
        .count();
    let overlap_ratio = common as f32 / content_words.len().max(1) as f32;
    score += overlap_ratio * 0.3;

    score.min(1.0)
}

/// Map a relevance score to a confidence label.
pub fn confidence_for(score: f32) -> Confidence {
    if score > 0.7 {
        Confidence::High
    } else if score > 0.4 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}
