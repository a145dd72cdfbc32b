//! Query tokenization helpers shared by the keyword and concept strategies

use std::collections::HashSet;

/// Common English stop words filtered out of keyword extraction
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "could", "did", "do",
    "does", "for", "from", "had", "has", "have", "how", "i", "if", "in", "into", "is", "it",
    "its", "me", "my", "no", "not", "of", "on", "or", "our", "she", "should", "so", "than",
    "that", "the", "their", "them", "then", "there", "these", "they", "this", "those", "to",
    "was", "we", "were", "what", "when", "where", "which", "who", "why", "will", "with", "would",
    "you", "your",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Lowercased alphanumeric tokens, in order of appearance
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Stop-word-filtered tokens, deduplicated, order preserved
pub(crate) fn keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stop_word(t))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Concept terms: the longest distinctive keywords of the query
pub(crate) fn concepts(text: &str, min_len: usize, max_concepts: usize) -> Vec<String> {
    let mut terms: Vec<String> = keywords(text)
        .into_iter()
        .filter(|t| t.chars().count() >= min_len)
        .collect();
    terms.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));
    terms.truncate(max_concepts);
    terms
}

/// The set of tokens in a text, for Jaccard comparison
pub(crate) fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Token-set Jaccard similarity in [0, 1]
pub(crate) fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_on_punctuation() {
        assert_eq!(
            tokenize("Improve listening, speaking!"),
            vec!["improve", "listening", "speaking"]
        );
    }

    #[test]
    fn test_keywords_filter_stop_words() {
        let kw = keywords("how to improve the listening skills of a student");
        assert_eq!(kw, vec!["improve", "listening", "skills", "student"]);
    }

    #[test]
    fn test_keywords_deduplicate() {
        let kw = keywords("practice practice practice");
        assert_eq!(kw, vec!["practice"]);
    }

    #[test]
    fn test_concepts_prefer_longest() {
        let c = concepts("improve listening comprehension fast", 5, 2);
        assert_eq!(c, vec!["comprehension", "listening"]);
    }

    #[test]
    fn test_concepts_respect_min_len() {
        let c = concepts("big cat runs", 5, 3);
        assert!(c.is_empty());
    }

    #[test]
    fn test_jaccard_bounds() {
        let a = token_set("alpha beta gamma");
        let b = token_set("beta gamma delta");
        let j = jaccard(&a, &b);
        assert!(j > 0.0 && j < 1.0);
        assert!((jaccard(&a, &a) - 1.0).abs() < f32::EPSILON);

        let empty = HashSet::new();
        assert_eq!(jaccard(&a, &empty), 0.0);
        assert_eq!(jaccard(&empty, &empty), 0.0);
    }
}
