//! Term-frequency / inverse-document-frequency vectors over a small corpus.
//!
//! Documents are lowercased and split into tokens of two or more word
//! characters. Stop words are removed before unigrams and bigrams are
//! built. Weights are raw counts times a smoothed idf,
//! `ln((1 + n) / (1 + df)) + 1`, and every row is L2-normalized.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::stopwords::is_stop_word;

pub const DEFAULT_MAX_FEATURES: usize = 5000;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// Sparse row keyed by vocabulary index.
pub type SparseVector = BTreeMap<usize, f64>;

/// Unigrams followed by bigrams of the stop-word-filtered token stream.
pub fn analyze(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !is_stop_word(t))
        .collect();

    let mut terms: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    terms.extend(tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    max_features: usize,
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self {
            max_features: DEFAULT_MAX_FEATURES,
        }
    }
}

impl TfidfVectorizer {
    pub fn with_max_features(max_features: usize) -> Self {
        Self { max_features }
    }

    /// Learn the vocabulary and idf from `corpus` and return one row per document.
    pub fn fit_transform(&self, corpus: &[&str]) -> Vec<SparseVector> {
        let counts: Vec<HashMap<String, usize>> = corpus
            .iter()
            .map(|doc| {
                let mut bag = HashMap::new();
                for term in analyze(doc) {
                    *bag.entry(term).or_insert(0) += 1;
                }
                bag
            })
            .collect();

        let vocabulary = self.vocabulary(&counts);
        let n = corpus.len() as f64;
        let idf: Vec<f64> = vocabulary
            .iter()
            .map(|term| {
                let df = counts.iter().filter(|bag| bag.contains_key(term)).count() as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        let index: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.as_str(), i))
            .collect();

        counts
            .iter()
            .map(|bag| {
                let mut row: SparseVector = bag
                    .iter()
                    .filter_map(|(term, &count)| {
                        index.get(term.as_str()).map(|&i| (i, count as f64 * idf[i]))
                    })
                    .collect();
                l2_normalize(&mut row);
                row
            })
            .collect()
    }

    /// Alphabetically ordered terms, capped to the most frequent `max_features`.
    fn vocabulary(&self, counts: &[HashMap<String, usize>]) -> Vec<String> {
        let mut totals: HashMap<&str, usize> = HashMap::new();
        for bag in counts {
            for (term, &count) in bag {
                *totals.entry(term.as_str()).or_insert(0) += count;
            }
        }

        let mut ranked: Vec<(&str, usize)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.max_features);

        let mut vocabulary: Vec<String> = ranked.into_iter().map(|(t, _)| t.to_string()).collect();
        vocabulary.sort();
        vocabulary
    }
}

fn l2_normalize(row: &mut SparseVector) {
    let norm = row.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        row.values_mut().for_each(|v| *v /= norm);
    }
}

/// Cosine similarity of two sparse rows; zero when either is empty.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let norm_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(i, va)| b.get(i).map(|vb| va * vb))
        .sum();
    dot / (norm_a * norm_b)
}
