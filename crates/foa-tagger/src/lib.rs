//! Semantic tagging of funding opportunities.
//!
//! Two passes: a keyword pass over fixed phrase lists that always runs, and
//! an optional TF-IDF pass comparing the document with one reference
//! paragraph per category. Results are merged keyword-first.

mod stopwords;
#[cfg(feature = "vector")]
pub mod tfidf;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

pub const CRATE_NAME: &str = "foa-tagger";
pub const DEFAULT_THRESHOLD: f64 = 0.08;
/// Combined text shorter than this (after trimming) skips the vector pass.
pub const MIN_VECTOR_TEXT_LEN: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct Category {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub description: &'static str,
}

pub const CATEGORIES: &[Category] = &[
    Category {
        name: "Artificial Intelligence",
        keywords: &[
            "ai", "artificial intelligence", "machine learning", "deep learning",
            "neural network", "neural", "nlp", "natural language", "computer vision",
            "robotics", "autonomous", "reinforcement learning", "generative",
            "transformer", "large language model", "llm",
        ],
        description: "Research in artificial intelligence, machine learning, deep learning, \
            neural networks, natural language processing, computer vision, robotics, \
            autonomous systems, and generative AI models.",
    },
    Category {
        name: "Health / Medicine",
        keywords: &[
            "biomedical", "clinical", "patient", "disease", "health", "medical",
            "pharmaceutical", "epidemi", "therapy", "diagnostic", "genomic",
            "mental health", "substance", "aging", "dementia", "alzheimer",
        ],
        description: "Biomedical research, clinical trials, patient care, disease prevention, \
            public health, pharmaceutical development, mental health, genomics, \
            epidemiology, and medical diagnostics.",
    },
    Category {
        name: "Infrastructure",
        keywords: &[
            "civil", "bridge", "transportation", "urban", "infrastructure",
            "highway", "construction", "building", "structural", "water system",
        ],
        description: "Civil engineering, transportation systems, urban planning, bridge design, \
            construction technology, water systems, and structural engineering.",
    },
    Category {
        name: "Environment / Climate",
        keywords: &[
            "climate", "environment", "sustainability", "renewable", "emission",
            "conservation", "ecology", "biodiversity", "pollution", "carbon",
            "geoscience", "atmospheric",
        ],
        description: "Climate change research, environmental science, renewable energy, \
            carbon emissions, conservation, ecology, biodiversity, and pollution control.",
    },
    Category {
        name: "Education",
        keywords: &[
            "education", "student", "curriculum", "stem", "pedagogy",
            "k-12", "k12", "undergraduate", "graduate", "fellowship",
            "training", "workforce development",
        ],
        description: "Educational research, STEM education, curriculum development, K-12 programs, \
            higher education, fellowships, workforce development, and pedagogy.",
    },
    Category {
        name: "Agriculture",
        keywords: &[
            "agriculture", "crop", "farming", "livestock", "soil",
            "food security", "irrigation", "agronomic", "horticulture",
        ],
        description: "Agricultural research, crop science, farming technology, food security, \
            soil science, livestock management, irrigation, and horticulture.",
    },
    Category {
        name: "Cybersecurity",
        keywords: &[
            "cybersecurity", "cyber", "encryption", "malware", "phishing",
            "network security", "vulnerability", "threat",
        ],
        description: "Cybersecurity research, network security, encryption, threat detection, \
            malware analysis, vulnerability assessment, and cyber defense.",
    },
    Category {
        name: "Space / Aerospace",
        keywords: &[
            "space", "aerospace", "satellite", "nasa", "orbital",
            "rocket", "launch vehicle", "astro",
        ],
        description: "Space exploration, aerospace engineering, satellite technology, \
            orbital mechanics, launch vehicles, and planetary science.",
    },
    Category {
        name: "Energy",
        keywords: &[
            "energy", "solar", "wind power", "nuclear", "battery",
            "grid", "power generation", "fuel cell", "hydrogen",
        ],
        description: "Energy research, solar power, wind energy, nuclear energy, battery technology, \
            smart grids, hydrogen fuel cells, and power generation.",
    },
    Category {
        name: "Humanities / Arts",
        keywords: &[
            "humanities", "arts", "culture", "heritage", "museum",
            "literature", "history", "archaeology", "language", "music",
            "dance", "theatre", "theater", "manuscript", "digitization",
        ],
        description: "Humanities research, arts and culture, cultural heritage preservation, \
            museum studies, literature, history, archaeology, music, dance, theatre, \
            manuscript digitization, and language studies.",
    },
    Category {
        name: "Social Sciences",
        keywords: &[
            "social", "sociology", "psychology", "economics", "political",
            "behavioral", "demographic", "community", "equity", "justice",
        ],
        description: "Social science research, sociology, psychology, economics, political science, \
            behavioral studies, demographics, community development, equity, and justice.",
    },
];

static KEYWORD_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    CATEGORIES
        .iter()
        .map(|category| {
            let alternation = category
                .keywords
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let re = Regex::new(&format!(r"\b(?:{alternation})\b")).unwrap();
            (category.name, re)
        })
        .collect()
});

/// Whether this build carries the TF-IDF pass.
pub fn vector_pass_available() -> bool {
    cfg!(feature = "vector")
}

/// Categories with at least one whole-word keyword hit, sorted and unique.
pub fn tag_by_keywords(title: &str, description: &str) -> Vec<String> {
    let combined = format!("{title} {description}").to_lowercase();
    let mut tags: Vec<String> = KEYWORD_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&combined))
        .map(|(name, _)| name.to_string())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Categories whose reference paragraph scores at least `threshold`,
/// most similar first.
pub fn tag_by_tfidf(title: &str, description: &str, threshold: f64) -> Vec<String> {
    if !vector_pass_available() {
        warn!("vector classification not compiled in; skipping TF-IDF tagging");
        return Vec::new();
    }

    let combined = format!("{title} {description}");
    if combined.trim().chars().count() < MIN_VECTOR_TEXT_LEN {
        return Vec::new();
    }
    vector_matches(&combined, threshold)
}

#[cfg(feature = "vector")]
fn vector_matches(combined: &str, threshold: f64) -> Vec<String> {
    let mut corpus: Vec<&str> = CATEGORIES.iter().map(|c| c.description).collect();
    corpus.push(combined);

    let rows = tfidf::TfidfVectorizer::default().fit_transform(&corpus);
    let Some((document, categories)) = rows.split_last() else {
        return Vec::new();
    };

    let mut scored: Vec<(&str, f64)> = CATEGORIES
        .iter()
        .zip(categories)
        .map(|(category, row)| (category.name, tfidf::cosine_similarity(document, row)))
        .filter(|(_, score)| *score >= threshold)
        .collect();
    // Stable sort keeps category order among equal scores.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    debug!(?scored, "tf-idf matches");

    scored.into_iter().map(|(name, _)| name.to_string()).collect()
}

#[cfg(not(feature = "vector"))]
fn vector_matches(_combined: &str, _threshold: f64) -> Vec<String> {
    Vec::new()
}

/// Concatenate and drop repeats, keeping each tag's first position.
pub fn merge_tags(keyword_tags: Vec<String>, vector_tags: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(keyword_tags.len() + vector_tags.len());
    for tag in keyword_tags.into_iter().chain(vector_tags) {
        if !merged.contains(&tag) {
            merged.push(tag);
        }
    }
    merged
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    pub use_vector_pass: bool,
    pub threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            use_vector_pass: true,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn classify(&self, title: &str, description: &str) -> Vec<String> {
        let keyword_tags = tag_by_keywords(title, description);
        if !self.config.use_vector_pass {
            return keyword_tags;
        }
        let vector_tags = tag_by_tfidf(title, description, self.config.threshold);
        merge_tags(keyword_tags, vector_tags)
    }
}
