//! Domain types shared by the chunker, the index backends and the search façade.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub type PointId = u64;

/// A contiguous, line-bounded span of a source document.
///
/// - `text`: the exact source text, line terminators included
/// - `start_line`/`end_line`: 1-based, inclusive
/// - `origin`: file name taken from the most recent merge separator, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
    pub bucket: LanguageBucket,
    pub origin: Option<String>,
}

/// Coarse content class used only to pick an embedding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageBucket {
    Code,
    Markup,
    Default,
}

impl LanguageBucket {
    /// Chunks mentioning `class`, `namespace` or `void` as whole words are code;
    /// everything else is treated as markup.
    pub fn classify(text: &str) -> Self {
        static CODE_WORDS: OnceLock<Regex> = OnceLock::new();
        let re = CODE_WORDS.get_or_init(|| {
            Regex::new(r"\b(class|namespace|void)\b").expect("static code-word pattern")
        });
        if re.is_match(text) { Self::Code } else { Self::Markup }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Markup => "markup",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for LanguageBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for LanguageBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Self::Code),
            "markup" => Ok(Self::Markup),
            "default" => Ok(Self::Default),
            other => Err(format!("unknown language bucket '{}'", other)),
        }
    }
}

/// Embedding cache key: content hash of the exact embedded text, its bucket
/// and the model the bucket was mapped to when the vector was produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub content_hash: String,
    pub bucket: LanguageBucket,
    pub model: String,
}

/// Metadata stored next to every vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub text: String,
    pub source: String,
    pub lang: LanguageBucket,
    pub file: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPoint {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// A point returned by either retrieval signal. `score` is backend specific
/// (cosine similarity, BM25, or 0 for unranked scans); fusion only uses order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    pub payload: PointPayload,
}

/// The record handed back to callers of `search_code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: PointId,
    pub text: String,
    pub score: f32,
    pub source: String,
    pub lang: LanguageBucket,
    pub file: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
}

impl SearchResult {
    pub fn from_payload(id: PointId, score: f32, payload: PointPayload) -> Self {
        Self {
            id,
            text: payload.text,
            score,
            source: payload.source,
            lang: payload.lang,
            file: payload.file,
            start_line: payload.start_line,
            end_line: payload.end_line,
        }
    }
}
