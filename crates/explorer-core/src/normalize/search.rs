use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields::{count, items, keyword, number, text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchHitType {
    Transaction,
    Block,
    Round,
    Node,
    #[default]
    Unknown,
}

impl SearchHitType {
    fn from_label(raw: &str) -> Self {
        if raw.contains("tx") || raw.contains("transaction") {
            Self::Transaction
        } else if raw.contains("block") {
            Self::Block
        } else if raw.contains("round") {
            Self::Round
        } else if raw.contains("node") || raw.contains("validator") {
            Self::Node
        } else {
            Self::Unknown
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "type")]
    pub hit_type: SearchHitType,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashtimer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub hits: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Identifier kind guessed from the query itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_type: Option<SearchHitType>,
}

impl SearchResponse {
    /// Empty result for `query`, used when no upstream answered.
    #[must_use]
    pub fn empty(query: &str) -> Self {
        Self {
            query: query.to_string(),
            detected_type: detect_search_type(query),
            ..Self::default()
        }
    }
}

/// Patterns tried in order; the first match wins. The prefixes are optional,
/// so a bare 64-hex id resolves to a block.
static SEARCH_PATTERNS: LazyLock<Vec<(SearchHitType, Regex)>> = LazyLock::new(|| {
    [
        (SearchHitType::Round, r"(?i)^(round[-_:]?)?\d+$"),
        (SearchHitType::Block, r"(?i)^(block[-_:]?)?[0-9a-f]{64}$"),
        (SearchHitType::Transaction, r"(?i)^(tx[-_:]?)?[0-9a-f]{64}$"),
        (SearchHitType::Node, r"(?i)^(node[-_:]?)?[0-9a-f]{40,}$"),
    ]
    .into_iter()
    .filter_map(|(kind, pattern)| Regex::new(pattern).ok().map(|re| (kind, re)))
    .collect()
});

/// Guesses what kind of identifier a search query is.
///
/// # Examples
///
/// ```
/// use explorer_core::normalize::{detect_search_type, SearchHitType};
///
/// assert_eq!(detect_search_type("round-42"), Some(SearchHitType::Round));
/// assert_eq!(detect_search_type("hello"), None);
/// ```
#[must_use]
pub fn detect_search_type(query: &str) -> Option<SearchHitType> {
    let trimmed = query.trim();
    SEARCH_PATTERNS.iter().find(|(_, re)| re.is_match(trimmed)).map(|(kind, _)| *kind)
}

/// Normalizes a search response. `query` is the caller's query, used when the
/// upstream does not echo one back.
#[must_use]
pub fn normalize_search(raw: &Value, query: &str) -> SearchResponse {
    let hits = items(raw, &["hits", "results", "items", "data"]).iter().map(search_hit).collect();
    let query = if raw.is_array() {
        query.to_string()
    } else {
        text(raw, &["query"]).unwrap_or_else(|| query.to_string())
    };

    SearchResponse {
        detected_type: detect_search_type(&query),
        query,
        hits,
        total: count(raw, &["total"]),
    }
}

fn search_hit(raw: &Value) -> SearchHit {
    SearchHit {
        hit_type: SearchHitType::from_label(&keyword(raw, &["type", "entity_type"])),
        id: text(raw, &["id", "hash", "tx_id", "block_id", "round_id"]).unwrap_or_default(),
        hashtimer: text(raw, &["hashtimer", "hash_timer"]),
        summary: text(raw, &["summary", "description", "preview"]),
        score: number(raw, &["score"]),
    }
}
