use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields::{
    count, field, flag, identifier, items, number, page, string_list, text, Identifier,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub block_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashtimer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_id: Option<Identifier>,
    pub parent_count: u64,
    pub tx_count: u64,
    pub finalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockDetail {
    #[serde(flatten)]
    pub summary: BlockSummary,
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub transactions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deterministic_position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_root: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlocksList {
    pub blocks: Vec<BlockSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

#[must_use]
pub fn normalize_blocks_list(raw: &Value) -> BlocksList {
    let blocks = items(raw, &["blocks", "items", "data", "results"])
        .iter()
        .map(normalize_block_summary)
        .collect();
    let page = page(raw);
    BlocksList { blocks, cursor: page.cursor, has_more: page.has_more, total: page.total }
}

#[must_use]
pub fn normalize_block_summary(raw: &Value) -> BlockSummary {
    let parent_count = count(raw, &["parent_count"])
        .or_else(|| raw.get("parents").and_then(Value::as_array).map(|p| p.len() as u64))
        .unwrap_or_else(|| u64::from(field(raw, &["parent"]).is_some()));

    let tx_count = count(raw, &["tx_count", "transaction_count"])
        .or_else(|| raw.get("transactions").and_then(Value::as_array).map(|t| t.len() as u64))
        .or_else(|| count(raw, &["txCount"]))
        .unwrap_or(0);

    BlockSummary {
        block_id: text(raw, &["block_id", "id", "hash"]).unwrap_or_default(),
        hashtimer: text(raw, &["hashtimer", "hash_timer"]),
        round_id: identifier(raw, &["round_id", "round"]),
        parent_count,
        tx_count,
        finalized: flag(raw, &["finalized", "is_finalized", "final"]).unwrap_or(false),
        timestamp: number(raw, &["timestamp"]),
        created_at: text(raw, &["created_at", "createdAt", "time"]),
    }
}

#[must_use]
pub fn normalize_block_detail(raw: &Value) -> BlockDetail {
    let parents = if field(raw, &["parents", "parent_ids"]).is_some() {
        string_list(raw, &["parents", "parent_ids"])
    } else {
        text(raw, &["parent"]).into_iter().collect()
    };

    BlockDetail {
        summary: normalize_block_summary(raw),
        parents,
        children: string_list(raw, &["children", "child_ids"]),
        transactions: string_list(raw, &["transactions", "tx_ids", "txs"]),
        proposer: text(raw, &["proposer", "producer", "validator"]),
        size_bytes: count(raw, &["size_bytes", "size"]),
        deterministic_position: count(raw, &["deterministic_position", "position"]),
        state_root: text(raw, &["state_root", "stateRoot"]),
    }
}
