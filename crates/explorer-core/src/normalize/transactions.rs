use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fields::{
    field, flag, identifier, items, keyword, number, object, page, text, Identifier,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    IngressChecked,
    HashtimerAssigned,
    IncludedBlock,
    IncludedRound,
    Finalized,
}

impl LifecycleStage {
    /// Substring match, checked in pipeline order. Unrecognised stages are
    /// treated as ingress.
    fn from_label(raw: &str) -> Self {
        if raw.contains("ingress") || raw.contains("received") {
            Self::IngressChecked
        } else if raw.contains("hashtimer") || raw.contains("ordered") {
            Self::HashtimerAssigned
        } else if raw.contains("block") {
            Self::IncludedBlock
        } else if raw.contains("round") {
            Self::IncludedRound
        } else if raw.contains("final") {
            Self::Finalized
        } else {
            Self::IngressChecked
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub stage: LifecycleStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl LifecycleEvent {
    fn at(stage: LifecycleStage, timestamp: f64) -> Self {
        Self { stage, timestamp: Some(timestamp), latency_ms: None, details: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxSummary {
    pub tx_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashtimer: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub finalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_id: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Default for TxSummary {
    fn default() -> Self {
        Self {
            tx_id: String::new(),
            hashtimer: None,
            tx_type: "unknown".to_string(),
            finalized: false,
            round_id: None,
            block_id: None,
            timestamp: None,
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxDetail {
    #[serde(flatten)]
    pub summary: TxSummary,
    pub lifecycle: Vec<LifecycleEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxList {
    pub transactions: Vec<TxSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

#[must_use]
pub fn normalize_tx_list(raw: &Value) -> TxList {
    let transactions = items(raw, &["transactions", "txs", "items", "data", "results"])
        .iter()
        .map(normalize_tx_summary)
        .collect();
    let page = page(raw);
    TxList { transactions, cursor: page.cursor, has_more: page.has_more, total: page.total }
}

#[must_use]
pub fn normalize_tx_summary(raw: &Value) -> TxSummary {
    TxSummary {
        tx_id: text(raw, &["tx_id", "id", "hash", "txId"]).unwrap_or_default(),
        hashtimer: text(raw, &["hashtimer", "hash_timer"]),
        tx_type: text(raw, &["type", "tx_type", "txType"]).unwrap_or_else(|| "unknown".to_string()),
        finalized: flag(raw, &["finalized", "is_finalized", "final"]).unwrap_or(false),
        round_id: identifier(raw, &["round_id", "round"]),
        block_id: text(raw, &["block_id", "block"]),
        timestamp: number(raw, &["timestamp"]),
        created_at: text(raw, &["created_at", "createdAt", "time"]),
    }
}

#[must_use]
pub fn normalize_tx_detail(raw: &Value) -> TxDetail {
    let lifecycle = match field(raw, &["lifecycle", "events", "stages"]).and_then(Value::as_array) {
        Some(events) => events.iter().map(lifecycle_event).collect(),
        None => lifecycle_from_fields(raw),
    };

    TxDetail {
        summary: normalize_tx_summary(raw),
        lifecycle,
        total_latency_ms: number(raw, &["total_latency_ms", "latency"]),
        sender: text(raw, &["sender", "from", "origin"]),
        receiver: text(raw, &["receiver", "to", "destination"]),
        payload_hash: text(raw, &["payload_hash", "payloadHash", "dataHash"]),
        size_bytes: number(raw, &["size_bytes", "size"]),
        fee: number(raw, &["fee"]),
        nonce: number(raw, &["nonce"]),
        signature: text(raw, &["signature"]),
    }
}

fn lifecycle_event(raw: &Value) -> LifecycleEvent {
    LifecycleEvent {
        stage: LifecycleStage::from_label(&keyword(raw, &["stage", "event", "name"])),
        timestamp: number(raw, &["timestamp"]),
        latency_ms: number(raw, &["latency_ms", "latency"]),
        details: object(raw, &["details"]),
    }
}

fn lifecycle_from_fields(raw: &Value) -> Vec<LifecycleEvent> {
    const STAGE_FIELDS: &[(LifecycleStage, &[&str])] = &[
        (LifecycleStage::IngressChecked, &["ingress_time", "received_at"]),
        (LifecycleStage::HashtimerAssigned, &["hashtimer_time", "ordered_at"]),
        (LifecycleStage::IncludedBlock, &["block_time", "included_at"]),
        (LifecycleStage::IncludedRound, &["round_time"]),
        (LifecycleStage::Finalized, &["finalized_time", "finalized_at"]),
    ];

    STAGE_FIELDS
        .iter()
        .filter_map(|(stage, keys)| {
            number(raw, keys).filter(|t| *t != 0.0).map(|t| LifecycleEvent::at(*stage, t))
        })
        .collect()
}
