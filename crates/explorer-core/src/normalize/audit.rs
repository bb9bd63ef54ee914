use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    fields::{count, flag, identifier, items, keyword, number, page, text, Identifier},
    status::ReplayStatus,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReplayStatus {
    pub status: ReplayStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_round: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_round: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_rounds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_blocks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_transactions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub round_id: Identifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashtimer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub verified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointsList {
    pub checkpoints: Vec<Checkpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

#[must_use]
pub fn normalize_replay_status(raw: &Value) -> AuditReplayStatus {
    AuditReplayStatus {
        status: ReplayStatus::from_keyword(&keyword(raw, &["status", "state", "result"])),
        last_run: text(raw, &["last_run", "lastRun", "completed_at"]),
        last_run_timestamp: number(raw, &["last_run_timestamp", "timestamp"]),
        commit_fingerprint: text(raw, &["commit_fingerprint", "commit", "commitHash"]),
        version: text(raw, &["version"]),
        from_round: identifier(raw, &["from_round", "start_round"]),
        to_round: identifier(raw, &["to_round", "end_round"]),
        verified_rounds: count(raw, &["verified_rounds", "rounds"]),
        verified_blocks: count(raw, &["verified_blocks", "blocks"]),
        verified_transactions: count(raw, &["verified_transactions", "transactions"]),
        error_message: text(raw, &["error_message", "error"]),
        duration_ms: number(raw, &["duration_ms", "duration"]),
    }
}

#[must_use]
pub fn normalize_checkpoints(raw: &Value) -> CheckpointsList {
    let checkpoints =
        items(raw, &["checkpoints", "items", "data", "results"]).iter().map(checkpoint).collect();
    let page = page(raw);
    CheckpointsList { checkpoints, cursor: page.cursor, has_more: page.has_more, total: page.total }
}

fn checkpoint(raw: &Value) -> Checkpoint {
    Checkpoint {
        round_id: identifier(raw, &["round_id", "round", "id"]).unwrap_or_default(),
        hashtimer: text(raw, &["hashtimer", "hash_timer"]),
        state_root: text(raw, &["state_root", "stateRoot"]),
        round_root: text(raw, &["round_root", "roundRoot"]),
        tx_root: text(raw, &["tx_root", "txRoot", "transaction_root"]),
        block_count: count(raw, &["block_count", "blocks"]),
        tx_count: count(raw, &["tx_count", "transactions"]),
        timestamp: number(raw, &["timestamp"]),
        created_at: text(raw, &["created_at", "createdAt"]),
        verified: flag(raw, &["verified"]).unwrap_or(true),
    }
}
