use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields::{
    array, count, field, identifier, items, keyword, number, page, string_list, text,
    value_to_text, Identifier,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Proposed,
    Verified,
    Finalized,
    Failed,
    Pending,
    #[default]
    Unknown,
}

impl RoundStatus {
    /// `pending` is folded into `proposed`; the `Pending` variant is kept for
    /// consumers that already match on it.
    fn from_keyword(raw: &str) -> Self {
        match raw {
            "proposed" | "pending" => Self::Proposed,
            "verified" | "committed" => Self::Verified,
            "finalized" | "final" | "complete" => Self::Finalized,
            "failed" | "error" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Validator,
    ShadowVerifier,
    Observer,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundParticipant {
    pub node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ParticipantRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundProof {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub signers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round_id: Identifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashtimer: Option<String>,
    pub status: RoundStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finality_ms: Option<f64>,
    pub block_count: u64,
    pub tx_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundDetail {
    #[serde(flatten)]
    pub summary: RoundSummary,
    pub blocks: Vec<String>,
    pub participants: Vec<RoundParticipant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<RoundProof>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_root: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundsList {
    pub rounds: Vec<RoundSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

#[must_use]
pub fn normalize_rounds_list(raw: &Value) -> RoundsList {
    let rounds = items(raw, &["rounds", "items", "data", "results"])
        .iter()
        .map(normalize_round_summary)
        .collect();
    let page = page(raw);
    RoundsList { rounds, cursor: page.cursor, has_more: page.has_more, total: page.total }
}

#[must_use]
pub fn normalize_round_summary(raw: &Value) -> RoundSummary {
    let block_count = count(raw, &["block_count"])
        .or_else(|| raw.get("blocks").and_then(Value::as_array).map(|b| b.len() as u64))
        .or_else(|| count(raw, &["blockCount"]))
        .unwrap_or(0);

    RoundSummary {
        round_id: identifier(raw, &["round_id", "id", "round"]).unwrap_or_default(),
        hashtimer: text(raw, &["hashtimer", "hash_timer"]),
        status: RoundStatus::from_keyword(&keyword(raw, &["status", "state"])),
        finality_ms: number(raw, &["finality_ms", "finality"]),
        block_count,
        tx_count: count(raw, &["tx_count", "transaction_count", "txCount"]).unwrap_or(0),
        timestamp: number(raw, &["timestamp"]),
        created_at: text(raw, &["created_at", "createdAt", "time"]),
    }
}

#[must_use]
pub fn normalize_round_detail(raw: &Value) -> RoundDetail {
    RoundDetail {
        summary: normalize_round_summary(raw),
        blocks: string_list(raw, &["blocks", "block_ids"]),
        participants: array(raw, &["participants", "validators", "signers"])
            .iter()
            .map(participant)
            .collect(),
        proof: field(raw, &["proof", "certificate"]).and_then(proof),
        proposed_at: number(raw, &["proposed_at", "proposedAt"]),
        verified_at: number(raw, &["verified_at", "verifiedAt"]),
        finalized_at: number(raw, &["finalized_at", "finalizedAt"]),
        state_root: text(raw, &["state_root", "stateRoot"]),
        round_root: text(raw, &["round_root", "roundRoot"]),
    }
}

fn participant(raw: &Value) -> RoundParticipant {
    if let Some(node_id) = raw.as_str() {
        return RoundParticipant { node_id: node_id.to_string(), ..RoundParticipant::default() };
    }

    let role = match keyword(raw, &["role"]).as_str() {
        "validator" => Some(ParticipantRole::Validator),
        "shadow_verifier" => Some(ParticipantRole::ShadowVerifier),
        "observer" => Some(ParticipantRole::Observer),
        _ => None,
    };

    RoundParticipant {
        node_id: text(raw, &["node_id", "id", "address"]).unwrap_or_default(),
        role,
        signed: raw.get("signed").and_then(Value::as_bool),
        timestamp: number(raw, &["timestamp"]),
    }
}

fn proof(raw: &Value) -> Option<RoundProof> {
    match raw {
        Value::Object(_) => Some(RoundProof {
            threshold: number(raw, &["threshold"]),
            signers: string_list(raw, &["signers", "signatures"]),
            proof_hash: text(raw, &["proof_hash", "proofHash", "hash"]),
            signature: text(raw, &["signature"]),
        }),
        // A bare string is taken as the proof hash.
        other => value_to_text(other)
            .filter(|s| !s.is_empty())
            .map(|hash| RoundProof { proof_hash: Some(hash), ..RoundProof::default() }),
    }
}
