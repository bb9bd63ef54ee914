use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fields::{count, field, flag, identifier, keyword, number, object, text, Identifier};

pub const DEFAULT_NETWORK_NAME: &str = "IPPAN DevNet";
pub const DEFAULT_CHAIN_TYPE: &str = "L1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkHealth {
    Healthy,
    Degraded,
    Unhealthy,
    #[default]
    Unknown,
}

impl NetworkHealth {
    fn from_keyword(raw: &str) -> Self {
        match raw {
            "healthy" | "ok" | "up" | "online" => Self::Healthy,
            "degraded" | "warning" => Self::Degraded,
            "unhealthy" | "down" | "error" | "offline" => Self::Unhealthy,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashtimerOrdering {
    #[default]
    Canonical,
    Partial,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayStatus {
    Pass,
    Fail,
    Running,
    #[default]
    Unavailable,
}

impl ReplayStatus {
    pub(crate) fn from_keyword(raw: &str) -> Self {
        match raw {
            "pass" | "success" | "ok" | "verified" => Self::Pass,
            "fail" | "failed" | "error" => Self::Fail,
            "running" | "in_progress" | "pending" => Self::Running,
            _ => Self::Unavailable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IppanTime {
    pub value: f64,
    pub monotonic: bool,
    pub drift_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalityStats {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Canonical `/status` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    pub network_name: String,
    pub chain_type: String,
    pub health: NetworkHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ippan_time: Option<IppanTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_round_id: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_block_id: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_hashtimer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finality: Option<FinalityStats>,
    pub accepted_tps: f64,
    pub finalized_tps: f64,
    pub active_validators: u64,
    pub shadow_verifiers: u64,
    pub total_nodes: u64,
    pub deterministic_ordering: bool,
    pub hashtimer_ordering: HashtimerOrdering,
    pub replay_status: ReplayStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_replay_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
}

impl Status {
    /// Status reported when no upstream could be reached.
    #[must_use]
    pub fn degraded() -> Self {
        Self { health: NetworkHealth::Unhealthy, ..Self::default() }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self {
            network_id: None,
            network_name: DEFAULT_NETWORK_NAME.to_string(),
            chain_type: DEFAULT_CHAIN_TYPE.to_string(),
            health: NetworkHealth::Unknown,
            version: None,
            commit: None,
            uptime_seconds: None,
            ippan_time: None,
            latest_round_id: None,
            latest_block_id: None,
            latest_hashtimer: None,
            finality: None,
            accepted_tps: 0.0,
            finalized_tps: 0.0,
            active_validators: 0,
            shadow_verifiers: 0,
            total_nodes: 0,
            deterministic_ordering: true,
            hashtimer_ordering: HashtimerOrdering::Canonical,
            replay_status: ReplayStatus::Unavailable,
            last_replay_time: None,
            config: None,
        }
    }
}

#[must_use]
pub fn normalize_status(raw: &Value) -> Status {
    let tps = raw.get("tps");
    let accepted_tps = number(raw, &["accepted_tps"])
        .or_else(|| tps.and_then(|t| number(t, &["accepted"])))
        .or_else(|| number(raw, &["tps"]))
        .unwrap_or(0.0);
    let finalized_tps = number(raw, &["finalized_tps"])
        .or_else(|| tps.and_then(|t| number(t, &["finalized"])))
        .unwrap_or(0.0);

    let hashtimer_ordering = match keyword(raw, &["hashtimer_ordering"]).as_str() {
        "partial" => HashtimerOrdering::Partial,
        "disabled" => HashtimerOrdering::Disabled,
        _ => HashtimerOrdering::Canonical,
    };

    Status {
        network_id: text(raw, &["network_id"]),
        network_name: text(raw, &["network_name"])
            .unwrap_or_else(|| DEFAULT_NETWORK_NAME.to_string()),
        chain_type: text(raw, &["chain_type"]).unwrap_or_else(|| DEFAULT_CHAIN_TYPE.to_string()),
        health: NetworkHealth::from_keyword(&keyword(raw, &["health", "status", "state"])),
        version: text(raw, &["version"]),
        commit: text(raw, &["commit"]),
        uptime_seconds: number(raw, &["uptime_seconds"]),
        ippan_time: field(raw, &["ippan_time", "time", "timestamp"]).and_then(ippan_time),
        latest_round_id: identifier(raw, &["latest_round_id", "head_round", "round"]),
        latest_block_id: identifier(raw, &["latest_block_id", "head_block", "block"]),
        latest_hashtimer: text(raw, &["latest_hashtimer", "head_hashtimer", "hashtimer"]),
        finality: field(raw, &["finality", "finality_stats"]).and_then(finality_stats),
        accepted_tps,
        finalized_tps,
        active_validators: count(raw, &["active_validators", "validators"]).unwrap_or(0),
        shadow_verifiers: count(raw, &["shadow_verifiers", "verifiers"]).unwrap_or(0),
        total_nodes: count(raw, &["total_nodes", "nodes", "peer_count"]).unwrap_or(0),
        deterministic_ordering: flag(raw, &["deterministic_ordering"]).unwrap_or(true),
        hashtimer_ordering,
        replay_status: ReplayStatus::from_keyword(&keyword(raw, &["replay_status"])),
        last_replay_time: text(raw, &["last_replay_time"]),
        config: object(raw, &["config"]),
    }
}

fn ippan_time(raw: &Value) -> Option<IppanTime> {
    match raw {
        Value::Number(n) => {
            n.as_f64().map(|value| IppanTime {
                value,
                monotonic: true,
                drift_ms: 0.0,
                source: None,
            })
        }
        Value::Object(_) => Some(IppanTime {
            value: number(raw, &["value", "timestamp", "time"]).unwrap_or(0.0),
            monotonic: flag(raw, &["monotonic"]).unwrap_or(true),
            drift_ms: number(raw, &["drift_ms", "drift"]).unwrap_or(0.0),
            source: text(raw, &["source"]),
        }),
        _ => None,
    }
}

fn finality_stats(raw: &Value) -> Option<FinalityStats> {
    raw.is_object().then(|| FinalityStats {
        p50_ms: number(raw, &["p50_ms", "p50"]).unwrap_or(0.0),
        p95_ms: number(raw, &["p95_ms", "p95"]).unwrap_or(0.0),
        p99_ms: number(raw, &["p99_ms", "p99"]).unwrap_or(0.0),
    })
}
