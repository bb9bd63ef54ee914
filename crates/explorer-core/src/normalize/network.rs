use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields::{count, items, keyword, number, rescale_percent, text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Offline,
    Syncing,
    #[default]
    Unknown,
}

impl NodeStatus {
    fn of(raw: &Value) -> Self {
        if let Some(connected) = raw.get("is_connected").and_then(Value::as_bool) {
            return if connected { Self::Online } else { Self::Offline };
        }
        match keyword(raw, &["status", "state"]).as_str() {
            "online" | "up" | "active" | "connected" => Self::Online,
            "offline" | "down" | "inactive" | "disconnected" => Self::Offline,
            "syncing" | "synchronizing" | "catching_up" => Self::Syncing,
            _ => Self::Unknown,
        }
    }

    /// Online and syncing nodes both count as reachable.
    #[must_use]
    pub fn is_reachable(self) -> bool {
        matches!(self, Self::Online | Self::Syncing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Validator,
    ShadowVerifier,
    FullNode,
    Observer,
    #[default]
    Unknown,
}

impl NodeRole {
    fn from_label(raw: &str) -> Self {
        if raw.contains("validator") {
            Self::Validator
        } else if raw.contains("shadow") || raw.contains("verifier") {
            Self::ShadowVerifier
        } else if raw.contains("full") {
            Self::FullNode
        } else if raw.contains("observer") || raw.contains("light") {
            Self::Observer
        } else {
            Self::Unknown
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub node_id: String,
    pub role: NodeRole,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participation_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounds_participated: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks_proposed: Option<u64>,
}

/// Canonical `/network/nodes` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkNodes {
    pub nodes: Vec<NetworkNode>,
    pub total_nodes: u64,
    pub online_nodes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_count: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub warming_up: bool,
}

impl NetworkNodes {
    /// Placeholder served while the nodes snapshot has never loaded.
    #[must_use]
    pub fn warming() -> Self {
        Self { warming_up: true, ..Self::default() }
    }
}

#[must_use]
pub fn normalize_network_nodes(raw: &Value) -> NetworkNodes {
    let nodes: Vec<NetworkNode> =
        items(raw, &["nodes", "validators", "peers", "items", "data", "results"])
            .iter()
            .map(normalize_node)
            .collect();
    let listed = nodes.len() as u64;
    let reachable = nodes.iter().filter(|n| n.status.is_reachable()).count() as u64;

    if raw.is_array() {
        return NetworkNodes {
            nodes,
            total_nodes: listed,
            online_nodes: reachable,
            ..NetworkNodes::default()
        };
    }

    NetworkNodes {
        total_nodes: count(raw, &["total_nodes", "total"]).unwrap_or(listed),
        online_nodes: count(raw, &["online_nodes", "online"]).unwrap_or(reachable),
        peer_count: count(raw, &["peer_count", "peers"]),
        nodes,
        warming_up: false,
    }
}

#[must_use]
pub fn normalize_node(raw: &Value) -> NetworkNode {
    NetworkNode {
        node_id: text(raw, &["node_id", "id", "address", "peer_id"]).unwrap_or_default(),
        role: NodeRole::from_label(&keyword(raw, &["role", "type"])),
        status: NodeStatus::of(raw),
        uptime_percent: number(raw, &["uptime_percent", "uptime"]).map(rescale_percent),
        uptime_seconds: number(raw, &["uptime_seconds"]),
        participation_rate: number(raw, &["participation_rate", "participation"])
            .map(rescale_percent),
        last_seen: text(raw, &["last_seen", "lastSeen", "last_activity"]),
        last_seen_timestamp: number(raw, &["last_seen_timestamp"]),
        version: text(raw, &["version"]),
        address: text(raw, &["address", "ip", "endpoint"]),
        region: text(raw, &["region"]),
        rounds_participated: count(raw, &["rounds_participated", "rounds"]),
        blocks_proposed: count(raw, &["blocks_proposed", "blocks"]),
    }
}
