//! Mapping from upstream JSON to the canonical explorer schemas.
//!
//! The node API is not versioned with any rigour: list endpoints answer with a
//! bare array one week and `{ items: [...] }` the next, and the same field
//! shows up under snake_case, camelCase and abbreviated names. Every
//! normalizer here is total over arbitrary [`serde_json::Value`] input.
//! Anything missing or malformed becomes a default instead of an error.

pub mod audit;
pub mod blocks;
mod fields;
pub mod metrics;
pub mod network;
pub mod rounds;
pub mod search;
pub mod status;
pub mod transactions;

pub use audit::{
    normalize_checkpoints, normalize_replay_status, AuditReplayStatus, Checkpoint, CheckpointsList,
};
pub use blocks::{
    normalize_block_detail, normalize_block_summary, normalize_blocks_list, BlockDetail,
    BlockSummary, BlocksList,
};
pub use fields::{rescale_percent, Identifier};
pub use metrics::{normalize_metrics, MetricPoint, MetricsResponse, MetricsSeries};
pub use network::{
    normalize_network_nodes, normalize_node, NetworkNode, NetworkNodes, NodeRole, NodeStatus,
};
pub use rounds::{
    normalize_round_detail, normalize_round_summary, normalize_rounds_list, RoundDetail,
    RoundStatus, RoundSummary, RoundsList,
};
pub use search::{detect_search_type, normalize_search, SearchHit, SearchHitType, SearchResponse};
pub use status::{normalize_status, NetworkHealth, ReplayStatus, Status};
pub use transactions::{
    normalize_tx_detail, normalize_tx_list, normalize_tx_summary, LifecycleEvent, LifecycleStage,
    TxDetail, TxList, TxSummary,
};
