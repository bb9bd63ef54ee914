//! Upstream access: mirror resolution, timed requests and their error taxonomy.
//!
//! # Components
//!
//! - [`registry`]: Turns the comma-separated mirror list into ordered candidates
//! - [`http_client`]: Shared reqwest client with a hard per-request timeout
//! - [`errors`]: Transport error classification (`TIMEOUT`, `NETWORK_ERROR`)

pub mod errors;
pub mod http_client;
pub mod registry;

pub use errors::UpstreamError;
pub use http_client::{FetchRequest, FetchedResponse, HttpClient, HttpClientConfig};
pub use registry::{pick_upstream, primary_upstream, resolve_upstreams};
