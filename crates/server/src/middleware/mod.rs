//! HTTP middleware shared by every route of the gateway.

pub mod correlation_id;

pub use correlation_id::{
    create_request_id_layers, RequestSpan, UuidRequestIdGenerator, X_REQUEST_ID,
};
