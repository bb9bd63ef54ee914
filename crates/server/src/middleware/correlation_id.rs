//! Request correlation ids.
//!
//! Each request gets an `x-request-id` (a caller-supplied one is kept), the id
//! is echoed on the response and recorded on the request's tracing span so
//! that proxy attempts and snapshot refreshes can be tied back to a request.

use axum::http::{header::HeaderValue, HeaderName, Request};
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::MakeSpan,
};
use tracing::Span;
use uuid::Uuid;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// A UUID v4 generator for request IDs.
#[derive(Clone, Copy, Default)]
pub struct UuidRequestIdGenerator;

impl MakeRequestId for UuidRequestIdGenerator {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        Some(RequestId::new(HeaderValue::from_str(&id).ok()?))
    }
}

/// Span factory for `TraceLayer` that carries the request id.
///
/// Must run inside the set-request-id layer, otherwise the id is recorded as `-`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .headers()
            .get(&X_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");

        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id,
        )
    }
}

/// Creates the request ID layer pair.
///
/// Apply `propagate` before `set` so that, with axum's bottom-up layering, the
/// id is assigned first and copied to the response last:
///
/// ```ignore
/// let (set_layer, propagate_layer) = create_request_id_layers();
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(propagate_layer)
///     .layer(set_layer);
/// ```
pub fn create_request_id_layers(
) -> (SetRequestIdLayer<UuidRequestIdGenerator>, PropagateRequestIdLayer) {
    (
        SetRequestIdLayer::new(X_REQUEST_ID.clone(), UuidRequestIdGenerator),
        PropagateRequestIdLayer::new(X_REQUEST_ID.clone()),
    )
}
