//! Per-request metrics

use axum::{extract::Request, middleware::Next, response::Response};
use seatwise_common::metrics::RequestMetrics;

/// Record a counter and latency histogram for every request
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    // The matched route is not known yet; the raw path is good enough for
    // a service this size.
    let endpoint = request.uri().path().to_string();

    let metrics = RequestMetrics::start(&method, &endpoint);
    let response = next.run(request).await;
    metrics.finish(response.status().as_u16());

    response
}
