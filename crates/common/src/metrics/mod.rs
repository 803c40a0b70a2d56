//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Seatwise metrics
pub const METRICS_PREFIX: &str = "seatwise";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 150ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.075,  // 75ms
    0.100,  // 100ms
    0.150,  // 150ms - P99 target
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Booking metrics
    describe_counter!(
        format!("{}_bookings_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total bookings created"
    );

    describe_counter!(
        format!("{}_bookings_updated_total", METRICS_PREFIX),
        Unit::Count,
        "Total bookings with a modified seat set"
    );

    describe_counter!(
        format!("{}_bookings_cancelled_total", METRICS_PREFIX),
        Unit::Count,
        "Total bookings cancelled"
    );

    describe_histogram!(
        format!("{}_booking_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Booking creation latency in seconds"
    );

    // Seat inventory metrics
    describe_counter!(
        format!("{}_seats_reserved_total", METRICS_PREFIX),
        Unit::Count,
        "Total seats transitioned to RESERVED"
    );

    describe_counter!(
        format!("{}_seat_conflicts_total", METRICS_PREFIX),
        Unit::Count,
        "Reservation attempts rejected because a seat was taken"
    );

    // Pricing metrics
    describe_counter!(
        format!("{}_quotes_total", METRICS_PREFIX),
        Unit::Count,
        "Total price quotes computed"
    );

    // Loyalty metrics
    describe_counter!(
        format!("{}_points_earned_total", METRICS_PREFIX),
        Unit::Count,
        "Total loyalty points credited"
    );

    describe_counter!(
        format!("{}_points_redeemed_total", METRICS_PREFIX),
        Unit::Count,
        "Total loyalty points debited"
    );

    // Notification metrics
    describe_counter!(
        format!("{}_notifications_enqueued_total", METRICS_PREFIX),
        Unit::Count,
        "Notification messages handed to the gateway"
    );

    describe_counter!(
        format!("{}_notifications_delivered_total", METRICS_PREFIX),
        Unit::Count,
        "Notification messages delivered to the webhook"
    );

    describe_counter!(
        format!("{}_notification_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Notification deliveries that failed after retries"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record booking creation metrics
pub fn record_booking_created(duration_secs: f64, seat_count: usize) {
    counter!(format!("{}_bookings_created_total", METRICS_PREFIX)).increment(1);
    counter!(format!("{}_seats_reserved_total", METRICS_PREFIX)).increment(seat_count as u64);
    histogram!(format!("{}_booking_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record a booking update
pub fn record_booking_updated() {
    counter!(format!("{}_bookings_updated_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record a booking cancellation
pub fn record_booking_cancelled() {
    counter!(format!("{}_bookings_cancelled_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record a lost seat reservation race
pub fn record_seat_conflict(seat_count: usize) {
    counter!(format!("{}_seat_conflicts_total", METRICS_PREFIX)).increment(seat_count as u64);
}

/// Helper to record a price quote
pub fn record_quote(with_code: bool, with_points: bool) {
    counter!(
        format!("{}_quotes_total", METRICS_PREFIX),
        "code" => with_code.to_string(),
        "points" => with_points.to_string()
    )
    .increment(1);
}

/// Helper to record loyalty ledger movement
pub fn record_points(earned: i64, redeemed: i64) {
    if earned > 0 {
        counter!(format!("{}_points_earned_total", METRICS_PREFIX)).increment(earned as u64);
    }
    if redeemed > 0 {
        counter!(format!("{}_points_redeemed_total", METRICS_PREFIX)).increment(redeemed as u64);
    }
}

/// Helper to record notification dispatch outcomes
pub fn record_notification(kind: &str, delivered: bool) {
    if delivered {
        counter!(
            format!("{}_notifications_delivered_total", METRICS_PREFIX),
            "kind" => kind.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_notification_failures_total", METRICS_PREFIX),
            "kind" => kind.to_string()
        )
        .increment(1);
    }
}

/// Helper to record a message handed to the notification queue
pub fn record_notification_enqueued(kind: &str) {
    counter!(
        format!("{}_notifications_enqueued_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        // Verify buckets are sorted and contain SLO targets
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        // P50 target (50ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.050));
        // P99 target (150ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.150));
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/v1/bookings");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(201);
        // Just verify it runs without panic
    }
}
