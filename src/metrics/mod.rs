// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, Opts, Registry,
};

use crate::domain::order::OrderStatus;

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Checkout throughput, rejections and latency
// - Order status transitions (applied and rejected)
// - Realtime feed health (live vs degraded, fallback fetches)
// - Hiring workflow volume
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Checkout Metrics
    pub orders_created: IntCounter,
    pub checkout_rejected: IntCounterVec,
    pub checkout_duration: HistogramVec,

    // Order Lifecycle Metrics
    pub order_transitions: IntCounterVec,
    pub order_transitions_rejected: IntCounterVec,

    // Realtime Feed Metrics
    pub feed_degraded: IntCounterVec,
    pub feed_fallback_fetches: IntCounterVec,
    pub live_order_feeds: IntGauge,

    // Hiring Metrics
    pub hiring_requests: IntCounter,
    pub hiring_decisions: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Checkout Metrics
        let orders_created = IntCounter::new(
            "orders_created_total",
            "Total orders successfully submitted",
        )?;
        registry.register(Box::new(orders_created.clone()))?;

        let checkout_rejected = IntCounterVec::new(
            Opts::new("checkout_rejected_total", "Checkout submissions rejected before an order was written"),
            &["reason"],
        )?;
        registry.register(Box::new(checkout_rejected.clone()))?;

        let checkout_duration = HistogramVec::new(
            HistogramOpts::new("checkout_duration_seconds", "Checkout submission duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(checkout_duration.clone()))?;

        // Order Lifecycle Metrics
        let order_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Applied order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let order_transitions_rejected = IntCounterVec::new(
            Opts::new("order_status_transitions_rejected_total", "Order status transitions rejected by lifecycle or authority rules"),
            &["reason"],
        )?;
        registry.register(Box::new(order_transitions_rejected.clone()))?;

        // Realtime Feed Metrics
        let feed_degraded = IntCounterVec::new(
            Opts::new("order_feed_degraded_total", "Order feeds that fell back from live sync to one-shot fetching"),
            &["scope", "reason"],
        )?;
        registry.register(Box::new(feed_degraded.clone()))?;

        let feed_fallback_fetches = IntCounterVec::new(
            Opts::new("order_feed_fallback_fetches_total", "One-shot fetches served while degraded"),
            &["scope"],
        )?;
        registry.register(Box::new(feed_fallback_fetches.clone()))?;

        let live_order_feeds = IntGauge::new(
            "live_order_feeds",
            "Order feeds currently open (live or degraded)",
        )?;
        registry.register(Box::new(live_order_feeds.clone()))?;

        // Hiring Metrics
        let hiring_requests = IntCounter::new(
            "hiring_requests_total",
            "Courier hiring requests submitted",
        )?;
        registry.register(Box::new(hiring_requests.clone()))?;

        let hiring_decisions = IntCounterVec::new(
            Opts::new("hiring_decisions_total", "Hiring requests decided"),
            &["decision"],
        )?;
        registry.register(Box::new(hiring_decisions.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            checkout_rejected,
            checkout_duration,
            order_transitions,
            order_transitions_rejected,
            feed_degraded,
            feed_fallback_fetches,
            live_order_feeds,
            hiring_requests,
            hiring_decisions,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a checkout outcome
    pub fn record_checkout(&self, duration_secs: f64, rejection_reason: Option<&str>) {
        match rejection_reason {
            None => {
                self.orders_created.inc();
                self.checkout_duration.with_label_values(&["ok"]).observe(duration_secs);
            }
            Some(reason) => {
                self.checkout_rejected.with_label_values(&[reason]).inc();
                self.checkout_duration.with_label_values(&["rejected"]).observe(duration_secs);
            }
        }
    }

    /// Helper to record an applied status transition
    pub fn record_transition(&self, from: OrderStatus, to: OrderStatus) {
        self.order_transitions.with_label_values(&[from.as_str(), to.as_str()]).inc();
    }

    /// Helper to record a rejected status transition
    pub fn record_transition_rejected(&self, reason: &str) {
        self.order_transitions_rejected.with_label_values(&[reason]).inc();
    }

    /// Helper to record a feed falling back to one-shot fetching
    pub fn record_feed_degraded(&self, scope: &str, reason: &str) {
        self.feed_degraded.with_label_values(&[scope, reason]).inc();
    }

    /// Helper to record a one-shot fetch served while degraded
    pub fn record_fallback_fetch(&self, scope: &str) {
        self.feed_fallback_fetches.with_label_values(&[scope]).inc();
    }

    /// Helper to record a hiring decision
    pub fn record_hiring_decision(&self, accepted: bool) {
        let decision = if accepted { "accepted" } else { "rejected" };
        self.hiring_decisions.with_label_values(&[decision]).inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
