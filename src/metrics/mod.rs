mod server;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the query side
// ============================================================================
//
// Covers:
// - events published per action
// - responses received per outcome (delivered, unmatched, malformed, ...)
// - query timeouts, failures and latency
// - codec errors per encoding
// - pending query count and the producer circuit state
//
// Scraped via /metrics on the metrics server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub events_published: IntCounterVec,
    pub responses_received: IntCounterVec,
    pub query_timeouts: IntCounter,
    pub query_failures: IntCounterVec,
    pub codec_errors: IntCounterVec,
    pub pending_queries: IntGauge,
    pub query_duration: Histogram,
    pub circuit_breaker_state: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_published = IntCounterVec::new(
            Opts::new("flashsale_events_published_total", "Events published to the bus"),
            &["action"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let responses_received = IntCounterVec::new(
            Opts::new(
                "flashsale_responses_received_total",
                "Responses consumed from the response topic",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(responses_received.clone()))?;

        let query_timeouts = IntCounter::new(
            "flashsale_query_timeouts_total",
            "Queries abandoned after their deadline",
        )?;
        registry.register(Box::new(query_timeouts.clone()))?;

        let query_failures = IntCounterVec::new(
            Opts::new("flashsale_query_failures_total", "Queries that ended in an error"),
            &["kind"],
        )?;
        registry.register(Box::new(query_failures.clone()))?;

        let codec_errors = IntCounterVec::new(
            Opts::new("flashsale_codec_errors_total", "Aggregate decode failures"),
            &["format"],
        )?;
        registry.register(Box::new(codec_errors.clone()))?;

        let pending_queries = IntGauge::new(
            "flashsale_pending_queries",
            "Queries waiting for a response",
        )?;
        registry.register(Box::new(pending_queries.clone()))?;

        let query_duration = Histogram::with_opts(
            HistogramOpts::new(
                "flashsale_query_duration_seconds",
                "Time from publish to matched response",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(query_duration.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "flashsale_circuit_breaker_state",
            "Producer circuit state (0=Closed, 1=HalfOpen, 2=Open)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            events_published,
            responses_received,
            query_timeouts,
            query_failures,
            codec_errors,
            pending_queries,
            query_duration,
            circuit_breaker_state,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_published(&self, action: &str) {
        self.events_published.with_label_values(&[action]).inc();
    }

    pub fn record_response(&self, outcome: &str) {
        self.responses_received.with_label_values(&[outcome]).inc();
    }

    pub fn record_query_success(&self, duration_secs: f64) {
        self.query_duration.observe(duration_secs);
    }

    /// Failed query; timeouts are also counted separately.
    pub fn record_query_failure(&self, kind: &str) {
        if kind == "timeout" {
            self.query_timeouts.inc();
        }
        self.query_failures.with_label_values(&[kind]).inc();
    }

    pub fn record_codec_error(&self, format: &str) {
        self.codec_errors.with_label_values(&[format]).inc();
    }

    pub fn set_pending(&self, pending: usize) {
        self.pending_queries.set(i64::try_from(pending).unwrap_or(i64::MAX));
    }

    pub fn set_circuit_state(&self, gauge: i64) {
        self.circuit_breaker_state.set(gauge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_published("query");

        let names: Vec<String> = metrics
            .registry()
            .gather()
            .iter()
            .map(|family| family.name().to_string())
            .collect();
        assert!(names.contains(&"flashsale_events_published_total".to_string()));
        assert!(names.contains(&"flashsale_pending_queries".to_string()));
    }

    #[test]
    fn test_timeout_counts_as_failure() {
        let metrics = Metrics::new().unwrap();
        metrics.record_query_failure("timeout");
        metrics.record_query_failure("remote");

        assert_eq!(metrics.query_timeouts.get(), 1);
        assert_eq!(metrics.query_failures.with_label_values(&["timeout"]).get(), 1);
        assert_eq!(metrics.query_failures.with_label_values(&["remote"]).get(), 1);
    }

    #[test]
    fn test_gauges() {
        let metrics = Metrics::new().unwrap();
        metrics.set_pending(3);
        metrics.set_circuit_state(2);
        metrics.record_response("unmatched");

        assert_eq!(metrics.pending_queries.get(), 3);
        assert_eq!(metrics.circuit_breaker_state.get(), 2);
        assert_eq!(metrics.responses_received.with_label_values(&["unmatched"]).get(), 1);
    }
}
