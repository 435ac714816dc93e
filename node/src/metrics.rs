//! # Prometheus Metrics
//!
//! Exposes operational metrics for the node, scraped at `/metrics`.
//!
//! The swarm already keeps its own counters and timestamps, so metrics are
//! collected on scrape: [`NodeMetrics::observe`] copies the swarm's current
//! numbers into the Prometheus handles right before encoding.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use parking_lot::Mutex;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

use swarm_protocol::network::Swarm;

use crate::api::AppState;

/// Holds all Prometheus metric handles for the node.
///
/// Shared across request handlers as [`SharedMetrics`].
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Serializes [`observe`](Self::observe) so concurrent scrapes cannot
    /// both apply the same counter delta.
    observe_lock: Mutex<()>,
    /// Peers currently in the table.
    pub known_peers: IntGauge,
    /// Peers with a liveness record.
    pub tracked_peers: IntGauge,
    /// Completed distribute rounds.
    pub rounds_total: IntCounter,
    /// Peer sends the transport accepted.
    pub sends_delivered_total: IntCounter,
    /// Peer sends that failed or timed out.
    pub sends_failed_total: IntCounter,
    /// Peer-list messages merged.
    pub messages_received_total: IntCounter,
    /// Unix time of the latest completed round.
    pub last_distributed_seconds: IntGauge,
    /// Unix time of the latest merged message.
    pub last_received_seconds: IntGauge,
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
    let gauge = IntGauge::new(name, help)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Advances a counter to `total`. Totals from the swarm never decrease.
fn advance(counter: &IntCounter, total: u64) {
    counter.inc_by(total.saturating_sub(counter.get()));
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("swarm".into()), None)?;

        Ok(Self {
            known_peers: gauge(&registry, "known_peers", "Number of peers in the peer table")?,
            tracked_peers: gauge(
                &registry,
                "tracked_peers",
                "Number of peers this node has heard from directly",
            )?,
            rounds_total: counter(&registry, "rounds_total", "Completed distribute rounds")?,
            sends_delivered_total: counter(
                &registry,
                "sends_delivered_total",
                "Peer-list sends accepted by the transport",
            )?,
            sends_failed_total: counter(
                &registry,
                "sends_failed_total",
                "Peer-list sends that failed or timed out",
            )?,
            messages_received_total: counter(
                &registry,
                "messages_received_total",
                "Peer-list messages merged into the table",
            )?,
            last_distributed_seconds: gauge(
                &registry,
                "last_distributed_seconds",
                "Unix time of the latest completed distribute round",
            )?,
            last_received_seconds: gauge(
                &registry,
                "last_received_seconds",
                "Unix time of the latest merged peer-list message",
            )?,
            registry,
            observe_lock: Mutex::new(()),
        })
    }

    /// Copies the swarm's current state into the metric handles.
    pub fn observe(&self, swarm: &Swarm) {
        let _observing = self.observe_lock.lock();
        let stats = swarm.stats();
        self.known_peers.set(swarm.count() as i64);
        self.tracked_peers.set(swarm.liveness().len() as i64);
        advance(&self.rounds_total, stats.rounds);
        advance(&self.sends_delivered_total, stats.sends_delivered);
        advance(&self.sends_failed_total, stats.sends_failed);
        advance(&self.messages_received_total, stats.messages_received);
        self.last_distributed_seconds
            .set(swarm.last_distributed().timestamp());
        self.last_received_seconds.set(swarm.last_received().timestamp());
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.observe(&state.swarm);
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_only_move_forward() {
        let metrics = NodeMetrics::new().unwrap();
        advance(&metrics.rounds_total, 5);
        advance(&metrics.rounds_total, 3);
        assert_eq!(metrics.rounds_total.get(), 5);
        advance(&metrics.rounds_total, 8);
        assert_eq!(metrics.rounds_total.get(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_scrapes_never_overshoot_swarm_totals() {
        use std::sync::Arc;
        use std::time::Duration;
        use swarm_protocol::crypto::PrivateKey;
        use swarm_protocol::network::{Endpoint, InProcTransport};

        let swarm = Swarm::with_transport(
            PrivateKey::generate(),
            Endpoint::parse(&format!("inproc://metrics-{}", uuid::Uuid::new_v4())).unwrap(),
            Duration::from_millis(100),
            Arc::new(InProcTransport::new()),
        );
        swarm.init_context().await.unwrap();
        for _ in 0..3 {
            swarm.distribute().await.unwrap();
        }

        let metrics = NodeMetrics::new().unwrap();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        metrics.observe(&swarm);
                    }
                });
            }
        });
        assert_eq!(metrics.rounds_total.get(), 3);

        swarm.dispose().await;
    }

    #[test]
    fn encoded_output_uses_swarm_prefix() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.known_peers.set(3);
        let body = metrics.encode().unwrap();
        assert!(body.contains("swarm_known_peers 3"));
        assert!(body.contains("swarm_rounds_total 0"));
    }
}
