//! # REST API
//!
//! Builds the axum router that exposes the node's view of the overlay.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path       | Description                                 |
//! |--------|------------|---------------------------------------------|
//! | GET    | `/health`  | Liveness probe                              |
//! | GET    | `/status`  | Identity, lifecycle state, round timestamps |
//! | GET    | `/peers`   | Peer table with last-contact times          |
//! | GET    | `/metrics` | Prometheus text exposition                  |

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use swarm_protocol::network::{Swarm, SwarmStats, SwarmStatus};

use crate::metrics::{self, SharedMetrics};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: the swarm is a shared handle and metrics sit behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The gossip node being served.
    pub swarm: Swarm,
    /// Prometheus handles, refreshed on scrape.
    pub metrics: SharedMetrics,
    /// When the process started serving.
    pub started_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/peers", get(peers_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Hex-encoded node public key.
    pub public_key: String,
    /// Advertised endpoint.
    pub endpoint: String,
    /// Lifecycle state of the swarm.
    pub status: SwarmStatus,
    /// Peers in the table.
    pub peer_count: usize,
    /// ISO-8601 completion time of the latest distribute round.
    pub last_distributed: String,
    /// ISO-8601 time of the latest merged peer list.
    pub last_received: String,
    /// Cumulative round and message counters.
    pub stats: SwarmStats,
    /// Seconds since the node started serving.
    pub uptime_seconds: i64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// One entry of `GET /peers`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerResponse {
    /// Hex-encoded public key.
    pub public_key: String,
    /// Endpoint recorded in the peer table.
    pub endpoint: String,
    /// ISO-8601 time this node last heard from the peer directly, if ever.
    pub last_seen: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` returns 200 while the swarm is serving.
///
/// Disposed swarms answer 503 so orchestrators can tell a stopping node
/// from a live one.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.swarm.status();
    let code = if status == SwarmStatus::Disposed {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    let label = if code == StatusCode::OK { "ok" } else { "stopping" };
    (code, Json(serde_json::json!({ "status": label })))
}

/// `GET /status` returns node status summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let swarm = &state.swarm;
    let now = Utc::now();
    let resp = StatusResponse {
        version: state.version.clone(),
        public_key: swarm.public_key().to_hex(),
        endpoint: swarm.endpoint().to_string(),
        status: swarm.status(),
        peer_count: swarm.count(),
        last_distributed: swarm.last_distributed().to_rfc3339(),
        last_received: swarm.last_received().to_rfc3339(),
        stats: swarm.stats(),
        uptime_seconds: (now - state.started_at).num_seconds(),
        timestamp: now.to_rfc3339(),
    };
    Json(resp)
}

/// `GET /peers` returns the peer table, sorted by public key.
async fn peers_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut peers = state.swarm.peers();
    peers.sort_by(|a, b| a.public_key().cmp(b.public_key()));

    let body: Vec<PeerResponse> = peers
        .iter()
        .map(|peer| PeerResponse {
            public_key: peer.public_key().to_hex(),
            endpoint: peer.endpoint().to_string(),
            last_seen: state.swarm.last_seen(peer).map(|at| at.to_rfc3339()),
        })
        .collect();
    Json(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::time::Duration;
    use swarm_protocol::crypto::PrivateKey;
    use swarm_protocol::network::{Endpoint, InProcTransport};
    use tower::ServiceExt;

    fn swarm_on(transport: &InProcTransport) -> Swarm {
        let endpoint =
            Endpoint::parse(&format!("inproc://api-{}", uuid::Uuid::new_v4())).unwrap();
        Swarm::with_transport(
            PrivateKey::generate(),
            endpoint,
            Duration::from_millis(200),
            Arc::new(transport.clone()),
        )
    }

    /// Creates a test AppState around a fresh, un-initialized swarm.
    fn test_app_state(swarm: Swarm) -> AppState {
        AppState {
            version: "0.1.0-test".into(),
            swarm,
            metrics: Arc::new(crate::metrics::NodeMetrics::new().unwrap()),
            started_at: Utc::now(),
        }
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state(swarm_on(&InProcTransport::new())));
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn health_reports_disposed_swarm() {
        let swarm = swarm_on(&InProcTransport::new());
        swarm.dispose().await;
        let router = create_router(test_app_state(swarm));

        let (status, _) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn status_endpoint_reports_identity_and_table_size() {
        let transport = InProcTransport::new();
        let swarm = swarm_on(&transport);
        swarm.add(swarm_on(&transport).as_peer());
        let router = create_router(test_app_state(swarm.clone()));

        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);

        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.public_key, swarm.public_key().to_hex());
        assert_eq!(resp.endpoint, swarm.endpoint().to_string());
        assert_eq!(resp.status, SwarmStatus::Created);
        assert_eq!(resp.peer_count, 1);
        assert_eq!(resp.stats, SwarmStats::default());
    }

    #[tokio::test]
    async fn peers_endpoint_lists_table_with_liveness() {
        let transport = InProcTransport::new();
        let a = swarm_on(&transport);
        let b = swarm_on(&transport);
        let c = swarm_on(&transport);
        for swarm in [&a, &b] {
            swarm.init_context().await.unwrap();
        }
        a.add(c.as_peer());
        b.add_peers([a.as_peer()]).unwrap();
        b.distribute().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), a.received_signal().wait_for_generation(1))
            .await
            .unwrap();

        let router = create_router(test_app_state(a.clone()));
        let (status, body) = get(&router, "/peers").await;
        assert_eq!(status, StatusCode::OK);

        let peers: Vec<PeerResponse> = serde_json::from_slice(&body).unwrap();
        assert_eq!(peers.len(), 2);
        let heard_from_b = peers
            .iter()
            .find(|p| p.public_key == b.public_key().to_hex())
            .unwrap();
        assert!(heard_from_b.last_seen.is_some());
        let never_heard = peers
            .iter()
            .find(|p| p.public_key == c.public_key().to_hex())
            .unwrap();
        assert_eq!(never_heard.last_seen, None);

        a.dispose().await;
        b.dispose().await;
    }

    #[tokio::test]
    async fn metrics_endpoint_reflects_swarm() {
        let transport = InProcTransport::new();
        let swarm = swarm_on(&transport);
        swarm.add(swarm_on(&transport).as_peer());
        swarm.add(swarm_on(&transport).as_peer());
        let router = create_router(test_app_state(swarm));

        let (status, body) = get(&router, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("swarm_known_peers 2"));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let router = create_router(test_app_state(swarm_on(&InProcTransport::new())));
        let (status, _) = get(&router, "/blocks/1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
