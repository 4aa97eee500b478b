//! HTTP gateway for craftbot.
//!
//! A keep-alive endpoint for hosting platforms that expect the process to
//! answer HTTP, plus a small health report with the current session state.

use std::sync::Arc;

use axum::{Router, extract::State, response::Json, routing::get};
use chrono::{DateTime, Utc};
use craftbot_config::GatewayConfig;
use craftbot_core::SessionState;
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

/// Shared state for the gateway handlers.
pub struct GatewayState {
    pub started_at: DateTime<Utc>,
    pub session: watch::Receiver<SessionState>,
}

impl GatewayState {
    pub fn new(session: watch::Receiver<SessionState>) -> Self {
        Self {
            started_at: Utc::now(),
            session,
        }
    }
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the process exits.
pub async fn start(config: &GatewayConfig, state: SharedState) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, build_router(state)).await
}

// --- Handlers ---

async fn root_handler() -> &'static str {
    "Bot is running!\n"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    session: SessionState,
    uptime_secs: i64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let session = *state.session.borrow();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        session,
        uptime_secs: (Utc::now() - state.started_at).num_seconds().max(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state(initial: SessionState) -> (SharedState, watch::Sender<SessionState>) {
        let (tx, rx) = watch::channel(initial);
        (Arc::new(GatewayState::new(rx)), tx)
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn root_reports_running() {
        let (state, _tx) = test_state(SessionState::Stopped);
        let (status, body) = get_body(build_router(state), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Bot is running!\n");
    }

    #[tokio::test]
    async fn health_tracks_session_state() {
        let (state, tx) = test_state(SessionState::Stopped);
        let app = build_router(state);

        let (status, body) = get_body(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["session"], "stopped");
        assert!(json["uptime_secs"].as_i64().unwrap() >= 0);

        tx.send_replace(SessionState::CoolingDown);
        let (_, body) = get_body(app, "/health").await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["session"], "cooling_down");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (state, _tx) = test_state(SessionState::Running);
        let (status, _) = get_body(build_router(state), "/v1/chat").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
