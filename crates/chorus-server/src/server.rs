//! `ChorusServer`: Axum HTTP + WebSocket relay server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use chorus_core::SessionId;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::admin::{self, ApiError};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::health::{self, HealthResponse};
use crate::relay::Relay;
use crate::shutdown::{DEFAULT_DRAIN_TIMEOUT, ShutdownCoordinator};
use crate::websocket::reaper::spawn_reaper;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Dialogue and session registry.
    pub relay: Arc<Relay>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The relay server.
pub struct ChorusServer {
    config: Arc<ServerConfig>,
    relay: Arc<Relay>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl ChorusServer {
    /// Create a server with an empty relay.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            relay: Arc::new(Relay::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            relay: Arc::clone(&self.relay),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            config: Arc::clone(&self.config),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/add_message", post(admin::add_message))
            .route(
                "/dialogue",
                get(admin::get_dialogue).delete(admin::clear_dialogue),
            )
            .route("/dialogue/{session_id}", get(admin::get_session_dialogue))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the listener, start the idle reaper and serve until shutdown.
    ///
    /// Returns the bound address and a handle that completes once the
    /// listener and the reaper have stopped.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let reaper = spawn_reaper(
            Arc::clone(self.relay.registry()),
            self.config.reap_interval(),
            self.config.idle_timeout(),
            self.shutdown.token(),
        );

        let router = self.router();
        let shutdown = Arc::clone(&self.shutdown);
        let token = shutdown.token();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server terminated with error");
            }
            shutdown.drain(vec![reaper], DEFAULT_DRAIN_TIMEOUT).await;
            info!("server stopped");
        });

        info!(
            %local_addr,
            idle_timeout_secs = self.config.idle_timeout_secs,
            reap_interval_secs = self.config.reap_interval_secs,
            "relay listening"
        );
        Ok((local_addr, handle))
    }

    /// The relay state.
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Query string of `GET /ws`.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Client-chosen session id.
    pub user_id: String,
}

/// GET /ws?user_id=<id>
async fn ws_handler(
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(session_id) = SessionId::parse(&params.user_id) else {
        return ApiError::bad_request("user_id must not be blank").into_response();
    };
    if state.shutdown.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let relay = Arc::clone(&state.relay);
    let queue = state.config.send_queue_capacity;
    let token = state.shutdown.token();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            let _ = run_ws_session(socket, session_id, relay, queue, token).await;
        })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.relay.connection_count(),
        state.relay.dialogue_len(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, header};
    use chorus_core::{Message, Role};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn make_server() -> ChorusServer {
        ChorusServer::new(ServerConfig::default())
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let (status, body) = send(server.router(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["dialogue_length"], 0);
    }

    #[tokio::test]
    async fn add_message_then_fetch() {
        let server = make_server();
        let (status, body) = send(
            server.router(),
            post_json("/add_message", r#"{"role":"assistant","content":"hello"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success"}));

        let (_, dialogue) = send(server.router(), get("/dialogue")).await;
        assert_eq!(dialogue[0]["role"], "assistant");
        assert_eq!(dialogue[0]["content"], "hello");
        assert_eq!(dialogue[0]["vad_status"], "");
    }

    #[tokio::test]
    async fn add_message_defaults_role_and_content() {
        let server = make_server();
        let (status, _) = send(server.router(), post_json("/add_message", "{}")).await;
        assert_eq!(status, StatusCode::OK);
        let dialogue = server.relay().dialogue();
        assert_eq!(dialogue, vec![Message::new(Role::User, "")]);
    }

    #[tokio::test]
    async fn add_message_malformed_body_is_400() {
        let server = make_server();
        let (status, body) =
            send(server.router(), post_json("/add_message", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["message"].is_string());
        assert!(server.relay().dialogue().is_empty());
    }

    #[tokio::test]
    async fn add_message_wrong_field_type_is_400() {
        let server = make_server();
        for body in [r#"{"content":42}"#, r#"{"role":["user"]}"#, r#""hello""#] {
            let (status, value) = send(server.router(), post_json("/add_message", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
            assert_eq!(value["status"], "error");
        }
        assert!(server.relay().dialogue().is_empty());
    }

    #[tokio::test]
    async fn clear_dialogue() {
        let server = make_server();
        let _ = send(server.router(), post_json("/add_message", r#"{"content":"x"}"#)).await;
        let req = Request::builder()
            .method(Method::DELETE)
            .uri("/dialogue")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(server.router(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        let (_, dialogue) = send(server.router(), get("/dialogue")).await;
        assert_eq!(dialogue, json!([]));
    }

    #[tokio::test]
    async fn unknown_session_dialogue_is_404() {
        let server = make_server();
        let (status, body) = send(server.router(), get("/dialogue/nobody")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn ws_without_user_id_is_400() {
        let server = make_server();
        let resp = server.router().oneshot(get("/ws")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metrics_without_recorder_is_404() {
        let server = make_server();
        let resp = server.router().oneshot(get("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_with_handle_renders() {
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();
        let server = make_server().with_metrics(handle);
        let resp = server.router().oneshot(get("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let server = make_server();
        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://example.test")
            .body(Body::empty())
            .unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let resp = server.router().oneshot(get("/nonexistent")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_and_shutdown() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        server.shutdown().shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("shutdown timed out")
            .expect("join error");
    }
}
