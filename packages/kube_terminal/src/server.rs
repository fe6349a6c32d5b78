use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, WebSocketUpgrade, ws::WebSocket},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use terminal_bridge::{
    BridgeOptions, BridgeState, CloseStatus, ConnectionResolver, ExecTarget, ExecTransport,
    Orchestrator, SessionLifecycle, ShellCommands, run_session,
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::{Instrument, info, warn};
use uuid::Uuid;

use crate::ws_session::WsSession;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

struct Shared<R, T> {
    orchestrator: Orchestrator<R, T>,
    commands: ShellCommands,
    bridge: BridgeOptions,
    close: CloseStatus,
    shutdown: CancellationToken,
    sessions: TaskTracker,
}

/// Router state. Every terminal session borrows the same orchestrator.
pub struct AppState<R, T> {
    inner: Arc<Shared<R, T>>,
}

impl<R, T> Clone for AppState<R, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R, T> AppState<R, T>
where
    R: ConnectionResolver + 'static,
    T: ExecTransport<R::Connection> + 'static,
{
    pub fn new(
        orchestrator: Orchestrator<R, T>,
        commands: ShellCommands,
        bridge: BridgeOptions,
        close: CloseStatus,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                orchestrator,
                commands,
                bridge,
                close,
                shutdown,
                sessions: TaskTracker::new(),
            }),
        }
    }

    /// Tracker holding every live terminal session task.
    pub fn sessions(&self) -> &TaskTracker {
        &self.inner.sessions
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }
}

/// Builds the HTTP router: the terminal WebSocket at `ws_path` plus `/health`.
pub fn router<R, T>(state: AppState<R, T>, ws_path: &str) -> Router
where
    R: ConnectionResolver + 'static,
    T: ExecTransport<R::Connection> + 'static,
{
    Router::new()
        .route("/health", get(health_handler::<R, T>))
        .route(ws_path, get(terminal_handler::<R, T>))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .with_state(state)
}

async fn health_handler<R, T>(State(state): State<AppState<R, T>>) -> impl IntoResponse
where
    R: ConnectionResolver + 'static,
    T: ExecTransport<R::Connection> + 'static,
{
    Json(serde_json::json!({
        "status": "alive",
        "active_sessions": state.sessions().len(),
    }))
}

async fn terminal_handler<R, T>(
    State(state): State<AppState<R, T>>,
    Query(target): Query<ExecTarget>,
    ws: WebSocketUpgrade,
) -> Response
where
    R: ConnectionResolver + 'static,
    T: ExecTransport<R::Connection> + 'static,
{
    if target.namespace.is_empty() || target.pod.is_empty() {
        return (StatusCode::BAD_REQUEST, "namespace and pod are required").into_response();
    }
    if state.shutdown_token().is_cancelled() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.on_upgrade(move |socket| {
        let sessions = state.sessions().clone();
        sessions.track_future(serve_terminal(socket, state, target))
    })
}

async fn serve_terminal<R, T>(socket: WebSocket, state: AppState<R, T>, target: ExecTarget)
where
    R: ConnectionResolver + 'static,
    T: ExecTransport<R::Connection> + 'static,
{
    let session_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "session",
        id = %session_id,
        namespace = %target.namespace,
        pod = %target.pod,
        container = %target.container,
    );

    async move {
        info!(context = %target.context, "Terminal session opened");
        let shared = &state.inner;
        let bridge = BridgeState::new(WsSession::new(socket), target, &shared.bridge);
        let lifecycle = SessionLifecycle::new(shared.shutdown.child_token(), shared.close.clone());

        let attempts =
            run_session(&bridge, &shared.orchestrator, &shared.commands, &lifecycle).await;
        if attempts.succeeded() {
            info!("Terminal session closed");
        } else {
            warn!(
                errors = attempts.errors().count(),
                "Terminal session closed after failure"
            );
        }
    }
    .instrument(span)
    .await
}
