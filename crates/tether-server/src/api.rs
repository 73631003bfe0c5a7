//! HTTP 控制 API
//!
//! 只读路由无需认证, 修改桥接行为的路由需要配置的 Bearer token。

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use tether_core::{Intent, IntentError, OperatorId, StatusSnapshot};
use tether_observability::{intent_span, ObservabilityError};

use crate::commands::{self, CommandError};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub operator: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub operator: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct LogLevelRequest {
    /// `EnvFilter` directive, e.g. `debug` or `tether_core=trace,info`
    pub level: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API 调用错误
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Intent(#[from] IntentError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Logging(#[from] ObservabilityError),
    #[error("Missing or invalid bearer token")]
    Unauthorized,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Intent(IntentError::NotConnected) => StatusCode::CONFLICT,
            ApiError::Intent(IntentError::InvalidIntent(_)) => StatusCode::BAD_REQUEST,
            ApiError::Intent(IntentError::SendFailed(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Intent(IntentError::BridgeClosed) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Command(_) => StatusCode::BAD_REQUEST,
            ApiError::Logging(ObservabilityError::Filter(_)) => StatusCode::BAD_REQUEST,
            ApiError::Logging(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Intent(e) => e.code(),
            ApiError::Command(_) => "INVALID_COMMAND",
            ApiError::Logging(ObservabilityError::Filter(_)) => "INVALID_LOG_LEVEL",
            ApiError::Logging(_) => "LOGGING_FAILED",
            ApiError::Unauthorized => "UNAUTHORIZED",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// 启动 API 服务, 直到 `shutdown` 完成
pub async fn run_server(
    state: AppState,
    addr: SocketAddr,
    cors: bool,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state, cors);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Tether control API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// 构建 API 路由
pub fn create_router(state: AppState, cors: bool) -> Router {
    let mutating = Router::new()
        .route("/api/v1/join", post(join_handler))
        .route("/api/v1/leave", post(leave_handler))
        .route("/api/v1/send", post(send_handler))
        .route("/api/v1/command", post(command_handler))
        .route("/api/v1/log-level", put(log_level_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/status", get(status_handler))
        .merge(mutating)
        .layer(TraceLayer::new_for_http());

    let router = if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };
    router.with_state(state)
}

async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if let Some(expected) = &state.api_token {
        let provided = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        if provided != Some(expected.as_str()) {
            tracing::warn!("Rejected {} without a valid token", request.uri().path());
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(metrics) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            metrics.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn status_handler(State(state): State<AppState>) -> ApiResult<Json<StatusSnapshot>> {
    Ok(Json(state.gate.snapshot().await?))
}

async fn join_handler(
    State(state): State<AppState>,
    request: Option<Json<JoinRequest>>,
) -> ApiResult<(StatusCode, Json<StatusSnapshot>)> {
    let operator = request
        .and_then(|Json(request)| request.operator)
        .map(OperatorId::new);
    submit(&state, Intent::Join(operator.clone()), operator.as_ref()).await
}

async fn leave_handler(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<StatusSnapshot>)> {
    submit(&state, Intent::Leave, None).await
}

async fn send_handler(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> ApiResult<(StatusCode, Json<StatusSnapshot>)> {
    submit(&state, Intent::Send(request.text), None).await
}

async fn command_handler(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> ApiResult<(StatusCode, Json<StatusSnapshot>)> {
    let command = commands::parse(&request.text)?;
    let operator = OperatorId::new(request.operator);
    tracing::debug!("Operator {} issued {:?}", operator, command);

    match command.into_intent(operator.clone()) {
        Some(intent) => submit(&state, intent, Some(&operator)).await,
        None => Ok((StatusCode::OK, Json(state.gate.snapshot().await?))),
    }
}

async fn log_level_handler(
    State(state): State<AppState>,
    Json(request): Json<LogLevelRequest>,
) -> ApiResult<Response> {
    let Some(logging) = &state.logging else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let mut manager = logging.lock().await;
    manager.update_level(&request.level)?;
    Ok(Json(json!({ "level": manager.level() })).into_response())
}

async fn submit(
    state: &AppState,
    intent: Intent,
    operator: Option<&OperatorId>,
) -> ApiResult<(StatusCode, Json<StatusSnapshot>)> {
    let span = intent_span(intent.kind(), operator.map(OperatorId::as_str));
    let snapshot = state.gate.submit(intent).instrument(span).await?;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}
