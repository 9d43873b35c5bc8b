use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;

use docqa_core::types::Turn;

use crate::context::AppContext;
use crate::error::QueryError;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<Turn>>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let cors = ctx.cors();
    let router = Router::new()
        .route("/query", post(query_handler))
        .route("/health", get(health_handler))
        .with_state(ctx);
    if cors {
        router.layer(middleware::from_fn(cors_middleware))
    } else {
        router
    }
}

/// Serve `ctx` on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, ctx: Arc<AppContext>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(listener, build_router(ctx)).with_graceful_shutdown(shutdown).await
}

async fn health_handler(State(ctx): State<Arc<AppContext>>) -> Response {
    if !ctx.is_ready() {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "starting" }))).into_response();
    }
    let chunks = ctx.pipelines().map_or(0, |p| p.chunks);
    Json(json!({ "status": "ready", "chunks": chunks })).into_response()
}

async fn query_handler(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, QueryError> {
    let Json(request) = payload.map_err(|rejection| QueryError::invalid_body(rejection.body_text()))?;
    let question = match request.question {
        Some(q) if !q.trim().is_empty() => q,
        _ => return Err(QueryError::missing_question()),
    };
    let history = request.history.unwrap_or_default();

    let pipelines = ctx.pipelines().ok_or(QueryError::NotReady)?;
    let started = Instant::now();
    let answer = pipelines
        .conversational
        .answer(&question, &history)
        .await
        .map_err(|e| QueryError::upstream(e, ctx.expose_error_details()))?;
    info!(
        history_turns = history.len(),
        answer_chars = answer.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "answered query"
    );
    Ok(Json(QueryResponse { answer }))
}

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let allow_headers = request
            .headers()
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("content-type"));
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
        return response;
    }
    let mut response = next.run(request).await;
    response.headers_mut().insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}
