use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use common::{BotStatus, Error, Instrument, InstrumentDraft};

use crate::{auth::require_auth, AppState};

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/bot/start", post(start_bot))
        .route("/api/bot/stop", post(stop_bot))
        .route("/api/instruments", post(add_instrument))
        .route("/api/instruments/:symbol", delete(remove_instrument))
        .route("/api/decisions", get(get_decisions))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn error_response(e: Error) -> (StatusCode, Json<Value>) {
    let status = match e {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Config(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %e, "Dashboard request failed");
    }
    (status, Json(json!({ "error": e.to_string() })))
}

// ─── Lifecycle ────────────────────────────────────────────────────────────────

async fn get_status(State(state): State<AppState>) -> Json<BotStatus> {
    Json(state.controller.status().await)
}

async fn start_bot(State(state): State<AppState>) -> ApiResult {
    info!("Start requested from dashboard");
    state.controller.start().await.map_err(error_response)?;
    Ok(Json(json!({ "status": state.controller.status().await })))
}

async fn stop_bot(State(state): State<AppState>) -> Json<Value> {
    info!("Stop requested from dashboard");
    state.controller.stop().await;
    Json(json!({ "status": state.controller.status().await }))
}

// ─── Instruments ──────────────────────────────────────────────────────────────

async fn add_instrument(
    State(state): State<AppState>,
    Json(draft): Json<InstrumentDraft>,
) -> ApiResult {
    let instrument = Instrument::try_from(draft).map_err(error_response)?;
    let added = state
        .controller
        .add_instrument(instrument.clone())
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "added": added, "instrument": instrument })))
}

async fn remove_instrument(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Json<Value> {
    let removed = state.controller.remove_instrument(&symbol).await;
    Json(json!({ "removed": removed, "symbol": symbol }))
}

// ─── Decisions ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct DecisionsQuery {
    page: Option<u32>,
    limit: Option<u32>,
    symbol: Option<String>,
}

async fn get_decisions(
    State(state): State<AppState>,
    Query(q): Query<DecisionsQuery>,
) -> ApiResult {
    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(50).clamp(1, 200);
    let offset = (page - 1).saturating_mul(limit);
    let symbol = q.symbol.as_deref().filter(|s| !s.is_empty());

    let rows = state
        .sink
        .recent(symbol, limit, offset)
        .await
        .map_err(error_response)?;
    let total = state.sink.count(symbol).await.map_err(error_response)?;

    Ok(Json(json!({
        "decisions": rows,
        "total": total,
        "page": page,
        "limit": limit,
    })))
}
