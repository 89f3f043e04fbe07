// HTTP handlers for sessions, settlement and payment links

use crate::{error::GatewayError, metrics::METRICS};
use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Json,
};
use chrono::{NaiveDate, Utc};
use potsplit_sessions::{NewPlayer, Player, PlayerUpdate, Session, SessionId, SessionService};
use potsplit_settlement::{PaymentHandle, PaymentLinks, ResolvedTransaction, Transaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

pub type AppState = Arc<SessionService>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// New player; every field is required over HTTP
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPlayerRequest {
    pub name: String,
    pub buy_in_amount: Decimal,
    pub final_amount: Decimal,
    pub payment_handle: PaymentHandle,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    #[serde(default)]
    pub margin_of_error: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct SettleResponse {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub transaction: Transaction,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub transaction: ResolvedTransaction,
    pub links: PaymentLinks,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

// Request counting and latency
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    METRICS.http_requests_in_flight.inc();

    let response = next.run(request).await;

    METRICS.http_requests_in_flight.dec();
    METRICS.http_requests_total.inc();
    METRICS
        .http_request_duration_seconds
        .observe(start.elapsed().as_secs_f64());
    response
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "potsplit-gateway",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn metrics_handler() -> Result<String, GatewayError> {
    METRICS
        .export()
        .map_err(|e| GatewayError::Internal(format!("Failed to export metrics: {}", e)))
}

/// Run a session service call on the blocking pool
///
/// Service calls take per-session locks and do synchronous file IO.
async fn blocking<T, F>(service: AppState, f: F) -> Result<T, GatewayError>
where
    F: FnOnce(&SessionService) -> potsplit_sessions::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(|e| GatewayError::Internal(format!("Session task failed: {}", e)))?
        .map_err(GatewayError::from)
}

pub async fn create_session(
    State(service): State<AppState>,
) -> Result<(StatusCode, Json<Session>), GatewayError> {
    let session = blocking(service, |s| s.create_session()).await?;
    METRICS.sessions_created_total.inc();

    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_session(
    State(service): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<Session>, GatewayError> {
    let session = blocking(service, move |s| s.get_session(&id)).await?;
    Ok(Json(session))
}

pub async fn list_players(
    State(service): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<Vec<Player>>, GatewayError> {
    let players = blocking(service, move |s| s.list_players(&id)).await?;
    Ok(Json(players))
}

pub async fn add_player(
    State(service): State<AppState>,
    Path(id): Path<SessionId>,
    payload: Result<Json<AddPlayerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Player>), GatewayError> {
    let Json(request) = payload?;

    let new_player = NewPlayer {
        name: request.name,
        buy_in_amount: request.buy_in_amount,
        final_amount: Some(request.final_amount),
        payment_handle: Some(request.payment_handle),
    };
    let player = blocking(service, move |s| s.add_player(&id, new_player)).await?;
    METRICS.players_added_total.inc();

    Ok((StatusCode::CREATED, Json(player)))
}

pub async fn update_player(
    State(service): State<AppState>,
    Path((id, index)): Path<(SessionId, usize)>,
    payload: Result<Json<PlayerUpdate>, JsonRejection>,
) -> Result<Json<Player>, GatewayError> {
    let Json(update) = payload?;
    let player = blocking(service, move |s| s.update_player(&id, index, update)).await?;
    Ok(Json(player))
}

pub async fn settle(
    State(service): State<AppState>,
    Path(id): Path<SessionId>,
    payload: Result<Json<SettleRequest>, JsonRejection>,
) -> Result<Json<SettleResponse>, GatewayError> {
    let Json(request) = payload?;
    let margin_of_error = request.margin_of_error.unwrap_or(Decimal::ZERO);

    let start = Instant::now();
    let result = blocking(service, move |s| s.settle(&id, margin_of_error)).await;
    METRICS
        .settlement_duration_seconds
        .observe(start.elapsed().as_secs_f64());

    let transactions = result.map_err(|e| {
        METRICS.settlement_failures_total.inc();
        e
    })?;
    METRICS.settlements_total.inc();
    METRICS
        .settlement_transactions_total
        .inc_by(transactions.len() as f64);

    Ok(Json(SettleResponse { transactions }))
}

pub async fn execute_settlement(
    State(service): State<AppState>,
    Path(id): Path<SessionId>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>, GatewayError> {
    let Json(request) = payload?;

    let session_id = id.clone();
    let (transaction, links) = blocking(service, move |s| {
        s.payment_links(&session_id, &request.transaction)
    })
    .await?;
    METRICS.payment_links_total.inc();

    tracing::info!(
        session_id = %id,
        from = %transaction.from,
        to = %transaction.to,
        is_request = links.is_request,
        "Payment links issued"
    );

    Ok(Json(ExecuteResponse { transaction, links }))
}

pub async fn complete(
    State(service): State<AppState>,
    Path(id): Path<SessionId>,
    payload: Result<Json<CompleteRequest>, JsonRejection>,
) -> Result<Json<Session>, GatewayError> {
    let Json(request) = payload?;
    let date = request.date.unwrap_or_else(|| Utc::now().date_naive());

    let session = blocking(service, move |s| s.complete(&id, date)).await?;
    METRICS.sessions_completed_total.inc();

    Ok(Json(session))
}
