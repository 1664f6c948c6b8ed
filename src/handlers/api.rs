// JSON mirror of the kiosk and admin views

use crate::db::DbError;
use crate::handlers::admin::RECENT_VOTES_SHOWN;
use crate::handlers::vote::record_vote;
use crate::handlers::{client_addr, ApiError, ApiJson, AppError, AppState};
use crate::models::{Poll, PollStats};
use crate::voting::{calculate_results, PollResults};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub poll_id: i64,
    pub option_id: i64,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct PollListResponse {
    pub polls: Vec<Poll>,
    pub current_poll_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PollStatsResponse {
    pub poll: Poll,
    pub results: PollResults,
    pub stats: PollStats,
}

pub async fn current_poll(State(state): State<AppState>) -> Result<Json<Poll>, ApiError> {
    let current_poll_id = state.config.current_poll_id().await;
    let poll = state
        .database
        .get_current_poll(current_poll_id)
        .await?
        .ok_or(AppError::NoCurrentPoll)?;
    Ok(Json(poll))
}

pub async fn submit_vote(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let client = client_addr(&headers, connect_info);
    record_vote(
        &state,
        request.poll_id,
        request.option_id,
        client.as_deref(),
        request.session_id.as_deref(),
    )
    .await?;
    Ok(Json(VoteResponse { success: true }))
}

pub async fn list_polls(State(state): State<AppState>) -> Result<Json<PollListResponse>, ApiError> {
    let polls = state.database.list_polls().await?;
    let current_poll_id = state.config.current_poll_id().await;
    Ok(Json(PollListResponse {
        polls,
        current_poll_id,
    }))
}

pub async fn poll_stats(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
) -> Result<Json<PollStatsResponse>, ApiError> {
    let poll = state
        .database
        .get_poll(poll_id)
        .await?
        .ok_or(DbError::PollNotFound(poll_id))?;
    let stats = state.database.get_poll_stats(poll_id, RECENT_VOTES_SHOWN).await?;
    let results = calculate_results(&poll);

    Ok(Json(PollStatsResponse {
        poll,
        results,
        stats,
    }))
}
