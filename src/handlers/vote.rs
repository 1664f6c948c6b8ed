use crate::db::DbError;
use crate::handlers::{client_addr, AppError, AppState, HtmlForm};
use crate::views;
use crate::voting::calculate_results;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::{Html, Redirect};
use log::info;
use serde::Deserialize;
use std::net::SocketAddr;

// Longest respondent tag a kiosk may attach to a vote
const MAX_SESSION_ID_LEN: usize = 128;

#[derive(Debug, Deserialize)]
pub struct VoteForm {
    pub poll_id: i64,
    pub option_id: i64,
    #[serde(default)]
    pub session_id: Option<String>,
}

// Kiosk front page: the current poll, or a placeholder
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let current_poll_id = state.config.current_poll_id().await;
    let Some(poll) = state.database.get_current_poll(current_poll_id).await? else {
        return Ok(Html(views::no_poll_page()));
    };

    let results = calculate_results(&poll);
    Ok(Html(views::poll_page(&poll, &results)))
}

pub async fn submit_vote(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    HtmlForm(form): HtmlForm<VoteForm>,
) -> Result<Redirect, AppError> {
    let client = client_addr(&headers, connect_info);
    record_vote(
        &state,
        form.poll_id,
        form.option_id,
        client.as_deref(),
        form.session_id.as_deref(),
    )
    .await?;
    Ok(Redirect::to("/thanks"))
}

pub async fn thanks() -> Html<String> {
    Html(views::thanks_page())
}

/// Validate a vote against the current poll and store it.
///
/// Only the poll currently on the kiosk accepts votes, and the option must
/// belong to it.
pub(crate) async fn record_vote(
    state: &AppState,
    poll_id: i64,
    option_id: i64,
    client: Option<&str>,
    session_id: Option<&str>,
) -> Result<(), AppError> {
    let session_id = session_tag(session_id)?;
    let poll = state
        .database
        .get_poll(poll_id)
        .await?
        .ok_or(DbError::PollNotFound(poll_id))?;

    if state.config.current_poll_id().await != Some(poll_id) {
        return Err(AppError::PollNotCurrent);
    }
    if poll.option(option_id).is_none() {
        return Err(DbError::OptionNotFound(option_id).into());
    }
    if !poll.is_active {
        return Err(DbError::PollClosed(poll_id).into());
    }

    state.database.cast_vote(option_id, client, session_id).await?;
    info!("Vote recorded for poll {} option {}", poll_id, option_id);
    Ok(())
}

// Blank tags mean an anonymous vote
fn session_tag(raw: Option<&str>) -> Result<Option<&str>, AppError> {
    match raw.map(str::trim).filter(|tag| !tag.is_empty()) {
        Some(tag) if tag.chars().count() > MAX_SESSION_ID_LEN => Err(AppError::BadRequest(
            format!("Session id is longer than {MAX_SESSION_ID_LEN} characters"),
        )),
        tag => Ok(tag),
    }
}
