use crate::db::DbError;
use crate::export;
use crate::handlers::{AppError, AppState, HtmlForm};
use crate::models::parse_option_labels;
use crate::views;
use crate::voting::calculate_results;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Redirect, Response};
use log::{error, info};
use serde::Deserialize;

// How many votes the poll detail page lists
pub(crate) const RECENT_VOTES_SHOWN: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct PollForm {
    pub question: String,
    pub options: String,
    #[serde(default)]
    pub activate: Option<String>,
}

impl PollForm {
    fn validate(&self) -> Result<(String, Vec<String>), AppError> {
        let question = self.question.trim();
        match parse_option_labels(&self.options) {
            Some(options) if !question.is_empty() => Ok((question.to_string(), options)),
            _ => Err(AppError::BadRequest(
                "A poll needs a question and at least two options".to_string(),
            )),
        }
    }
}

pub async fn admin_panel(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let polls = state.database.list_polls().await?;
    let current_poll_id = state.config.current_poll_id().await;
    Ok(Html(views::admin_page(&polls, current_poll_id)))
}

pub async fn create_poll(
    State(state): State<AppState>,
    HtmlForm(form): HtmlForm<PollForm>,
) -> Result<Redirect, AppError> {
    let (question, options) = form.validate()?;
    let poll_id = state.database.create_poll(&question, &options).await?;
    info!("Created poll {} with {} options", poll_id, options.len());

    // The poll is already stored; the panel shows it as not current
    if form.activate.is_some() {
        match state.config.set_current_poll(Some(poll_id)).await {
            Ok(()) => info!("Poll {} is now shown on the kiosk", poll_id),
            Err(e) => error!("Created poll {} but could not show it on the kiosk: {}", poll_id, e),
        }
    }

    Ok(Redirect::to("/admin"))
}

pub async fn poll_detail(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
) -> Result<Html<String>, AppError> {
    let poll = state
        .database
        .get_poll(poll_id)
        .await?
        .ok_or(DbError::PollNotFound(poll_id))?;
    let stats = state.database.get_poll_stats(poll_id, RECENT_VOTES_SHOWN).await?;
    let results = calculate_results(&poll);
    let is_current = state.config.current_poll_id().await == Some(poll_id);

    Ok(Html(views::poll_detail_page(&poll, &results, &stats, is_current)))
}

pub async fn update_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
    HtmlForm(form): HtmlForm<PollForm>,
) -> Result<Redirect, AppError> {
    let (question, options) = form.validate()?;
    state.database.update_poll(poll_id, &question, &options).await?;
    info!("Updated poll {}", poll_id);
    Ok(Redirect::to(&format!("/admin/poll/{poll_id}")))
}

// One CSV row per respondent
pub async fn export_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
) -> Result<Response, AppError> {
    let poll = state
        .database
        .get_poll(poll_id)
        .await?
        .ok_or(DbError::PollNotFound(poll_id))?;
    let rows = state.database.respondent_rows(poll_id).await?;
    let body = export::poll_csv(&poll, &rows)?;
    info!("Exported {} respondents of poll {}", rows.len(), poll_id);

    let disposition = format!("attachment; filename=\"{}\"", export::file_name(&poll));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn select_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
) -> Result<Redirect, AppError> {
    if state.database.get_poll(poll_id).await?.is_none() {
        return Err(DbError::PollNotFound(poll_id).into());
    }

    state.config.set_current_poll(Some(poll_id)).await?;
    info!("Poll {} is now shown on the kiosk", poll_id);
    Ok(Redirect::to("/admin"))
}

pub async fn clear_current(State(state): State<AppState>) -> Result<Redirect, AppError> {
    state.config.set_current_poll(None).await?;
    info!("Kiosk no longer shows a poll");
    Ok(Redirect::to("/admin"))
}

pub async fn close_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
) -> Result<Redirect, AppError> {
    state.database.close_poll(poll_id).await?;
    info!("Closed poll {}", poll_id);
    Ok(Redirect::to("/admin"))
}

pub async fn reopen_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
) -> Result<Redirect, AppError> {
    state.database.reopen_poll(poll_id).await?;
    info!("Reopened poll {}", poll_id);
    Ok(Redirect::to("/admin"))
}

pub async fn reset_votes(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
) -> Result<Redirect, AppError> {
    let deleted = state.database.reset_votes(poll_id).await?;
    info!("Reset poll {}: {} votes removed", poll_id, deleted);
    Ok(Redirect::to(&format!("/admin/poll/{poll_id}")))
}

pub async fn delete_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
) -> Result<Redirect, AppError> {
    if state.config.current_poll_id().await == Some(poll_id) {
        return Err(AppError::CurrentPollLocked);
    }

    state.database.delete_poll(poll_id).await?;
    info!("Deleted poll {}", poll_id);
    Ok(Redirect::to("/admin"))
}
