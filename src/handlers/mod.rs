mod admin;
mod api;
pub mod auth;
mod vote;

use crate::config::{ConfigError, SharedConfig};
use crate::db::{Database, DbError};
use crate::export::ExportError;
use crate::views;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{ConnectInfo, FromRequest};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use log::{error, warn};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone)]
pub struct AppState {
    pub database: Arc<Database>,
    pub config: Arc<SharedConfig>,
}

impl AppState {
    pub fn new(database: Database, config: SharedConfig) -> Self {
        Self {
            database: Arc::new(database),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    // Everything under here sits behind HTTP Basic auth
    let admin = Router::new()
        .route("/admin", get(admin::admin_panel))
        .route("/admin/poll", post(admin::create_poll))
        .route("/admin/poll/:poll_id", get(admin::poll_detail).post(admin::update_poll))
        .route("/admin/poll/:poll_id/select", post(admin::select_poll))
        .route("/admin/poll/:poll_id/close", post(admin::close_poll))
        .route("/admin/poll/:poll_id/reopen", post(admin::reopen_poll))
        .route("/admin/poll/:poll_id/reset", post(admin::reset_votes))
        .route("/admin/poll/:poll_id/delete", post(admin::delete_poll))
        .route("/admin/poll/:poll_id/export", get(admin::export_poll))
        .route("/admin/current/clear", post(admin::clear_current))
        .route("/api/admin/polls", get(api::list_polls))
        .route("/api/admin/polls/:poll_id/stats", get(api::poll_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin));

    Router::new()
        .route("/", get(vote::index))
        .route("/vote", post(vote::submit_vote))
        .route("/thanks", get(vote::thanks))
        .route("/api/current-poll", get(api::current_poll))
        .route("/api/vote", post(api::submit_vote))
        .merge(admin)
        .with_state(state)
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("There is no active poll right now")]
    NoCurrentPoll,

    #[error("This poll is not open for voting")]
    PollNotCurrent,

    #[error("The poll shown on the kiosk cannot be deleted")]
    CurrentPollLocked,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NoCurrentPoll => StatusCode::NOT_FOUND,
            AppError::PollNotCurrent | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::CurrentPollLocked => StatusCode::CONFLICT,
            AppError::Db(DbError::PollNotFound(_) | DbError::OptionNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::Db(DbError::PollClosed(_) | DbError::PollHasVotes(_)) => StatusCode::CONFLICT,
            AppError::Db(_) | AppError::Config(_) | AppError::Export(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    // Internal failures are logged in full but not shown to visitors
    fn public_message(&self, status: StatusCode) -> String {
        if status.is_server_error() {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), self);
            self.to_string()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.public_message(status);
        (status, Html(views::error_page(status.as_u16(), &message))).into_response()
    }
}

/// Same failures as [`AppError`], rendered as JSON for the `/api` routes.
#[derive(Debug)]
pub struct ApiError(pub AppError);

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let error = self.0.public_message(status);
        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        warn!("Unreadable form submission: {}", rejection.body_text());
        AppError::BadRequest("Invalid request".to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Unreadable JSON body: {}", rejection.body_text());
        Self(AppError::BadRequest("Invalid request".to_string()))
    }
}

/// `axum::Form` that fails with an HTML error page instead of axum's plain text.
#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(AppError))]
pub struct HtmlForm<T>(pub T);

/// `axum::Json` that fails with a JSON `{"error": ...}` body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        Self(err.into())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        Self(err.into())
    }
}

/// Best-effort voter address: the reverse proxy's forwarding headers first,
/// then the peer socket.
pub(crate) fn client_addr(
    headers: &HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|value| value.to_str().ok()))
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match forwarded {
        Some(addr) => Some(addr.to_string()),
        None => connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()),
    }
}
