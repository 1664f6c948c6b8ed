// Shared helpers for driving the router in-process

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use poll_kiosk::config::{Config, SharedConfig};
use poll_kiosk::db::Database;
use poll_kiosk::models::Poll;
use poll_kiosk::{router, AppState};
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "changeme";

pub struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
    pub config_path: PathBuf,
    pub database_url: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        let config = Config {
            admin_username: ADMIN_USER.to_string(),
            admin_password: ADMIN_PASSWORD.to_string(),
            current_poll_id: None,
        };
        config.save(&config_path).await.unwrap();

        let database_url = format!("sqlite:{}", dir.path().join("data").join("polls.db").display());
        let state = build_state(&config_path, &database_url).await;

        Self {
            dir,
            state,
            config_path,
            database_url,
        }
    }

    /// A fresh app over the same config file and database, as after a restart.
    pub async fn restart(&self) -> AppState {
        build_state(&self.config_path, &self.database_url).await
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    // Create a poll directly in the database
    pub async fn seed_poll(&self, question: &str, options: &[&str]) -> Poll {
        let labels: Vec<String> = options.iter().map(|s| s.to_string()).collect();
        let poll_id = self.state.database.create_poll(question, &labels).await.unwrap();
        self.poll(poll_id).await
    }

    pub async fn poll(&self, poll_id: i64) -> Poll {
        self.state.database.get_poll(poll_id).await.unwrap().unwrap()
    }

    pub async fn make_current(&self, poll_id: i64) {
        self.state.config.set_current_poll(Some(poll_id)).await.unwrap();
    }
}

async fn build_state(config_path: &PathBuf, database_url: &str) -> AppState {
    let config = Config::load(config_path).unwrap();
    let database = Database::connect(database_url).await.unwrap();
    AppState::new(database, SharedConfig::new(config_path, config))
}

pub fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

pub fn admin_auth() -> String {
    basic_auth(ADMIN_USER, ADMIN_PASSWORD)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn admin_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, admin_auth())
        .body(Body::empty())
        .unwrap()
}

pub fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn admin_post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::AUTHORIZATION, admin_auth())
        .body(Body::from(body.to_string()))
        .unwrap()
}

// Empty-bodied admin POST such as /admin/poll/{id}/close
pub fn admin_action(poll_id: i64, action: &str) -> Request<Body> {
    admin_post_form(&format!("/admin/poll/{poll_id}/{action}"), "")
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn vote_form(poll_id: i64, option_id: i64) -> Request<Body> {
    post_form("/vote", &format!("poll_id={poll_id}&option_id={option_id}"))
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}
