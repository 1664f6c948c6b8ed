//! Kiosk polling app: a public page that shows the current poll and takes
//! votes, plus a Basic-auth protected back-office to manage polls.

pub mod config;
pub mod db;
pub mod export;
pub mod handlers;
pub mod models;
pub mod views;
pub mod voting;

pub use handlers::{router, AppState};
