//! # Quiz Client
//!
//! Client for a multiple-choice quiz platform: session handling against the
//! platform's REST API, taking and scoring tests, and authoring new ones.
//!
//! ## Features
//!
//! - **Sessions**: login and registration with a memory-only access token
//!   and a persisted refresh token
//! - **Transparent refresh**: a rejected request refreshes the session and
//!   is replayed once
//! - **Test engine**: strict and loose answering modes with exact-set scoring
//! - **Authoring**: a two-step wizard whose draft survives restarts
//! - **Listings**: home page, filtered search, profile and results
//!
//! ## Architecture
//!
//! ```text
//! CLI → TestEngine / QuestionAuthoringFlow → QuizApi → AuthenticatedClient → Quiz API (HTTP)
//!                                                              ↓
//!                                                   TokenStore → SQLite (client state)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use quiz_client::{AppState, Config};
//! use quiz_client::auth::Credentials;
//! use quiz_client::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let state = AppState::new(config, storage)?;
//!
//!     state.session.login(&Credentials::new("ann@example.com", "secret")).await?;
//!
//!     let mut engine = state.engine();
//!     engine.load("42").await?;
//!     engine.select("0", "0_1");
//!     let card = engine.submit().await?;
//!     println!("scored {}%", card.score);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Typed client for the quiz platform's endpoints.
pub mod api;
/// Token storage, session lifecycle and authenticated requests.
pub mod auth;
/// Two-step test authoring wizard.
pub mod authoring;
/// Command-line interface.
pub mod cli;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Test-taking state machine and scoring.
pub mod engine;
/// Shared application state.
pub mod state;
/// SQLite storage layer for client state.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
