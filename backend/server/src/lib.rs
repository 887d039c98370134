//! Documentation of a Q&A platform where users ask, answer, vote and earn badges.
//!
//!
//!
//! # General Infrastructure
//! - Frontend talks JSON to this server only
//! - Identity is delegated to a third-party provider, we receive its user ids as-is
//! - Server talks to a single Redis instance using internal container names
//! - Vote and badge rules live in the `tally` crate, this crate only moves data in and out of Redis
//!
//!
//!
//! # Votes
//!
//! **Goal**: A user is never both an upvoter and a downvoter of the same subject.
//!
//! - Reject unknown subjects and unknown voters
//! - Read both vote sets of the subject
//! - Resolve the ballot in memory (cast, retract or switch)
//! - Write the resulting `SREM`/`SADD` pair back inside one `MULTI`
//! - Every add also removes the user from the opposite set, so even racing requests from the
//!   same user cannot leave them in both
//!
//!
//!
//! # Badges
//!
//! Counts are derived from live activity (questions, answers, upvotes received, views) against a
//! criteria table loaded once at start. A criterion missing from the table is skipped by default.
//! Set `BADGE_POLICY=strict` to turn it into an error instead.
//!
//!
//!
//! # Routes
//!
//! | Method | Path                        | Purpose                        |
//! |--------|-----------------------------|--------------------------------|
//! | POST   | `/users`                    | create profile                 |
//! | GET    | `/users`                    | search/list profiles           |
//! | GET    | `/users/{id}`               | profile with totals and badges |
//! | PATCH  | `/users/{id}`               | edit name, username, bio, pic  |
//! | DELETE | `/users/{id}`               | remove profile, posts, ballots |
//! | GET    | `/users/{id}/questions`     | questions asked                |
//! | GET    | `/users/{id}/answers`       | answers given                  |
//! | GET    | `/users/{id}/saved`         | saved questions                |
//! | POST   | `/users/{id}/saved`         | toggle a saved question        |
//! | GET    | `/users/{id}/badges`        | badge counts                   |
//! | POST   | `/questions`                | ask                            |
//! | GET    | `/questions`                | search/list                    |
//! | GET    | `/questions/hot`            | top 5 by views then upvotes    |
//! | GET    | `/questions/{id}`           | detail, counts a view          |
//! | PATCH  | `/questions/{id}`           | edit title and content         |
//! | DELETE | `/questions/{id}`           | remove with answers            |
//! | POST   | `/questions/{id}/votes`     | vote                           |
//! | POST   | `/questions/{id}/answers`   | answer                         |
//! | GET    | `/questions/{id}/answers`   | list answers                   |
//! | POST   | `/answers/{id}/votes`       | vote on an answer              |
//! | GET    | `/tags`                     | tags by popularity             |
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run locally.
//! ```sh
//! REDIS_URL=redis://127.0.0.1:6379 RUST_LOG=info cargo run -p overflow
//! ```
//!
//! ## Environment
//! - `RUST_PORT`: listen port, default 1111
//! - `REDIS_URL`: default `redis://127.0.0.1:6379`
//! - `BADGE_POLICY`: `skip` or `strict`, default `skip`
//! - `BADGE_CRITERIA_PATH`: optional JSON criteria table
//! - `/run/secrets/REDIS_PASSWORD`: optional Redis password
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod answers;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod questions;
pub mod routes;
pub mod state;
pub mod tags;
pub mod users;
pub mod utils;

use routes::*;
use state::AppState;

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await?;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/users", post(create_user_handler).get(list_users_handler))
        .route(
            "/users/{id}",
            get(user_handler)
                .patch(edit_user_handler)
                .delete(delete_user_handler),
        )
        .route("/users/{id}/questions", get(user_questions_handler))
        .route("/users/{id}/answers", get(user_answers_handler))
        .route(
            "/users/{id}/saved",
            get(saved_questions_handler).post(toggle_saved_handler),
        )
        .route("/users/{id}/badges", get(badges_handler))
        .route(
            "/questions",
            post(create_question_handler).get(list_questions_handler),
        )
        .route("/questions/hot", get(hot_questions_handler))
        .route(
            "/questions/{id}",
            get(question_handler)
                .patch(edit_question_handler)
                .delete(delete_question_handler),
        )
        .route("/questions/{id}/votes", post(question_votes_handler))
        .route(
            "/questions/{id}/answers",
            post(create_answer_handler).get(list_answers_handler),
        )
        .route("/answers/{id}/votes", post(answer_votes_handler))
        .route("/tags", get(tags_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
