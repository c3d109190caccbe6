//! HTTP surface: health checks, Monobank webhook and bank API, trainings API.

pub mod bank;
pub mod health;
pub mod trainings;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use teloxide::Bot;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::database::connection::DatabaseManager;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseManager>,
    pub bot: Bot,
    pub config: Arc<Config>,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: Arc<DatabaseManager>, bot: Bot, config: Arc<Config>) -> Self {
        Self {
            db,
            bot,
            config,
            start_time: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error in API handler: {}", e);
        ApiError::Internal("Database error".to_string())
    }
}

pub fn router(state: AppState) -> Router {
    let webhook_path = state.config.monobank_webhook_path.clone();

    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .route(
            &webhook_path,
            get(bank::webhook_verification).post(bank::monobank_webhook),
        )
        .route("/bank/api/get-cards/:client_id/", get(bank::get_cards))
        .route("/bank/api/statements/:card_id/", get(bank::statements))
        .route("/api/trainings/", get(trainings::list_trainings))
        .route("/api/trainings/:id/", get(trainings::training_detail))
        .route("/api/trainings/:id/register/", post(trainings::register))
        .route("/api/trainings/:id/unregister/", post(trainings::unregister))
        .route("/api/trainings/:id/rate/", post(trainings::rate))
        .route("/api/trainings/:id/comment/", post(trainings::comment))
        .route("/api/statistics/", get(trainings::statistics))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
