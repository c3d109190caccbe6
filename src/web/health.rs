//! Health checks for the process supervisor.

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::AppState;
use crate::database::models::ClubUser;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: DatabaseHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub status: String,
    pub pool_size: u32,
    pub response_time_ms: u64,
    pub active_members: i64,
}

/// Full report; 503 when the club database cannot be queried.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    let started = Instant::now();
    let active_members = ClubUser::count_active(&state.db.pool).await.map_err(|e| {
        warn!("Health check failed, database unreachable: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: (Utc::now() - state.start_time).num_seconds().max(0) as u64,
        database: DatabaseHealth {
            status: "healthy".to_string(),
            pool_size: state.db.pool.size(),
            response_time_ms: started.elapsed().as_millis() as u64,
            active_members,
        },
    }))
}

pub async fn readiness_check(State(state): State<AppState>) -> Result<Json<&'static str>, StatusCode> {
    state
        .db
        .ping()
        .await
        .map(|()| Json("ready"))
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

pub async fn liveness_check() -> Json<&'static str> {
    Json("alive")
}
