use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::database::models::{MonoBankCard, MonoBankClient};
use crate::services::monobank::{self, current_month_range, MonobankApi, StatementEntry, WebhookPayload};
use crate::utils::datetime::local_today;
use crate::utils::logging::log_external_error;

#[derive(Debug, Serialize, Deserialize)]
pub struct CardItem {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CardsResponse {
    pub cards: Vec<CardItem>,
}

#[derive(Debug, Deserialize)]
pub struct StatementQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatementResponse {
    pub card_id: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub statements: Vec<StatementEntry>,
}

/// Monobank checks the webhook URL with a GET before saving it.
pub async fn webhook_verification() -> StatusCode {
    StatusCode::OK
}

pub async fn monobank_webhook(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Malformed Monobank webhook body: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    tracing::info!(
        "Monobank webhook {} for account {}",
        payload.kind,
        payload.account().unwrap_or("-")
    );

    // Monobank expects a fast answer; delivery happens in the background.
    tokio::spawn(async move {
        let result = monobank::notify_transaction(
            &state.bot,
            &state.db.pool,
            &state.config.admins,
            state.config.time_zone,
            &payload,
        )
        .await;
        match result {
            Ok(delivered) => tracing::info!("Transaction notification delivered {} time(s)", delivered),
            Err(e) => tracing::error!("Failed to process Monobank webhook: {}", e),
        }
    });

    StatusCode::OK
}

pub async fn get_cards(State(state): State<AppState>, Path(client_id): Path<i64>) -> Response {
    let client = match MonoBankClient::find_by_id(&state.db.pool, client_id).await {
        Ok(Some(client)) => client,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, Json(CardsResponse { cards: Vec::new() })).into_response();
        }
        Err(e) => return ApiError::from(e).into_response(),
    };

    match MonobankApi::new(&client.client_token).credit_card_ids().await {
        Ok(cards) => Json(CardsResponse {
            cards: cards
                .into_iter()
                .map(|(id, name)| CardItem { id, name })
                .collect(),
        })
        .into_response(),
        Err(e) => {
            log_external_error("monobank", "client_info", &e.to_string());
            Json(CardsResponse { cards: Vec::new() }).into_response()
        }
    }
}

fn parse_query_date(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{field} must be YYYY-MM-DD"))),
        None => Ok(None),
    }
}

pub async fn statements(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
    Query(query): Query<StatementQuery>,
) -> Result<Json<StatementResponse>, ApiError> {
    let tz = state.config.time_zone;
    let (default_from, default_to) = current_month_range(local_today(tz));
    let date_from = parse_query_date(query.date_from.as_deref(), "date_from")?.unwrap_or(default_from);
    let date_to = parse_query_date(query.date_to.as_deref(), "date_to")?.unwrap_or(default_to);
    if date_from > date_to {
        return Err(ApiError::BadRequest("date_from is after date_to".to_string()));
    }

    let (card, client) = MonoBankCard::with_client(&state.db.pool, &card_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Card not found".to_string()))?;

    let items = MonobankApi::new(&client.client_token)
        .statements_between(&card.card_id, date_from, date_to, tz)
        .await
        .map_err(|e| {
            log_external_error("monobank", "statement", &e.to_string());
            ApiError::Internal(format!("Monobank request failed: {e}"))
        })?;

    Ok(Json(StatementResponse {
        card_id: card.card_id,
        date_from,
        date_to,
        statements: items.iter().map(|item| StatementEntry::from_item(item, tz)).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_date() {
        assert_eq!(
            parse_query_date(Some("2024-03-01"), "date_from").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(parse_query_date(Some("  "), "date_from").unwrap(), None);
        assert!(parse_query_date(Some("01.03.2024"), "date_from").is_err());
    }
}
