use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::database::models::{
    ClubStatistics, ClubUser, TrainingComment, TrainingDistance, TrainingEvent, TrainingFilter,
    TrainingRating, TrainingRegistration, TrainingStatus, TrainingSummary,
};
use crate::bot::dialogue::comment::MAX_COMMENT_CHARS;
use crate::services::registration::{self, RegistrationOutcome, UnregisterOutcome};
use crate::utils::validation::validate_rating;

#[derive(Debug, Default, Deserialize)]
pub struct TrainingListQuery {
    pub status: Option<TrainingStatus>,
    pub search: Option<String>,
    pub location: Option<String>,
    pub organizer: Option<String>,
    pub distance: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl TrainingListQuery {
    pub fn into_filter(self) -> Result<TrainingFilter, ApiError> {
        let distance = match self.distance.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => Some(
                raw.replace(',', ".")
                    .parse::<f64>()
                    .map_err(|_| ApiError::BadRequest("distance must be a number".to_string()))?,
            ),
            None => None,
        };

        Ok(TrainingFilter {
            status: self.status.unwrap_or_default(),
            search: self.search,
            location: self.location,
            organizer: self.organizer,
            distance,
            date_from: parse_date_param(self.date_from.as_deref(), "date_from")?,
            date_to: parse_date_param(self.date_to.as_deref(), "date_to")?,
        })
    }
}

fn parse_date_param(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>, ApiError> {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("{field} must be YYYY-MM-DD")))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingListResponse {
    pub count: usize,
    pub trainings: Vec<TrainingSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DistanceDetail {
    #[serde(flatten)]
    pub distance: TrainingDistance,
    pub participants_count: i64,
    pub is_full: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingDetail {
    pub training: TrainingEvent,
    pub distances: Vec<DistanceDetail>,
    pub participants_count: i64,
    pub average_rating: Option<f64>,
    pub comments: Vec<TrainingComment>,
    pub is_past: bool,
    pub is_soon: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub telegram_id: i64,
    pub distance_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct MemberRequest {
    pub telegram_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub telegram_id: i64,
    pub rating: i64,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub telegram_id: i64,
    pub comment: String,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<TrainingRegistration>,
}

impl ActionResponse {
    fn new(status: &str, message: &str) -> Self {
        Self {
            status: status.to_string(),
            message: message.to_string(),
            registration: None,
        }
    }
}

pub async fn list_trainings(
    State(state): State<AppState>,
    Query(query): Query<TrainingListQuery>,
) -> Result<Json<TrainingListResponse>, ApiError> {
    let filter = query.into_filter()?;
    let trainings = TrainingEvent::list(&state.db.pool, &filter, state.config.time_zone).await?;
    let trainings = TrainingSummary::build(&state.db.pool, trainings).await?;

    Ok(Json(TrainingListResponse {
        count: trainings.len(),
        trainings,
    }))
}

pub async fn training_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TrainingDetail>, ApiError> {
    let pool = &state.db.pool;
    let training = find_training(&state, id).await?;

    let mut distances = Vec::new();
    for distance in TrainingDistance::for_training(pool, training.id).await? {
        let participants_count = distance.registrations_count(pool).await?;
        distances.push(DistanceDetail {
            is_full: registration::is_distance_full(&distance, participants_count),
            participants_count,
            distance,
        });
    }

    Ok(Json(TrainingDetail {
        participants_count: training.participant_count(pool).await?,
        average_rating: TrainingRating::average(pool, training.id).await?,
        comments: TrainingComment::public_for(pool, training.id).await?,
        is_past: training.is_past(),
        is_soon: training.is_soon(),
        distances,
        training,
    }))
}

pub async fn register(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let pool = &state.db.pool;
    let outcome = registration::register(pool, id, body.telegram_id, Some(body.distance_id)).await?;

    let (status, message, outcome) = match outcome {
        RegistrationOutcome::AlreadyRegistered => {
            let existing = find_registration(&state, id, body.telegram_id).await?;
            if existing.as_ref().map(|r| r.distance_id) == Some(body.distance_id) {
                return Ok(Json(ActionResponse::new(
                    "already_registered",
                    "Ви вже зареєстровані на це тренування",
                )));
            }
            let changed = registration::change_distance(pool, id, body.telegram_id, body.distance_id).await?;
            ("updated", "Вашу реєстрацію оновлено".to_string(), changed)
        }
        other => {
            let message = match &other {
                RegistrationOutcome::Registered { training, .. } => {
                    format!("Ви успішно зареєструвалися на тренування \"{}\"", training.title)
                }
                _ => String::new(),
            };
            ("registered", message, other)
        }
    };

    match outcome {
        RegistrationOutcome::Registered { registration, .. } => Ok(Json(ActionResponse {
            status: status.to_string(),
            message,
            registration: Some(registration),
        })),
        RegistrationOutcome::NotFound => Err(ApiError::NotFound(
            "Тренування, дистанцію або профіль не знайдено".to_string(),
        )),
        RegistrationOutcome::Cancelled | RegistrationOutcome::AlreadyPast => Err(ApiError::BadRequest(
            "Неможливо зареєструватися на це тренування".to_string(),
        )),
        RegistrationOutcome::Full => Err(ApiError::Conflict(
            "На цій дистанції вже немає вільних місць".to_string(),
        )),
        RegistrationOutcome::AlreadyRegistered => Err(ApiError::Conflict(
            "Ви вже зареєстровані на це тренування".to_string(),
        )),
        RegistrationOutcome::ChooseDistance { .. } | RegistrationOutcome::NoDistances => Err(
            ApiError::BadRequest("Будь ласка, оберіть дистанцію".to_string()),
        ),
    }
}

pub async fn unregister(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<MemberRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    match registration::unregister(&state.db.pool, id, body.telegram_id).await? {
        UnregisterOutcome::Unregistered { .. } => {
            Ok(Json(ActionResponse::new("unregistered", "Вашу реєстрацію скасовано")))
        }
        UnregisterOutcome::NotRegistered => Err(ApiError::BadRequest(
            "Ви не зареєстровані на це тренування".to_string(),
        )),
        UnregisterOutcome::NotFound => Err(ApiError::NotFound(
            "Тренування або профіль не знайдено".to_string(),
        )),
    }
}

pub async fn rate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<RateRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let rating = validate_rating(body.rating).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let (training, member) = past_training_and_member(&state, id, body.telegram_id, "оцінювати").await?;

    let existed = TrainingRating::find(&state.db.pool, training.id, member.id).await?.is_some();
    TrainingRating::upsert(&state.db.pool, training.id, member.id, rating).await?;

    let message = if existed { "Вашу оцінку оновлено" } else { "Дякуємо за вашу оцінку!" };
    Ok(Json(ActionResponse::new("rated", message)))
}

pub async fn comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<CommentRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let text = body.comment.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Коментар не може бути порожнім".to_string()));
    }
    if text.chars().count() > MAX_COMMENT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Коментар задовгий, максимум {MAX_COMMENT_CHARS} символів"
        )));
    }
    let (training, member) = past_training_and_member(&state, id, body.telegram_id, "коментувати").await?;

    TrainingComment::create(&state.db.pool, training.id, member.id, text, body.is_public).await?;
    Ok(Json(ActionResponse::new("commented", "Дякуємо за ваш відгук!")))
}

pub async fn statistics(State(state): State<AppState>) -> Result<Json<ClubStatistics>, ApiError> {
    Ok(Json(ClubStatistics::collect(&state.db.pool).await?))
}

async fn find_training(state: &AppState, id: i64) -> Result<TrainingEvent, ApiError> {
    TrainingEvent::find_by_id(&state.db.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Тренування не знайдено".to_string()))
}

async fn find_registration(
    state: &AppState,
    training_id: i64,
    telegram_id: i64,
) -> Result<Option<TrainingRegistration>, ApiError> {
    let Some(member) = ClubUser::find_by_telegram_id(&state.db.pool, telegram_id).await? else {
        return Ok(None);
    };
    Ok(TrainingRegistration::find(&state.db.pool, training_id, member.id).await?)
}

async fn past_training_and_member(
    state: &AppState,
    training_id: i64,
    telegram_id: i64,
    action: &str,
) -> Result<(TrainingEvent, ClubUser), ApiError> {
    let training = find_training(state, training_id).await?;
    if !training.is_past() {
        return Err(ApiError::Forbidden(format!(
            "Ви можете {action} тільки завершені тренування"
        )));
    }
    let member = ClubUser::find_by_telegram_id(&state.db.pool, telegram_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Профіль не знайдено".to_string()))?;
    Ok((training, member))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_filter_accepts_comma() {
        let query = TrainingListQuery {
            distance: Some("21,1".to_string()),
            ..Default::default()
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.distance, Some(21.1));
        assert_eq!(filter.status, TrainingStatus::Upcoming);
    }

    #[test]
    fn test_invalid_dates_are_rejected() {
        let query = TrainingListQuery {
            date_from: Some("2024/01/01".to_string()),
            ..Default::default()
        };
        assert!(query.into_filter().is_err());
    }
}
