//! Training sign-up rules shared by the bot and the web API.
//!
//! Checks run in a fixed order so that every caller reports the same reason
//! for a refused registration.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::database::models::{ClubUser, TrainingDistance, TrainingEvent, TrainingRegistration};
use crate::utils::logging::log_database_operation;

#[derive(Debug, Clone)]
pub enum RegistrationOutcome {
    /// Unknown member, training, or a distance of another training.
    NotFound,
    Cancelled,
    AlreadyPast,
    AlreadyRegistered,
    /// The training offers several distances and none was chosen.
    ChooseDistance {
        training: TrainingEvent,
        distances: Vec<TrainingDistance>,
    },
    NoDistances,
    Full,
    Registered {
        registration: TrainingRegistration,
        training: TrainingEvent,
        distance: TrainingDistance,
        participant: ClubUser,
    },
}

impl RegistrationOutcome {
    /// Whether a distance-choice prompt that led here has served its purpose.
    /// On a refusal the prompt stays so another distance can be picked.
    pub fn closes_distance_choice(&self) -> bool {
        matches!(self, RegistrationOutcome::Registered { .. })
    }
}

#[derive(Debug, Clone)]
pub enum UnregisterOutcome {
    Unregistered {
        training: TrainingEvent,
        participant: ClubUser,
    },
    NotRegistered,
    NotFound,
}

/// A distance accepts registrations until `max_participants` is reached; `0` never fills.
pub fn is_distance_full(distance: &TrainingDistance, registrations: i64) -> bool {
    distance.max_participants != 0 && registrations >= distance.max_participants
}

pub async fn register(
    pool: &SqlitePool,
    training_id: i64,
    telegram_id: i64,
    distance_id: Option<i64>,
) -> Result<RegistrationOutcome, sqlx::Error> {
    register_at(pool, training_id, telegram_id, distance_id, Utc::now()).await
}

pub async fn register_at(
    pool: &SqlitePool,
    training_id: i64,
    telegram_id: i64,
    distance_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<RegistrationOutcome, sqlx::Error> {
    let Some(participant) = ClubUser::find_by_telegram_id(pool, telegram_id).await? else {
        return Ok(RegistrationOutcome::NotFound);
    };
    let Some(training) = TrainingEvent::find_by_id(pool, training_id).await? else {
        return Ok(RegistrationOutcome::NotFound);
    };

    if training.is_cancelled {
        return Ok(RegistrationOutcome::Cancelled);
    }
    if training.is_past_at(now) {
        return Ok(RegistrationOutcome::AlreadyPast);
    }
    if TrainingRegistration::find(pool, training.id, participant.id).await?.is_some() {
        return Ok(RegistrationOutcome::AlreadyRegistered);
    }

    let distance = match distance_id {
        Some(distance_id) => match TrainingDistance::find(pool, training.id, distance_id).await? {
            Some(distance) => distance,
            None => return Ok(RegistrationOutcome::NotFound),
        },
        None => {
            let mut distances = TrainingDistance::for_training(pool, training.id).await?;
            if distances.len() > 1 {
                return Ok(RegistrationOutcome::ChooseDistance { training, distances });
            }
            match distances.pop() {
                Some(distance) => distance,
                None => return Ok(RegistrationOutcome::NoDistances),
            }
        }
    };

    let created = TrainingRegistration::create_within_capacity(pool, training.id, participant.id, distance.id).await;
    let registration = match created {
        Ok(Some(registration)) => registration,
        Ok(None) => return Ok(RegistrationOutcome::Full),
        // A concurrent request won the race for the unique (training, participant) pair.
        Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE") => {
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }
        Err(e) => return Err(e),
    };

    log_database_operation(
        "INSERT",
        "training_registrations",
        Some(&format!(
            "member {} on training {} distance {}",
            participant.telegram_id, training.id, distance.distance
        )),
    );

    Ok(RegistrationOutcome::Registered {
        registration,
        training,
        distance,
        participant,
    })
}

/// Moves an existing registration to another distance of the same training.
pub async fn change_distance(
    pool: &SqlitePool,
    training_id: i64,
    telegram_id: i64,
    distance_id: i64,
) -> Result<RegistrationOutcome, sqlx::Error> {
    let Some(participant) = ClubUser::find_by_telegram_id(pool, telegram_id).await? else {
        return Ok(RegistrationOutcome::NotFound);
    };
    let Some(training) = TrainingEvent::find_by_id(pool, training_id).await? else {
        return Ok(RegistrationOutcome::NotFound);
    };
    if training.is_cancelled {
        return Ok(RegistrationOutcome::Cancelled);
    }
    if training.is_past() {
        return Ok(RegistrationOutcome::AlreadyPast);
    }

    let Some(mut registration) = TrainingRegistration::find(pool, training.id, participant.id).await? else {
        return Ok(RegistrationOutcome::NotFound);
    };
    let Some(distance) = TrainingDistance::find(pool, training.id, distance_id).await? else {
        return Ok(RegistrationOutcome::NotFound);
    };

    if registration.distance_id != distance.id {
        if !TrainingRegistration::update_distance(pool, registration.id, distance.id).await? {
            return Ok(RegistrationOutcome::Full);
        }
        registration.distance_id = distance.id;
        log_database_operation(
            "UPDATE",
            "training_registrations",
            Some(&format!("registration {} moved to distance {}", registration.id, distance.id)),
        );
    }

    Ok(RegistrationOutcome::Registered {
        registration,
        training,
        distance,
        participant,
    })
}

pub async fn unregister(
    pool: &SqlitePool,
    training_id: i64,
    telegram_id: i64,
) -> Result<UnregisterOutcome, sqlx::Error> {
    let Some(participant) = ClubUser::find_by_telegram_id(pool, telegram_id).await? else {
        return Ok(UnregisterOutcome::NotFound);
    };
    let Some(training) = TrainingEvent::find_by_id(pool, training_id).await? else {
        return Ok(UnregisterOutcome::NotFound);
    };

    if TrainingRegistration::delete(pool, training.id, participant.id).await? {
        log_database_operation(
            "DELETE",
            "training_registrations",
            Some(&format!("member {} left training {}", participant.telegram_id, training.id)),
        );
        Ok(UnregisterOutcome::Unregistered { training, participant })
    } else {
        Ok(UnregisterOutcome::NotRegistered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(max_participants: i64) -> TrainingDistance {
        TrainingDistance {
            id: 1,
            training_id: 1,
            distance: 5.0,
            pace_min: None,
            pace_max: None,
            max_participants,
            route_gpx: None,
            route_length_km: None,
            route_markers: None,
            route_status: "pending".to_string(),
        }
    }

    #[test]
    fn test_unlimited_distance_never_fills() {
        assert!(!is_distance_full(&distance(0), 1_000));
    }

    #[test]
    fn test_distance_fills_at_limit() {
        assert!(!is_distance_full(&distance(3), 2));
        assert!(is_distance_full(&distance(3), 3));
    }
}
