use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::collections::HashMap;

use crate::utils::datetime::local_day_start;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TrainingEvent {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub location: String,
    /// Telegram file id or local path of the poster image.
    pub poster: Option<String>,
    pub created_by: i64,
    pub is_cancelled: bool,
    pub cancellation_reason: Option<String>,
    pub survey_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TrainingDistance {
    pub id: i64,
    pub training_id: i64,
    /// Kilometres.
    pub distance: f64,
    pub pace_min: Option<String>,
    pub pace_max: Option<String>,
    /// `0` means unlimited.
    pub max_participants: i64,
    pub route_gpx: Option<String>,
    pub route_length_km: Option<f64>,
    /// JSON array of km markers produced by route analysis.
    pub route_markers: Option<String>,
    pub route_status: String,
}

/// Lifecycle of the GPX analysis attached to a distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RouteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Pending => "pending",
            RouteStatus::Processing => "processing",
            RouteStatus::Completed => "completed",
            RouteStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTraining {
    pub title: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub location: String,
    pub poster: Option<String>,
    pub created_by: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDistance {
    pub distance: f64,
    pub max_participants: i64,
    pub pace_min: Option<String>,
    pub pace_max: Option<String>,
    pub route_gpx: Option<String>,
}

/// Which trainings a listing should include.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingStatus {
    #[default]
    Upcoming,
    Past,
    Cancelled,
    Active,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingFilter {
    pub status: TrainingStatus,
    pub search: Option<String>,
    pub location: Option<String>,
    pub organizer: Option<String>,
    pub distance: Option<f64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

const SELECT_TRAINING: &str = "SELECT te.id, te.title, te.slug, te.description, te.date, te.location, te.poster, \
     te.created_by, te.is_cancelled, te.cancellation_reason, te.survey_sent_at, te.created_at, te.updated_at \
     FROM training_events te";

const SELECT_DISTANCE: &str = "SELECT id, training_id, distance, pace_min, pace_max, max_participants, route_gpx, \
     route_length_km, route_markers, route_status FROM training_distances";

impl TrainingEvent {
    /// Inserts the training together with its distances in one transaction.
    pub async fn create_with_distances(
        pool: &sqlx::SqlitePool,
        training: NewTraining,
        distances: &[NewDistance],
    ) -> Result<(Self, Vec<TrainingDistance>), sqlx::Error> {
        let now = Utc::now();
        let slug = slugify(&training.title, training.date);
        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO training_events (title, slug, description, date, location, poster, created_by,
                                         is_cancelled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&training.title)
        .bind(&slug)
        .bind(&training.description)
        .bind(training.date)
        .bind(&training.location)
        .bind(&training.poster)
        .bind(training.created_by)
        .bind(now)
        .bind(now)
        .execute(&mut tx)
        .await?;
        let training_id = result.last_insert_rowid();

        for distance in distances {
            sqlx::query(
                r#"
                INSERT INTO training_distances (training_id, distance, pace_min, pace_max, max_participants,
                                                route_gpx, route_status)
                VALUES (?, ?, ?, ?, ?, ?, 'pending')
                "#,
            )
            .bind(training_id)
            .bind(distance.distance)
            .bind(&distance.pace_min)
            .bind(&distance.pace_max)
            .bind(distance.max_participants)
            .bind(&distance.route_gpx)
            .execute(&mut tx)
            .await?;
        }

        tx.commit().await?;

        let created = Self::find_by_id(pool, training_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        let distances = TrainingDistance::for_training(pool, training_id).await?;
        Ok((created, distances))
    }

    pub async fn find_by_id(
        pool: &sqlx::SqlitePool,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrainingEvent>(&format!("{SELECT_TRAINING} WHERE te.id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn title_exists(pool: &sqlx::SqlitePool, title: &str) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM training_events WHERE title = ?")
            .bind(title)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    /// Future, non-cancelled trainings created by the given member.
    pub async fn upcoming_by_creator(
        pool: &sqlx::SqlitePool,
        creator_id: i64,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrainingEvent>(&format!(
            "{SELECT_TRAINING} WHERE te.created_by = ? AND te.is_cancelled = 0 AND te.date >= ? \
             ORDER BY te.date LIMIT ?"
        ))
        .bind(creator_id)
        .bind(Utc::now())
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn upcoming(pool: &sqlx::SqlitePool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrainingEvent>(&format!(
            "{SELECT_TRAINING} WHERE te.is_cancelled = 0 AND te.date >= ? ORDER BY te.date LIMIT ?"
        ))
        .bind(Utc::now())
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Listing used by the web API. Date bounds are club-local days in `tz`.
    pub async fn list(
        pool: &sqlx::SqlitePool,
        filter: &TrainingFilter,
        tz: Tz,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let now = Utc::now();
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("{SELECT_TRAINING} LEFT JOIN club_users cu ON cu.id = te.created_by WHERE 1 = 1"));

        match filter.status {
            TrainingStatus::Upcoming => {
                builder.push(" AND te.is_cancelled = 0 AND te.date >= ").push_bind(now);
            }
            TrainingStatus::Past => {
                builder.push(" AND te.is_cancelled = 0 AND te.date < ").push_bind(now);
            }
            TrainingStatus::Cancelled => {
                builder.push(" AND te.is_cancelled = 1");
            }
            TrainingStatus::Active => {
                builder.push(" AND te.is_cancelled = 0");
            }
        }

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            builder
                .push(" AND (te.title LIKE ")
                .push_bind(pattern.clone())
                .push(" OR te.description LIKE ")
                .push_bind(pattern.clone())
                .push(" OR te.location LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        if let Some(location) = filter.location.as_deref().filter(|s| !s.trim().is_empty()) {
            builder.push(" AND te.location LIKE ").push_bind(format!("%{}%", location.trim()));
        }

        if let Some(organizer) = filter.organizer.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", organizer.trim());
            builder
                .push(" AND (cu.first_name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR cu.last_name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR cu.telegram_username LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        if let Some(distance) = filter.distance {
            builder
                .push(" AND EXISTS (SELECT 1 FROM training_distances td WHERE td.training_id = te.id AND td.distance = ")
                .push_bind(distance)
                .push(")");
        }

        if let Some(date_from) = filter.date_from {
            builder.push(" AND te.date >= ").push_bind(local_day_start(date_from, tz));
        }
        if let Some(next_day) = filter.date_to.and_then(|d| d.succ_opt()) {
            builder.push(" AND te.date < ").push_bind(local_day_start(next_day, tz));
        }

        match filter.status {
            TrainingStatus::Upcoming => builder.push(" ORDER BY te.date ASC"),
            _ => builder.push(" ORDER BY te.date DESC"),
        };

        builder.build_query_as::<TrainingEvent>().fetch_all(pool).await
    }

    /// Trainings whose post-training survey is due: started within the last day,
    /// finished at least `delay` ago, not cancelled and not yet surveyed.
    pub async fn due_for_survey(
        pool: &sqlx::SqlitePool,
        now: DateTime<Utc>,
        delay: Duration,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrainingEvent>(&format!(
            "{SELECT_TRAINING} WHERE te.is_cancelled = 0 AND te.survey_sent_at IS NULL \
             AND te.date <= ? AND te.date >= ? ORDER BY te.date"
        ))
        .bind(now - delay)
        .bind(now - Duration::hours(24))
        .fetch_all(pool)
        .await
    }

    pub async fn mark_survey_sent(
        pool: &sqlx::SqlitePool,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE training_events SET survey_sent_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn cancel(
        pool: &sqlx::SqlitePool,
        id: i64,
        reason: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE training_events SET is_cancelled = 1, cancellation_reason = ?, updated_at = ? WHERE id = ?",
        )
        .bind(reason)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete(pool: &sqlx::SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM training_events WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn participant_count(&self, pool: &sqlx::SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM training_registrations WHERE training_id = ?")
            .bind(self.id)
            .fetch_one(pool)
            .await
    }

    pub fn is_past_at(&self, now: DateTime<Utc>) -> bool {
        self.date < now
    }

    pub fn is_past(&self) -> bool {
        self.is_past_at(Utc::now())
    }

    /// Starts within the next 24 hours.
    pub fn is_soon_at(&self, now: DateTime<Utc>) -> bool {
        self.date > now && self.date - now < Duration::hours(24)
    }

    pub fn is_soon(&self) -> bool {
        self.is_soon_at(Utc::now())
    }
}

impl TrainingDistance {
    pub async fn for_training(
        pool: &sqlx::SqlitePool,
        training_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrainingDistance>(&format!(
            "{SELECT_DISTANCE} WHERE training_id = ? ORDER BY distance"
        ))
        .bind(training_id)
        .fetch_all(pool)
        .await
    }

    /// Batch fetch distances for several trainings to avoid N+1 queries
    pub async fn for_trainings(
        pool: &sqlx::SqlitePool,
        training_ids: &[i64],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if training_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = training_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            "{SELECT_DISTANCE} WHERE training_id IN ({placeholders}) ORDER BY training_id, distance"
        );

        let mut query_builder = sqlx::query_as::<_, TrainingDistance>(&query);
        for training_id in training_ids {
            query_builder = query_builder.bind(training_id);
        }

        query_builder.fetch_all(pool).await
    }

    pub async fn find(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        distance_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrainingDistance>(&format!(
            "{SELECT_DISTANCE} WHERE training_id = ? AND id = ?"
        ))
        .bind(training_id)
        .bind(distance_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_id(pool: &sqlx::SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrainingDistance>(&format!("{SELECT_DISTANCE} WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn registrations_count(&self, pool: &sqlx::SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM training_registrations WHERE distance_id = ?")
            .bind(self.id)
            .fetch_one(pool)
            .await
    }

    pub async fn set_route_status(
        pool: &sqlx::SqlitePool,
        id: i64,
        status: RouteStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE training_distances SET route_status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_route_result(
        pool: &sqlx::SqlitePool,
        id: i64,
        length_km: f64,
        markers_json: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE training_distances SET route_length_km = ?, route_markers = ?, route_status = 'completed' WHERE id = ?",
        )
        .bind(length_km)
        .bind(markers_json)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_participants == 0
    }
}

/// Upcoming training prepared for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub training: TrainingEvent,
    pub participants_count: i64,
    /// Sum of all distance limits; `0` when any distance is unlimited.
    pub max_participants: i64,
    pub distances: String,
    pub is_full: bool,
}

impl TrainingSummary {
    pub async fn upcoming(pool: &sqlx::SqlitePool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let trainings = TrainingEvent::upcoming(pool, limit).await?;
        Self::build(pool, trainings).await
    }

    pub async fn build(
        pool: &sqlx::SqlitePool,
        trainings: Vec<TrainingEvent>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let ids: Vec<i64> = trainings.iter().map(|t| t.id).collect();
        let distances = TrainingDistance::for_trainings(pool, &ids).await?;
        let counts = registration_counts(pool, &ids).await?;

        let mut by_training: HashMap<i64, Vec<TrainingDistance>> = HashMap::new();
        for distance in distances {
            by_training.entry(distance.training_id).or_default().push(distance);
        }

        Ok(trainings
            .into_iter()
            .map(|training| {
                let distances = by_training.remove(&training.id).unwrap_or_default();
                let participants_count = counts.get(&training.id).copied().unwrap_or(0);
                let max_participants = total_capacity(&distances);
                Self {
                    participants_count,
                    max_participants,
                    distances: distances_label(&distances),
                    is_full: max_participants > 0 && participants_count >= max_participants,
                    training,
                }
            })
            .collect())
    }
}

/// `"5 | 10 км"`, or `"TBD"` when no distances are defined.
pub fn distances_label(distances: &[TrainingDistance]) -> String {
    if distances.is_empty() {
        return "TBD".to_string();
    }
    let joined = distances
        .iter()
        .map(|d| format_km(d.distance))
        .collect::<Vec<_>>()
        .join(" | ");
    format!("{joined} км")
}

fn total_capacity(distances: &[TrainingDistance]) -> i64 {
    if distances.is_empty() || distances.iter().any(TrainingDistance::is_unlimited) {
        return 0;
    }
    distances.iter().map(|d| d.max_participants).sum()
}

/// Drops a trailing `.0` so whole kilometres read naturally.
pub fn format_km(km: f64) -> String {
    if km.fract() == 0.0 {
        format!("{km:.0}")
    } else {
        let formatted = format!("{km:.2}");
        formatted.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

async fn registration_counts(
    pool: &sqlx::SqlitePool,
    training_ids: &[i64],
) -> Result<HashMap<i64, i64>, sqlx::Error> {
    if training_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = training_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let query = format!(
        "SELECT training_id, COUNT(*) FROM training_registrations WHERE training_id IN ({placeholders}) GROUP BY training_id"
    );

    let mut query_builder = sqlx::query_as::<_, (i64, i64)>(&query);
    for training_id in training_ids {
        query_builder = query_builder.bind(training_id);
    }

    Ok(query_builder.fetch_all(pool).await?.into_iter().collect())
}

/// Club-wide numbers for the landing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClubStatistics {
    pub total_members: i64,
    pub total_trainings: i64,
    pub total_distance: f64,
}

impl ClubStatistics {
    pub async fn collect(pool: &sqlx::SqlitePool) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        let total_members = crate::database::models::ClubUser::count_active(pool).await?;

        let total_trainings: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM training_events WHERE is_cancelled = 0 AND date < ?",
        )
        .bind(now)
        .fetch_one(pool)
        .await?;

        let total_distance: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT SUM(td.distance)
            FROM training_registrations tr
            JOIN training_distances td ON td.id = tr.distance_id
            JOIN training_events te ON te.id = tr.training_id
            WHERE te.is_cancelled = 0 AND te.date < ?
            "#,
        )
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(Self {
            total_members,
            total_trainings,
            total_distance: total_distance.unwrap_or(0.0),
        })
    }
}

fn slugify(title: &str, date: DateTime<Utc>) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for ch in title.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            slug.push(ch);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    format!("{}-{}", slug, date.format("%Y%m%d%H%M"))
}
