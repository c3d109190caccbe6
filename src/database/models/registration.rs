use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TrainingRegistration {
    pub id: i64,
    pub training_id: i64,
    pub participant_id: i64,
    pub distance_id: i64,
    pub attendance_confirmed: bool,
    pub actual_attendance: bool,
    pub expected_pace: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A member's registration joined with its training and distance, for `/my_trainings`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MyRegistration {
    pub training_id: i64,
    pub title: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub distance: f64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TrainingRating {
    pub id: i64,
    pub training_id: i64,
    pub participant_id: i64,
    pub rating: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TrainingComment {
    pub id: i64,
    pub training_id: i64,
    pub participant_id: i64,
    pub comment: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// Where a training announcement was published.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TrainingMessage {
    pub id: i64,
    pub training_id: i64,
    pub chat_id: i64,
    pub message_id: i64,
    pub created_at: DateTime<Utc>,
}

const SELECT_REGISTRATION: &str = "SELECT id, training_id, participant_id, distance_id, attendance_confirmed, \
     actual_attendance, expected_pace, notes, created_at FROM training_registrations";

impl TrainingRegistration {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        participant_id: i64,
        distance_id: i64,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO training_registrations (training_id, participant_id, distance_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(training_id)
        .bind(participant_id)
        .bind(distance_id)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(TrainingRegistration {
            id: result.last_insert_rowid(),
            training_id,
            participant_id,
            distance_id,
            attendance_confirmed: false,
            actual_attendance: false,
            expected_pace: None,
            notes: None,
            created_at: now,
        })
    }

    /// Inserts the registration only while the distance has a free place (`max_participants = 0`
    /// never fills). `None` means the distance is full.
    pub async fn create_within_capacity(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        participant_id: i64,
        distance_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO training_registrations (training_id, participant_id, distance_id, created_at)
            SELECT ?1, ?2, d.id, ?4
            FROM training_distances d
            WHERE d.id = ?3
              AND (d.max_participants = 0
                   OR (SELECT COUNT(*) FROM training_registrations r WHERE r.distance_id = d.id)
                      < d.max_participants)
            "#,
        )
        .bind(training_id)
        .bind(participant_id)
        .bind(distance_id)
        .bind(now)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(TrainingRegistration {
            id: result.last_insert_rowid(),
            training_id,
            participant_id,
            distance_id,
            attendance_confirmed: false,
            actual_attendance: false,
            expected_pace: None,
            notes: None,
            created_at: now,
        }))
    }

    pub async fn find(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        participant_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrainingRegistration>(&format!(
            "{SELECT_REGISTRATION} WHERE training_id = ? AND participant_id = ?"
        ))
        .bind(training_id)
        .bind(participant_id)
        .fetch_optional(pool)
        .await
    }

    /// Returns `true` when a registration was removed.
    pub async fn delete(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        participant_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM training_registrations WHERE training_id = ? AND participant_id = ?",
        )
        .bind(training_id)
        .bind(participant_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Moves the registration when the target distance still has room.
    /// The capacity check and the write are one statement, so concurrent moves cannot overfill it.
    /// Returns `false` when the distance is full.
    pub async fn update_distance(
        pool: &sqlx::SqlitePool,
        id: i64,
        distance_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE training_registrations SET distance_id = ?1
            WHERE id = ?2
              AND EXISTS (
                  SELECT 1 FROM training_distances d
                  WHERE d.id = ?1
                    AND (d.max_participants = 0
                         OR (SELECT COUNT(*) FROM training_registrations r WHERE r.distance_id = d.id)
                            < d.max_participants)
              )
            "#,
        )
        .bind(distance_id)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn for_training(
        pool: &sqlx::SqlitePool,
        training_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrainingRegistration>(&format!(
            "{SELECT_REGISTRATION} WHERE training_id = ? ORDER BY created_at"
        ))
        .bind(training_id)
        .fetch_all(pool)
        .await
    }

    pub async fn for_participant_upcoming(
        pool: &sqlx::SqlitePool,
        participant_id: i64,
    ) -> Result<Vec<MyRegistration>, sqlx::Error> {
        sqlx::query_as::<_, MyRegistration>(
            r#"
            SELECT te.id AS training_id, te.title, te.date, te.location, td.distance
            FROM training_registrations tr
            JOIN training_events te ON te.id = tr.training_id
            JOIN training_distances td ON td.id = tr.distance_id
            WHERE tr.participant_id = ? AND te.is_cancelled = 0 AND te.date >= ?
            ORDER BY te.date
            "#,
        )
        .bind(participant_id)
        .bind(Utc::now())
        .fetch_all(pool)
        .await
    }

    /// Unique Telegram ids of everyone registered for the training.
    pub async fn participants_of(
        pool: &sqlx::SqlitePool,
        training_id: i64,
    ) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT DISTINCT cu.telegram_id
            FROM training_registrations tr
            JOIN club_users cu ON cu.id = tr.participant_id
            WHERE tr.training_id = ?
            ORDER BY cu.telegram_id
            "#,
        )
        .bind(training_id)
        .fetch_all(pool)
        .await
    }
}

impl TrainingRating {
    /// One rating per member and training; a repeated vote replaces the previous one.
    pub async fn upsert(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        participant_id: i64,
        rating: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO training_ratings (training_id, participant_id, rating, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (training_id, participant_id) DO UPDATE SET rating = excluded.rating
            "#,
        )
        .bind(training_id)
        .bind(participant_id)
        .bind(rating)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        participant_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrainingRating>(
            "SELECT id, training_id, participant_id, rating, created_at FROM training_ratings \
             WHERE training_id = ? AND participant_id = ?",
        )
        .bind(training_id)
        .bind(participant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn average(pool: &sqlx::SqlitePool, training_id: i64) -> Result<Option<f64>, sqlx::Error> {
        sqlx::query_scalar("SELECT AVG(rating) FROM training_ratings WHERE training_id = ?")
            .bind(training_id)
            .fetch_one(pool)
            .await
    }
}

impl TrainingComment {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        participant_id: i64,
        comment: &str,
        is_public: bool,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO training_comments (training_id, participant_id, comment, is_public, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(training_id)
        .bind(participant_id)
        .bind(comment)
        .bind(is_public)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(TrainingComment {
            id: result.last_insert_rowid(),
            training_id,
            participant_id,
            comment: comment.to_string(),
            is_public,
            created_at: now,
        })
    }

    pub async fn public_for(
        pool: &sqlx::SqlitePool,
        training_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrainingComment>(
            "SELECT id, training_id, participant_id, comment, is_public, created_at FROM training_comments \
             WHERE training_id = ? AND is_public = 1 ORDER BY created_at DESC",
        )
        .bind(training_id)
        .fetch_all(pool)
        .await
    }
}

impl TrainingMessage {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        chat_id: i64,
        message_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO training_messages (training_id, chat_id, message_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(training_id)
        .bind(chat_id)
        .bind(message_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn for_training(
        pool: &sqlx::SqlitePool,
        training_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrainingMessage>(
            "SELECT id, training_id, chat_id, message_id, created_at FROM training_messages WHERE training_id = ?",
        )
        .bind(training_id)
        .fetch_all(pool)
        .await
    }
}
