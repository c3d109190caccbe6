use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub text: String,
    pub explanation: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct QuizAnswer {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,
}

impl QuizQuestion {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        text: &str,
        explanation: Option<&str>,
        image: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO quiz_questions (text, explanation, image, is_active, created_at) VALUES (?, ?, ?, 1, ?)",
        )
        .bind(text)
        .bind(explanation)
        .bind(image)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(QuizQuestion {
            id: result.last_insert_rowid(),
            text: text.to_string(),
            explanation: explanation.map(str::to_string),
            image: image.map(str::to_string),
            is_active: true,
            created_at: now,
        })
    }

    /// Oldest question that has not been asked yet.
    pub async fn first_active(pool: &sqlx::SqlitePool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, QuizQuestion>(
            "SELECT id, text, explanation, image, is_active, created_at FROM quiz_questions \
             WHERE is_active = 1 ORDER BY created_at, id LIMIT 1",
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn answers(&self, pool: &sqlx::SqlitePool) -> Result<Vec<QuizAnswer>, sqlx::Error> {
        sqlx::query_as::<_, QuizAnswer>(
            "SELECT id, question_id, text, is_correct FROM quiz_answers WHERE question_id = ? ORDER BY id",
        )
        .bind(self.id)
        .fetch_all(pool)
        .await
    }

    pub async fn deactivate(pool: &sqlx::SqlitePool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE quiz_questions SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

impl QuizAnswer {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        question_id: i64,
        text: &str,
        is_correct: bool,
    ) -> Result<Self, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO quiz_answers (question_id, text, is_correct) VALUES (?, ?, ?)",
        )
        .bind(question_id)
        .bind(text)
        .bind(is_correct)
        .execute(pool)
        .await?;

        Ok(QuizAnswer {
            id: result.last_insert_rowid(),
            question_id,
            text: text.to_string(),
            is_correct,
        })
    }
}
