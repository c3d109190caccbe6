use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GreetingType {
    Birthday,
    NewYear,
}

/// Editable congratulation text.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Greeting {
    pub id: i64,
    pub greeting_type: GreetingType,
    pub text: String,
    pub is_active: bool,
}

impl Greeting {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        greeting_type: GreetingType,
        text: &str,
    ) -> Result<Self, sqlx::Error> {
        let result = sqlx::query("INSERT INTO greetings (greeting_type, text, is_active) VALUES (?, ?, 1)")
            .bind(greeting_type)
            .bind(text)
            .execute(pool)
            .await?;

        Ok(Greeting {
            id: result.last_insert_rowid(),
            greeting_type,
            text: text.to_string(),
            is_active: true,
        })
    }

    pub async fn first_active(
        pool: &sqlx::SqlitePool,
        greeting_type: GreetingType,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Greeting>(
            "SELECT id, greeting_type, text, is_active FROM greetings \
             WHERE greeting_type = ? AND is_active = 1 ORDER BY id LIMIT 1",
        )
        .bind(greeting_type)
        .fetch_optional(pool)
        .await
    }
}

/// Content served by `/start <command>`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DeepLink {
    pub id: i64,
    pub command: String,
    pub text: String,
    pub image: Option<String>,
}

impl DeepLink {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        command: &str,
        text: &str,
        image: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        let result = sqlx::query("INSERT INTO deep_links (command, text, image) VALUES (?, ?, ?)")
            .bind(command)
            .bind(text)
            .bind(image)
            .execute(pool)
            .await?;

        Ok(DeepLink {
            id: result.last_insert_rowid(),
            command: command.to_string(),
            text: text.to_string(),
            image: image.map(str::to_string),
        })
    }

    pub async fn find_by_command(
        pool: &sqlx::SqlitePool,
        command: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, DeepLink>("SELECT id, command, text, image FROM deep_links WHERE command = ?")
            .bind(command)
            .fetch_optional(pool)
            .await
    }
}
