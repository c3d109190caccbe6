use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A Monobank personal API token owner.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MonoBankClient {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub client_token: String,
    pub is_active: bool,
}

/// A card (Monobank account) whose transactions are announced in Telegram.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MonoBankCard {
    pub id: i64,
    pub client_id: i64,
    pub card_id: String,
    /// Target chat; admins are notified when empty.
    pub chat_id: Option<i64>,
    pub is_active: bool,
}

impl MonoBankClient {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        name: &str,
        client_token: &str,
    ) -> Result<Self, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO mono_bank_clients (name, client_token, is_active) VALUES (?, ?, 1)",
        )
        .bind(name)
        .bind(client_token)
        .execute(pool)
        .await?;

        Ok(MonoBankClient {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            client_token: client_token.to_string(),
            is_active: true,
        })
    }

    pub async fn find_by_id(pool: &sqlx::SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MonoBankClient>(
            "SELECT id, name, client_token, is_active FROM mono_bank_clients WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn active(pool: &sqlx::SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MonoBankClient>(
            "SELECT id, name, client_token, is_active FROM mono_bank_clients WHERE is_active = 1 ORDER BY id",
        )
        .fetch_all(pool)
        .await
    }
}

impl MonoBankCard {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        client_id: i64,
        card_id: &str,
        chat_id: Option<i64>,
        is_active: bool,
    ) -> Result<Self, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO mono_bank_cards (client_id, card_id, chat_id, is_active) VALUES (?, ?, ?, ?)",
        )
        .bind(client_id)
        .bind(card_id)
        .bind(chat_id)
        .bind(is_active)
        .execute(pool)
        .await?;

        Ok(MonoBankCard {
            id: result.last_insert_rowid(),
            client_id,
            card_id: card_id.to_string(),
            chat_id,
            is_active,
        })
    }

    pub async fn find_active(
        pool: &sqlx::SqlitePool,
        card_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MonoBankCard>(
            "SELECT id, client_id, card_id, chat_id, is_active FROM mono_bank_cards WHERE card_id = ? AND is_active = 1",
        )
        .bind(card_id)
        .fetch_optional(pool)
        .await
    }

    /// The card together with the token of the client that owns it.
    pub async fn with_client(
        pool: &sqlx::SqlitePool,
        card_id: &str,
    ) -> Result<Option<(Self, MonoBankClient)>, sqlx::Error> {
        let Some(card) = sqlx::query_as::<_, MonoBankCard>(
            "SELECT id, client_id, card_id, chat_id, is_active FROM mono_bank_cards WHERE card_id = ?",
        )
        .bind(card_id)
        .fetch_optional(pool)
        .await?
        else {
            return Ok(None);
        };

        let client = MonoBankClient::find_by_id(pool, card.client_id).await?;
        Ok(client.map(|client| (card, client)))
    }
}
