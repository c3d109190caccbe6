use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClubUser {
    pub id: i64,
    pub telegram_id: i64,
    pub telegram_username: Option<String>,
    pub telegram_first_name: Option<String>,
    pub telegram_last_name: Option<String>,
    pub telegram_photo_id: Option<String>,
    pub telegram_language_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone_number: Option<String>,
    pub is_staff: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Telegram-side data refreshed on every `/start`.
#[derive(Debug, Clone, Default)]
pub struct TelegramProfile {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_id: Option<String>,
    pub language_code: Option<String>,
}

/// Profile fields a member is asked to fill in, in prompt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileField {
    FirstName,
    LastName,
    PhoneNumber,
    DateOfBirth,
}

impl ProfileField {
    pub const ALL: [ProfileField; 4] = [
        ProfileField::FirstName,
        ProfileField::LastName,
        ProfileField::PhoneNumber,
        ProfileField::DateOfBirth,
    ];
}

const SELECT_USER: &str = "SELECT id, telegram_id, telegram_username, telegram_first_name, telegram_last_name, \
     telegram_photo_id, telegram_language_code, first_name, last_name, date_of_birth, phone_number, \
     is_staff, is_active, created_at, updated_at FROM club_users";

impl ClubUser {
    /// Returns the member for this Telegram account, creating it on first contact.
    /// The boolean is `true` when a new row was inserted.
    pub async fn get_or_create(
        pool: &sqlx::SqlitePool,
        profile: &TelegramProfile,
    ) -> Result<(Self, bool), sqlx::Error> {
        let now = Utc::now();

        if let Some(existing) = Self::find_by_telegram_id(pool, profile.telegram_id).await? {
            sqlx::query(
                r#"
                UPDATE club_users
                SET telegram_username = ?, telegram_first_name = ?, telegram_last_name = ?,
                    telegram_photo_id = COALESCE(?, telegram_photo_id),
                    telegram_language_code = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&profile.username)
            .bind(&profile.first_name)
            .bind(&profile.last_name)
            .bind(&profile.photo_id)
            .bind(&profile.language_code)
            .bind(now)
            .bind(existing.id)
            .execute(pool)
            .await?;

            let refreshed = Self::find_by_id(pool, existing.id)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;
            return Ok((refreshed, false));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO club_users (telegram_id, telegram_username, telegram_first_name, telegram_last_name,
                                    telegram_photo_id, telegram_language_code, is_staff, is_active,
                                    created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, 1, ?, ?)
            "#,
        )
        .bind(profile.telegram_id)
        .bind(&profile.username)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.photo_id)
        .bind(&profile.language_code)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        let created = Self::find_by_id(pool, result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Ok((created, true))
    }

    pub async fn find_by_id(
        pool: &sqlx::SqlitePool,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ClubUser>(&format!("{SELECT_USER} WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_telegram_id(
        pool: &sqlx::SqlitePool,
        telegram_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ClubUser>(&format!("{SELECT_USER} WHERE telegram_id = ?"))
            .bind(telegram_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn update_first_name(pool: &sqlx::SqlitePool, id: i64, value: &str) -> Result<(), sqlx::Error> {
        Self::update_text_column(pool, id, "first_name", value).await
    }

    pub async fn update_last_name(pool: &sqlx::SqlitePool, id: i64, value: &str) -> Result<(), sqlx::Error> {
        Self::update_text_column(pool, id, "last_name", value).await
    }

    pub async fn update_phone(pool: &sqlx::SqlitePool, id: i64, value: &str) -> Result<(), sqlx::Error> {
        Self::update_text_column(pool, id, "phone_number", value).await
    }

    pub async fn update_date_of_birth(
        pool: &sqlx::SqlitePool,
        id: i64,
        value: NaiveDate,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE club_users SET date_of_birth = ?, updated_at = ? WHERE id = ?")
            .bind(value)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_staff(pool: &sqlx::SqlitePool, id: i64, is_staff: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE club_users SET is_staff = ?, updated_at = ? WHERE id = ?")
            .bind(is_staff)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    // Column names come from the fixed set above, never from user input.
    async fn update_text_column(
        pool: &sqlx::SqlitePool,
        id: i64,
        column: &'static str,
        value: &str,
    ) -> Result<(), sqlx::Error> {
        let query = format!("UPDATE club_users SET {column} = ?, updated_at = ? WHERE id = ?");
        sqlx::query(&query)
            .bind(value)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Active members whose birthday falls on the given month and day.
    pub async fn birthdays_on(
        pool: &sqlx::SqlitePool,
        month: u32,
        day: u32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let month_day = format!("{month:02}-{day:02}");
        sqlx::query_as::<_, ClubUser>(&format!(
            "{SELECT_USER} WHERE is_active = 1 AND date_of_birth IS NOT NULL \
             AND strftime('%m-%d', date_of_birth) = ? ORDER BY first_name"
        ))
        .bind(month_day)
        .fetch_all(pool)
        .await
    }

    pub async fn count_active(pool: &sqlx::SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM club_users WHERE is_active = 1")
            .fetch_one(pool)
            .await
    }

    /// Fields still empty, in the order they should be requested.
    pub fn missing_profile_fields(&self) -> Vec<ProfileField> {
        ProfileField::ALL
            .into_iter()
            .filter(|field| match field {
                ProfileField::FirstName => is_blank(&self.first_name),
                ProfileField::LastName => is_blank(&self.last_name),
                ProfileField::PhoneNumber => is_blank(&self.phone_number),
                ProfileField::DateOfBirth => self.date_of_birth.is_none(),
            })
            .collect()
    }

    pub fn is_profile_complete(&self) -> bool {
        self.missing_profile_fields().is_empty()
    }

    /// "First Last" from the club profile, falling back to the Telegram name.
    pub fn full_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{first} {last}")
            }
            _ => {
                let telegram_name = [&self.telegram_first_name, &self.telegram_last_name]
                    .iter()
                    .filter_map(|part| part.as_deref())
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                if telegram_name.is_empty() {
                    format!("користувач (ID: {})", self.telegram_id)
                } else {
                    telegram_name
                }
            }
        }
    }

    /// `@username` or an empty string.
    pub fn mention(&self) -> String {
        self.telegram_username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| format!("@{u}"))
            .unwrap_or_default()
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
