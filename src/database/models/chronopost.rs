use chrono::{DateTime, Duration, Months, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// How often a scheduled message repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    Once,
    Daily,
    Weekly,
    Monthly,
}

impl Periodicity {
    pub fn label(&self) -> &'static str {
        match self {
            Periodicity::Once => "Один раз",
            Periodicity::Daily => "Щоденно",
            Periodicity::Weekly => "Щотижнево",
            Periodicity::Monthly => "Щомісячно",
        }
    }

    fn step(&self, local: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Periodicity::Once => None,
            Periodicity::Daily => local.checked_add_signed(Duration::days(1)),
            Periodicity::Weekly => local.checked_add_signed(Duration::weeks(1)),
            Periodicity::Monthly => local.checked_add_months(Months::new(1)),
        }
    }

    /// Next send time strictly after `now`, keeping the wall-clock time in `tz`.
    /// `None` for one-off messages.
    pub fn next_after(&self, scheduled: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let mut local = scheduled.with_timezone(&tz).naive_local();
        loop {
            local = self.step(local)?;
            let candidate = tz
                .from_local_datetime(&local)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                // Wall-clock time skipped by a DST jump: shift by an hour.
                .or_else(|| {
                    tz.from_local_datetime(&(local + Duration::hours(1)))
                        .earliest()
                        .map(|dt| dt.with_timezone(&Utc))
                })?;
            if candidate > now {
                return Some(candidate);
            }
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScheduledMessage {
    pub id: i64,
    pub title: String,
    pub chat_id: i64,
    pub scheduled_time: DateTime<Utc>,
    pub periodicity: Periodicity,
    pub text: String,
    pub button_text: Option<String>,
    pub button_url: Option<String>,
    pub photo: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewScheduledMessage {
    pub title: String,
    pub chat_id: i64,
    pub scheduled_time: DateTime<Utc>,
    pub periodicity: Periodicity,
    pub text: String,
    pub button_text: Option<String>,
    pub button_url: Option<String>,
    pub photo: Option<String>,
    pub is_active: bool,
}

const SELECT_SCHEDULED: &str = "SELECT id, title, chat_id, scheduled_time, periodicity, text, button_text, \
     button_url, photo, is_active FROM scheduled_messages";

impl ScheduledMessage {
    pub async fn create(pool: &sqlx::SqlitePool, new: NewScheduledMessage) -> Result<Self, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO scheduled_messages (title, chat_id, scheduled_time, periodicity, text,
                                            button_text, button_url, photo, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.title)
        .bind(new.chat_id)
        .bind(new.scheduled_time)
        .bind(new.periodicity)
        .bind(&new.text)
        .bind(&new.button_text)
        .bind(&new.button_url)
        .bind(&new.photo)
        .bind(new.is_active)
        .execute(pool)
        .await?;

        Self::find_by_id(pool, result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(pool: &sqlx::SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ScheduledMessage>(&format!("{SELECT_SCHEDULED} WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Active messages whose send time has come.
    pub async fn due(pool: &sqlx::SqlitePool, now: DateTime<Utc>) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ScheduledMessage>(&format!(
            "{SELECT_SCHEDULED} WHERE is_active = 1 AND scheduled_time <= ? ORDER BY scheduled_time"
        ))
        .bind(now)
        .fetch_all(pool)
        .await
    }

    /// Drafts and finished posts, newest first.
    pub async fn inactive(pool: &sqlx::SqlitePool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ScheduledMessage>(&format!(
            "{SELECT_SCHEDULED} WHERE is_active = 0 ORDER BY scheduled_time DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn reschedule(
        pool: &sqlx::SqlitePool,
        id: i64,
        scheduled_time: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE scheduled_messages SET scheduled_time = ? WHERE id = ?")
            .bind(scheduled_time)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn deactivate(pool: &sqlx::SqlitePool, ids: &[i64]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!("UPDATE scheduled_messages SET is_active = 0 WHERE id IN ({placeholders})");

        let mut query_builder = sqlx::query(&query);
        for id in ids {
            query_builder = query_builder.bind(id);
        }

        Ok(query_builder.execute(pool).await?.rows_affected())
    }
}

/// A chat subscribed to the daily precipitation forecast.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WeatherNotification {
    pub id: i64,
    pub title: String,
    pub chat_id: i64,
    pub text: Option<String>,
    pub poster: Option<String>,
    pub is_active: bool,
}

impl WeatherNotification {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        title: &str,
        chat_id: i64,
        text: Option<&str>,
        poster: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO weather_notifications (title, chat_id, text, poster, is_active) VALUES (?, ?, ?, ?, 1)",
        )
        .bind(title)
        .bind(chat_id)
        .bind(text)
        .bind(poster)
        .execute(pool)
        .await?;

        Ok(WeatherNotification {
            id: result.last_insert_rowid(),
            title: title.to_string(),
            chat_id,
            text: text.map(str::to_string),
            poster: poster.map(str::to_string),
            is_active: true,
        })
    }

    pub async fn active(pool: &sqlx::SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, WeatherNotification>(
            "SELECT id, title, chat_id, text, poster, is_active FROM weather_notifications WHERE is_active = 1",
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_once_has_no_next_time() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(Periodicity::Once.next_after(now, now, chrono_tz::Europe::Kyiv), None);
    }

    #[test]
    fn test_daily_catches_up_past_now() {
        let scheduled = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 7, 0, 0).unwrap();
        let next = Periodicity::Daily.next_after(scheduled, now, chrono_tz::UTC).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 5, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_daily_keeps_local_wall_clock_across_dst() {
        // 09:00 Kyiv on the day before the spring switch (UTC+2 -> UTC+3).
        let scheduled = Utc.with_ymd_and_hms(2025, 3, 29, 7, 0, 0).unwrap();
        let next = Periodicity::Daily
            .next_after(scheduled, scheduled, chrono_tz::Europe::Kyiv)
            .unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 30, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_monthly_clamps_to_month_end() {
        let scheduled = Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap();
        let next = Periodicity::Monthly
            .next_after(scheduled, scheduled, chrono_tz::UTC)
            .unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_weekly_step() {
        let scheduled = Utc.with_ymd_and_hms(2025, 6, 2, 5, 0, 0).unwrap();
        let next = Periodicity::Weekly
            .next_after(scheduled, scheduled, chrono_tz::UTC)
            .unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 9, 5, 0, 0).unwrap());
    }
}
