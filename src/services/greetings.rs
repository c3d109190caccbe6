use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use sqlx::SqlitePool;
use teloxide::prelude::*;
use tracing::info;

use crate::database::models::{ClubUser, Greeting, GreetingType};
use crate::services::broadcaster;
use crate::utils::html::{clean_tag_message, escape_html};

pub const DEFAULT_BIRTHDAY_GREETING: &str =
    "Бажаємо легких кілометрів, нових рекордів і гарного настрою на кожній пробіжці!";

pub fn greeting_text(today: &str, name: &str, greeting: &str) -> String {
    [
        format!("✅ {today}"),
        "🎊 Сьогодні день народження святкує".to_string(),
        format!("👤 <b>{}</b>", escape_html(name)),
        "〰️〰️〰️💙💛🇺🇦💙💛〰️〰️〰️".to_string(),
        format!("🍰 {greeting}"),
        "〰️〰️〰️🎁🎈🎊🎂💐〰️〰️〰️".to_string(),
    ]
    .join("\n\n")
}

/// Congratulates every active member born on today's day and month in the club chat.
/// Returns the number of greetings delivered.
pub async fn send_birthday_greetings(
    bot: &Bot,
    pool: &SqlitePool,
    chat_id: i64,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<usize, sqlx::Error> {
    let today = now.with_timezone(&tz).date_naive();
    let members = ClubUser::birthdays_on(pool, today.month(), today.day()).await?;
    if members.is_empty() {
        info!("No birthdays on {}", today.format("%d.%m"));
        return Ok(0);
    }

    let greeting = Greeting::first_active(pool, GreetingType::Birthday)
        .await?
        .map(|g| g.text)
        .unwrap_or_else(|| DEFAULT_BIRTHDAY_GREETING.to_string());
    let date = today.format("%d.%m.%Y").to_string();

    let mut delivered = 0;
    for member in members {
        let text = clean_tag_message(&greeting_text(&date, &member.full_name(), &greeting));
        if broadcaster::send_message(bot, ChatId(chat_id), &text, None).await {
            delivered += 1;
        }
        tokio::time::sleep(broadcaster::MESSAGE_INTERVAL).await;
    }
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_text_escapes_name() {
        let text = greeting_text("01.05.2025", "Олена <Run>", "Вітаємо!");
        assert!(text.starts_with("✅ 01.05.2025\n\n🎊"));
        assert!(text.contains("👤 <b>Олена &lt;Run&gt;</b>"));
        assert!(text.contains("🍰 Вітаємо!"));
    }
}
