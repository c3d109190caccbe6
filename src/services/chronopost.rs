use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::SqlitePool;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use tracing::{error, info, warn};

use crate::database::models::{Periodicity, ScheduledMessage};
use crate::utils::html::{clean_tag_message, truncate_chars};
use crate::utils::logging::{log_database_error, log_database_operation};
use crate::utils::media::input_file;
use crate::utils::validation::validate_button_url;

/// Counters for one scheduler pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessReport {
    pub sent: usize,
    pub failed: usize,
    pub rescheduled: usize,
    pub deactivated: usize,
}

/// URL button attached when both the text and a valid link are set.
pub fn message_keyboard(message: &ScheduledMessage) -> Option<InlineKeyboardMarkup> {
    let text = message.button_text.as_deref().filter(|t| !t.trim().is_empty())?;
    let url = message.button_url.as_deref().filter(|u| !u.trim().is_empty())?;
    if let Err(e) = validate_button_url(url) {
        warn!("Scheduled message {} has an unusable button link: {}", message.id, e);
        return None;
    }
    let url = reqwest::Url::parse(url.trim()).ok()?;
    Some(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        text.to_string(),
        url,
    )]]))
}

/// Sends a scheduled post to `chat_id` exactly as the broadcast would.
pub async fn send_scheduled(bot: &Bot, chat_id: ChatId, message: &ScheduledMessage) -> ResponseResult<()> {
    let text = clean_tag_message(&message.text);
    let keyboard = message_keyboard(message);

    match message.photo.as_deref().filter(|p| !p.is_empty()) {
        Some(photo) => {
            let mut request = bot
                .send_photo(chat_id, input_file(photo))
                .caption(truncate_chars(&text, 1024))
                .parse_mode(ParseMode::Html);
            if let Some(keyboard) = keyboard {
                request = request.reply_markup(keyboard);
            }
            request.await?;
        }
        None => {
            let mut request = bot
                .send_message(chat_id, truncate_chars(&text, 4096))
                .parse_mode(ParseMode::Html);
            if let Some(keyboard) = keyboard {
                request = request.reply_markup(keyboard);
            }
            request.await?;
        }
    }
    Ok(())
}

/// Delivers due chronoposts and moves them to their next slot.
pub struct MessageScheduler {
    bot: Bot,
    pool: SqlitePool,
    tz: Tz,
}

impl MessageScheduler {
    pub fn new(bot: Bot, pool: SqlitePool, tz: Tz) -> Self {
        Self { bot, pool, tz }
    }

    pub async fn process_messages(&self, now: DateTime<Utc>) -> Result<ProcessReport, sqlx::Error> {
        let messages = ScheduledMessage::due(&self.pool, now).await?;
        if messages.is_empty() {
            return Ok(ProcessReport::default());
        }
        info!("Processing {} scheduled message(s)", messages.len());

        let mut successful = Vec::with_capacity(messages.len());
        let mut report = ProcessReport::default();

        for message in messages {
            match send_scheduled(&self.bot, ChatId(message.chat_id), &message).await {
                Ok(()) => {
                    report.sent += 1;
                    successful.push(message);
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        "Failed to send scheduled message {} to chat {}: {}",
                        message.id, message.chat_id, e
                    );
                }
            }
        }

        let (rescheduled, deactivated) = advance_sent(&self.pool, &successful, now, self.tz).await?;
        report.rescheduled = rescheduled;
        report.deactivated = deactivated as usize;
        Ok(report)
    }
}

/// Moves periodic messages past `now` and deactivates one-off ones.
/// Returns `(rescheduled, deactivated)`.
pub async fn advance_sent(
    pool: &SqlitePool,
    sent: &[ScheduledMessage],
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<(usize, u64), sqlx::Error> {
    let mut rescheduled = 0;
    let mut once_ids = Vec::new();

    for message in sent {
        match message.periodicity.next_after(message.scheduled_time, now, tz) {
            Some(next) => match ScheduledMessage::reschedule(pool, message.id, next).await {
                Ok(()) => rescheduled += 1,
                Err(e) => log_database_error(
                    "UPDATE",
                    "scheduled_messages",
                    &e.to_string(),
                    Some(&format!("message {} stays at its old time", message.id)),
                ),
            },
            None if message.periodicity == Periodicity::Once => once_ids.push(message.id),
            None => error!("Could not compute next send time for message {}", message.id),
        }
    }

    let deactivated = ScheduledMessage::deactivate(pool, &once_ids).await?;
    log_database_operation(
        "UPDATE",
        "scheduled_messages",
        Some(&format!("{rescheduled} rescheduled, {deactivated} deactivated")),
    );
    Ok((rescheduled, deactivated))
}
