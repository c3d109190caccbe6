use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, ParseMode};
use teloxide::RequestError;
use tracing::{error, info, warn};

/// Pause between two messages of a broadcast, keeping under Telegram's 30 msg/s limit.
pub const MESSAGE_INTERVAL: Duration = Duration::from_millis(50);

/// Sends one HTML message, sleeping and retrying once when Telegram asks to back off.
/// Returns `true` when the message was delivered.
pub async fn send_message(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    reply_markup: Option<InlineKeyboardMarkup>,
) -> bool {
    let error = match try_send(bot, chat_id, text, reply_markup.clone()).await {
        Ok(()) => return true,
        Err(e) => e,
    };
    let Some(delay) = retry_delay(&error) else {
        error!("Target [ID:{}]: failed: {}", chat_id, error);
        return false;
    };

    warn!("Target [ID:{}]: flood limit exceeded, sleeping {:?}", chat_id, delay);
    tokio::time::sleep(delay).await;
    match try_send(bot, chat_id, text, reply_markup).await {
        Ok(()) => true,
        Err(e) => {
            error!("Target [ID:{}]: failed after retry: {}", chat_id, e);
            false
        }
    }
}

/// How long Telegram asked to wait, for flood-control errors only.
pub fn retry_delay(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(delay) => Some(*delay),
        _ => None,
    }
}

async fn try_send(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    reply_markup: Option<InlineKeyboardMarkup>,
) -> Result<(), RequestError> {
    let mut request = bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
    if let Some(markup) = reply_markup {
        request = request.reply_markup(markup);
    }
    request.await?;
    Ok(())
}

/// Sends the same message to every chat in order, pacing by [`MESSAGE_INTERVAL`].
/// Returns the number of delivered messages.
pub async fn broadcast(
    bot: &Bot,
    chat_ids: &[i64],
    text: &str,
    reply_markup: Option<InlineKeyboardMarkup>,
) -> usize {
    let mut delivered = 0;
    for chat_id in chat_ids {
        if send_message(bot, ChatId(*chat_id), text, reply_markup.clone()).await {
            delivered += 1;
        }
        tokio::time::sleep(MESSAGE_INTERVAL).await;
    }
    info!("Broadcast delivered {} of {} message(s)", delivered, chat_ids.len());
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::ApiError;

    #[test]
    fn test_retry_delay_only_for_flood_control() {
        assert_eq!(
            retry_delay(&RequestError::RetryAfter(Duration::from_secs(7))),
            Some(Duration::from_secs(7))
        );
        assert_eq!(retry_delay(&RequestError::Api(ApiError::BotBlocked)), None);
    }
}
