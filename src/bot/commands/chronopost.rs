use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::bot::texts::{self, MSG_STAFF_ONLY};
use crate::bot::{BotContext, HandlerResult};
use crate::database::models::ScheduledMessage;
use crate::services::chronopost::send_scheduled;
use crate::utils::logging::log_command_start;

pub const INACTIVE_LIST_LIMIT: i64 = 10;

async fn is_staff(ctx: &BotContext, msg: &Message) -> HandlerResult<bool> {
    let Some(user) = msg.from() else {
        return Ok(false);
    };
    Ok(ctx.staff_member(user.id.0 as i64).await?.is_some())
}

/// `/chronoposts`
pub async fn list(bot: Bot, msg: Message, ctx: BotContext) -> HandlerResult {
    log_command_start("chronoposts", msg.from().map(|u| u.id.0 as i64).unwrap_or(0), msg.chat.id.0, None);
    if !is_staff(&ctx, &msg).await? {
        bot.send_message(msg.chat.id, MSG_STAFF_ONLY).await?;
        return Ok(());
    }

    let messages = ScheduledMessage::inactive(ctx.pool(), INACTIVE_LIST_LIMIT).await?;
    bot.send_message(msg.chat.id, texts::chronopost_list(&messages, ctx.tz()))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// `/chrono_preview_{id}`: the post as the club chat would receive it.
pub async fn preview(bot: Bot, msg: Message, message_id: i64, ctx: BotContext) -> HandlerResult {
    if !is_staff(&ctx, &msg).await? {
        bot.send_message(msg.chat.id, MSG_STAFF_ONLY).await?;
        return Ok(());
    }

    match ScheduledMessage::find_by_id(ctx.pool(), message_id).await? {
        Some(message) => send_scheduled(&bot, msg.chat.id, &message).await?,
        None => {
            bot.send_message(msg.chat.id, "❌ Хронопост не знайдено.").await?;
        }
    }
    Ok(())
}
