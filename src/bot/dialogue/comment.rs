use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use tracing::warn;

use crate::bot::keyboards;
use crate::bot::texts::{self, MSG_COMMENT_PROMPT, MSG_COMMENT_THANKS, MSG_NOT_FOUND};
use crate::bot::{BotContext, ClubDialogue, HandlerResult, State};
use crate::database::models::{ClubUser, TrainingComment, TrainingEvent};
use crate::utils::logging::log_database_operation;

pub const MAX_COMMENT_CHARS: usize = 2000;

/// `comment_training_{id}`: asks for the comment text.
pub async fn request(bot: &Bot, chat_id: ChatId, dialogue: &ClubDialogue, training_id: i64) -> HandlerResult {
    let prompt = bot
        .send_message(chat_id, MSG_COMMENT_PROMPT)
        .reply_markup(keyboards::cancel_inline())
        .await?;
    dialogue
        .update(State::AwaitingComment { training_id, prompt_id: Some(prompt.id) })
        .await?;
    Ok(())
}

pub async fn receive(
    bot: Bot,
    msg: Message,
    dialogue: ClubDialogue,
    (training_id, prompt_id): (i64, Option<MessageId>),
    ctx: BotContext,
) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text().map(str::trim).filter(|t| !t.is_empty()) else {
        bot.send_message(msg.chat.id, "Будь ласка, надішліть коментар текстом.").await?;
        return Ok(());
    };
    if text.chars().count() > MAX_COMMENT_CHARS {
        bot.send_message(msg.chat.id, format!("Коментар задовгий, максимум {MAX_COMMENT_CHARS} символів."))
            .await?;
        return Ok(());
    }

    dialogue.exit().await?;
    if let Some(prompt_id) = prompt_id {
        bot.edit_message_reply_markup(msg.chat.id, prompt_id).await.ok();
    }

    let member = ClubUser::find_by_telegram_id(ctx.pool(), user.id.0 as i64).await?;
    let training = TrainingEvent::find_by_id(ctx.pool(), training_id).await?;
    let (Some(member), Some(training)) = (member, training) else {
        bot.send_message(msg.chat.id, MSG_NOT_FOUND).await?;
        return Ok(());
    };

    TrainingComment::create(ctx.pool(), training.id, member.id, text, true).await?;
    log_database_operation(
        "INSERT",
        "training_comments",
        Some(&format!("member {} on training {}", member.telegram_id, training.id)),
    );
    bot.send_message(msg.chat.id, MSG_COMMENT_THANKS).await?;

    if let Some(creator) = ClubUser::find_by_id(ctx.pool(), training.created_by).await? {
        if let Err(e) = bot
            .send_message(ChatId(creator.telegram_id), texts::comment_notification(&member, &training, text))
            .parse_mode(ParseMode::Html)
            .await
        {
            warn!("Could not notify creator {} about a comment: {}", creator.telegram_id, e);
        }
    }
    Ok(())
}
