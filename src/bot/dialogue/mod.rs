/// Free-text comment after a training survey
pub mod comment;
/// Training creation wizard for staff members
pub mod create_training;
/// Step-by-step completion of missing profile fields
pub mod profile;

use teloxide::prelude::*;
use teloxide::types::{KeyboardRemove, ParseMode};

use super::texts::MSG_GENERIC_ERROR;
use super::{ClubDialogue, HandlerResult};

/// `/cancel` clears whatever conversation the chat is in.
pub async fn cancel(bot: Bot, msg: Message, dialogue: ClubDialogue) -> HandlerResult {
    dialogue.exit().await?;
    bot.send_message(msg.chat.id, "❌ Дію скасовано.")
        .reply_markup(KeyboardRemove::new())
        .await?;
    Ok(())
}

/// Resets the conversation after an unexpected failure so the user is not stuck mid-step.
pub async fn abort_with_error(bot: &Bot, chat_id: ChatId, dialogue: &ClubDialogue) -> HandlerResult {
    dialogue.exit().await?;
    bot.send_message(chat_id, MSG_GENERIC_ERROR)
        .parse_mode(ParseMode::Html)
        .reply_markup(KeyboardRemove::new())
        .await?;
    Ok(())
}
