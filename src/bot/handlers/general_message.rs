use teloxide::prelude::*;
use teloxide::types::KeyboardRemove;

use crate::bot::dialogue::profile;
use crate::bot::keyboards::{BTN_CANCEL, BTN_NO, BTN_YES};
use crate::bot::texts::MSG_PROFILE_CANCELLED;
use crate::bot::{BotContext, ClubDialogue, HandlerResult};
use crate::utils::feedback::CommandFeedback;

/// Messages outside any conversation: the start prompt answers and unknown commands.
pub async fn handle_general_message(
    bot: Bot,
    msg: Message,
    dialogue: ClubDialogue,
    ctx: BotContext,
) -> HandlerResult {
    let Some(text) = msg.text().map(str::to_owned) else {
        return Ok(());
    };

    match text.as_str() {
        BTN_YES => profile::accept(bot, msg, dialogue, ctx).await,
        BTN_NO => profile::decline(bot, msg).await,
        BTN_CANCEL => {
            dialogue.exit().await?;
            bot.send_message(msg.chat.id, MSG_PROFILE_CANCELLED)
                .reply_markup(KeyboardRemove::new())
                .await?;
            Ok(())
        }
        // Group chats are noisy; only private chats get hints.
        _ if !msg.chat.is_private() => Ok(()),
        _ if text.starts_with('/') => {
            let command = text.split_whitespace().next().unwrap_or_default();
            CommandFeedback::new(bot, msg.chat.id)
                .validation_error(&format!("Невідома команда: {command}"), "Список команд: /help")
                .await?;
            Ok(())
        }
        _ => Ok(()),
    }
}
