//! Staff-side training management and the member's own registrations.

use chrono_tz::Tz;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::RequestError;
use tracing::warn;

use crate::bot::keyboards;
use crate::bot::texts::{self, MSG_ALREADY_PAST, MSG_CANCELLED, MSG_STAFF_ONLY};
use crate::bot::{BotContext, HandlerResult};
use crate::database::models::{
    ClubUser, TrainingDistance, TrainingEvent, TrainingMessage, TrainingRegistration,
};
use crate::services::broadcaster;
use crate::services::registration::{self, UnregisterOutcome};
use crate::utils::logging::{log_command_start, log_command_success, log_database_operation};
use crate::utils::media::input_file;

pub const STAFF_LIST_LIMIT: i64 = 10;
const CAPTION_LIMIT: usize = 1024;
const CANCELLATION_REASON: &str = "адміністративне рішення";
const MSG_TRAINING_NOT_FOUND: &str = "❌ Тренування не знайдено.";

/// Sends the training card, as a photo caption when there is a poster.
/// Returns the message that carries `markup`.
#[allow(clippy::too_many_arguments)]
pub async fn send_training_card(
    bot: &Bot,
    chat_id: ChatId,
    training: &TrainingEvent,
    distances: &[TrainingDistance],
    organizer: &str,
    registrations: i64,
    tz: Tz,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<Message, RequestError> {
    let text = texts::training_card(training, distances, organizer, registrations, tz);

    if let Some(poster) = training.poster.as_deref().filter(|p| !p.is_empty()) {
        if text.chars().count() <= CAPTION_LIMIT {
            let mut request = bot
                .send_photo(chat_id, input_file(poster))
                .caption(text)
                .parse_mode(ParseMode::Html);
            if let Some(markup) = markup {
                request = request.reply_markup(markup);
            }
            return request.await;
        }
        bot.send_photo(chat_id, input_file(poster)).await?;
    }

    let mut request = bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
    if let Some(markup) = markup {
        request = request.reply_markup(markup);
    }
    request.await
}

async fn organizer_name(ctx: &BotContext, training: &TrainingEvent) -> Result<String, sqlx::Error> {
    Ok(ClubUser::find_by_id(ctx.pool(), training.created_by)
        .await?
        .map(|creator| creator.full_name())
        .unwrap_or_else(|| "-".to_string()))
}

/// Staff lookup shared by every management action; replies when access is refused.
async fn require_staff(bot: &Bot, chat_id: ChatId, user_id: i64, ctx: &BotContext) -> Result<Option<ClubUser>, RequestError> {
    match ctx.staff_member(user_id).await {
        Ok(Some(staff)) => Ok(Some(staff)),
        Ok(None) => {
            bot.send_message(chat_id, MSG_STAFF_ONLY).await?;
            Ok(None)
        }
        Err(e) => {
            warn!("Staff lookup for {} failed: {}", user_id, e);
            bot.send_message(chat_id, texts::MSG_GENERIC_ERROR).await?;
            Ok(None)
        }
    }
}

async fn find_training(bot: &Bot, chat_id: ChatId, training_id: i64, ctx: &BotContext) -> HandlerResult<Option<TrainingEvent>> {
    let training = TrainingEvent::find_by_id(ctx.pool(), training_id).await?;
    if training.is_none() {
        bot.send_message(chat_id, MSG_TRAINING_NOT_FOUND).await?;
    }
    Ok(training)
}

/// `/trainings`
pub async fn list(bot: Bot, msg: Message, ctx: BotContext) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    log_command_start("trainings", user.id.0 as i64, msg.chat.id.0, None);
    let Some(staff) = require_staff(&bot, msg.chat.id, user.id.0 as i64, &ctx).await? else {
        return Ok(());
    };

    let trainings = TrainingEvent::upcoming_by_creator(ctx.pool(), staff.id, STAFF_LIST_LIMIT).await?;
    bot.send_message(msg.chat.id, texts::staff_trainings(&trainings, ctx.tz()))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// `/get_training_{id}`
pub async fn show(bot: Bot, msg: Message, training_id: i64, ctx: BotContext) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    if require_staff(&bot, msg.chat.id, user.id.0 as i64, &ctx).await?.is_none() {
        return Ok(());
    }
    let Some(training) = find_training(&bot, msg.chat.id, training_id, &ctx).await? else {
        return Ok(());
    };

    let distances = TrainingDistance::for_training(ctx.pool(), training.id).await?;
    let registrations = training.participant_count(ctx.pool()).await?;
    let organizer = organizer_name(&ctx, &training).await?;
    let markup = (!training.is_cancelled).then(|| keyboards::training_management(training.id));

    send_training_card(&bot, msg.chat.id, &training, &distances, &organizer, registrations, ctx.tz(), markup).await?;
    Ok(())
}

/// `/my_trainings`
pub async fn my_trainings(bot: Bot, msg: Message, ctx: BotContext) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(member) = ClubUser::find_by_telegram_id(ctx.pool(), user.id.0 as i64).await? else {
        bot.send_message(msg.chat.id, "Спершу надішліть /start").await?;
        return Ok(());
    };

    let registrations = TrainingRegistration::for_participant_upcoming(ctx.pool(), member.id).await?;
    bot.send_message(msg.chat.id, texts::my_registrations(&registrations, ctx.tz()))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// `/unregister_training_{id}`
pub async fn unregister(bot: Bot, msg: Message, training_id: i64, ctx: BotContext) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };

    let reply = match registration::unregister(ctx.pool(), training_id, user.id.0 as i64).await? {
        UnregisterOutcome::Unregistered { training, .. } => texts::unregistered(&training, ctx.tz()),
        UnregisterOutcome::NotRegistered => "⚠️ Ви не зареєстровані на це тренування.".to_string(),
        UnregisterOutcome::NotFound => texts::MSG_NOT_FOUND.to_string(),
    };
    bot.send_message(msg.chat.id, reply).parse_mode(ParseMode::Html).await?;
    Ok(())
}

/// `publish_training_{id}`: posts the announcement into the club chat.
pub async fn publish(bot: &Bot, chat_id: ChatId, user_id: i64, training_id: i64, ctx: &BotContext) -> HandlerResult {
    if require_staff(bot, chat_id, user_id, ctx).await?.is_none() {
        return Ok(());
    }
    let Some(training) = find_training(bot, chat_id, training_id, ctx).await? else {
        return Ok(());
    };
    if training.is_cancelled {
        bot.send_message(chat_id, MSG_CANCELLED).await?;
        return Ok(());
    }
    if training.is_past() {
        bot.send_message(chat_id, MSG_ALREADY_PAST).await?;
        return Ok(());
    }
    let club_chat = ctx.config.default_chat_id;
    if club_chat == 0 {
        bot.send_message(chat_id, "⚠️ Чат клубу не налаштовано (DEFAULT_CHAT_ID).").await?;
        return Ok(());
    }

    let distances = TrainingDistance::for_training(ctx.pool(), training.id).await?;
    let registrations = training.participant_count(ctx.pool()).await?;
    let organizer = organizer_name(ctx, &training).await?;
    let announcement = send_training_card(
        bot,
        ChatId(club_chat),
        &training,
        &distances,
        &organizer,
        registrations,
        ctx.tz(),
        Some(keyboards::register_training(training.id)),
    )
    .await?;

    TrainingMessage::create(ctx.pool(), training.id, club_chat, i64::from(announcement.id.0)).await?;
    log_command_success("publish_training", user_id, chat_id.0, Some(&format!("training {}", training.id)));
    bot.send_message(chat_id, "✅ Тренування анонсовано в чаті клубу.").await?;
    Ok(())
}

/// A future training with registrations must be revoked instead of deleted.
fn deletion_blocked(training: &TrainingEvent, participants: i64) -> bool {
    !training.is_past() && !training.is_cancelled && participants > 0
}

/// `delete_training_{id}`
pub async fn request_delete(bot: &Bot, chat_id: ChatId, user_id: i64, training_id: i64, ctx: &BotContext) -> HandlerResult {
    if require_staff(bot, chat_id, user_id, ctx).await?.is_none() {
        return Ok(());
    }
    let Some(training) = find_training(bot, chat_id, training_id, ctx).await? else {
        return Ok(());
    };

    let participants = training.participant_count(ctx.pool()).await?;
    if deletion_blocked(&training, participants) {
        bot.send_message(chat_id, texts::delete_blocked(&training, participants))
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboards::revoke_offer(training.id))
            .await?;
    } else {
        bot.send_message(chat_id, texts::delete_confirmation(&training, participants))
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboards::delete_confirmation(training.id))
            .await?;
    }
    Ok(())
}

/// `delete_confirm_{id}_yes|no`
pub async fn confirm_delete(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    training_id: i64,
    confirmed: bool,
    ctx: &BotContext,
) -> HandlerResult {
    if !confirmed {
        bot.send_message(chat_id, "↩️ Видалення скасовано.").await?;
        return Ok(());
    }
    if require_staff(bot, chat_id, user_id, ctx).await?.is_none() {
        return Ok(());
    }
    let Some(training) = find_training(bot, chat_id, training_id, ctx).await? else {
        return Ok(());
    };

    let participants = training.participant_count(ctx.pool()).await?;
    if deletion_blocked(&training, participants) {
        bot.send_message(chat_id, texts::delete_blocked(&training, participants))
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboards::revoke_offer(training.id))
            .await?;
        return Ok(());
    }

    for announcement in TrainingMessage::for_training(ctx.pool(), training.id).await? {
        let message_id = MessageId(announcement.message_id as i32);
        if let Err(e) = bot.delete_message(ChatId(announcement.chat_id), message_id).await {
            warn!("Could not delete announcement {} of training {}: {}", announcement.message_id, training.id, e);
        }
    }

    if TrainingEvent::delete(ctx.pool(), training.id).await? {
        log_database_operation("DELETE", "training_events", Some(&format!("training {}", training.id)));
        bot.send_message(
            chat_id,
            format!("🗑 Тренування «{}» видалено.", crate::utils::html::escape_html(&training.title)),
        )
        .parse_mode(ParseMode::Html)
        .await?;
    } else {
        bot.send_message(chat_id, MSG_TRAINING_NOT_FOUND).await?;
    }
    Ok(())
}

/// `revoke_training_{id}`
pub async fn request_revoke(bot: &Bot, chat_id: ChatId, user_id: i64, training_id: i64, ctx: &BotContext) -> HandlerResult {
    if require_staff(bot, chat_id, user_id, ctx).await?.is_none() {
        return Ok(());
    }
    let Some(training) = find_training(bot, chat_id, training_id, ctx).await? else {
        return Ok(());
    };
    if training.is_cancelled {
        bot.send_message(chat_id, MSG_CANCELLED).await?;
        return Ok(());
    }
    if training.is_past() {
        bot.send_message(chat_id, MSG_ALREADY_PAST).await?;
        return Ok(());
    }

    bot.send_message(chat_id, texts::revoke_confirmation(&training))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::revoke_confirmation(training.id))
        .await?;
    Ok(())
}

/// `revoke_confirm_{id}_yes|no`: cancels the training and notifies every participant.
pub async fn confirm_revoke(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    training_id: i64,
    confirmed: bool,
    ctx: &BotContext,
) -> HandlerResult {
    if !confirmed {
        bot.send_message(chat_id, "↩️ Тренування залишається в розкладі.").await?;
        return Ok(());
    }
    if require_staff(bot, chat_id, user_id, ctx).await?.is_none() {
        return Ok(());
    }
    let Some(training) = find_training(bot, chat_id, training_id, ctx).await? else {
        return Ok(());
    };
    if training.is_cancelled {
        bot.send_message(chat_id, MSG_CANCELLED).await?;
        return Ok(());
    }

    TrainingEvent::cancel(ctx.pool(), training.id, Some(CANCELLATION_REASON)).await?;
    log_database_operation("UPDATE", "training_events", Some(&format!("training {} cancelled", training.id)));

    // Announcements lose their registration button.
    for announcement in TrainingMessage::for_training(ctx.pool(), training.id).await? {
        let message_id = MessageId(announcement.message_id as i32);
        if let Err(e) = bot
            .edit_message_reply_markup(ChatId(announcement.chat_id), message_id)
            .await
        {
            warn!("Could not update announcement {} of training {}: {}", announcement.message_id, training.id, e);
        }
    }

    let participants = TrainingRegistration::participants_of(ctx.pool(), training.id).await?;
    let notice = texts::cancellation_notice(&training, ctx.tz());
    let notified = broadcaster::broadcast(bot, &participants, &notice, None).await;

    bot.send_message(chat_id, texts::cancellation_confirmation(&training, notified, ctx.tz()))
        .parse_mode(ParseMode::Html)
        .await?;
    log_command_success("revoke_training", user_id, chat_id.0, Some(&format!("{notified} notified")));
    Ok(())
}
