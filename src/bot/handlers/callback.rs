use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{info, warn};

use crate::bot::commands::trainings;
use crate::bot::dialogue::{comment, create_training};
use crate::bot::dialogue::create_training::CreationStep;
use crate::bot::keyboards;
use crate::bot::texts::{self, MSG_ALREADY_PAST, MSG_ALREADY_REGISTERED, MSG_CANCELLED, MSG_FULL, MSG_NO_DISTANCES, MSG_NOT_FOUND};
use crate::bot::{BotContext, ClubDialogue, HandlerResult, State};
use crate::database::models::{ClubUser, TrainingEvent, TrainingRating};
use crate::services::registration::{self, RegistrationOutcome};
use crate::utils::validation::validate_rating;

/// Parsed `callback_data` of every inline button the bot sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    RegisterTraining(i64),
    ChooseDistance { training_id: i64, distance_id: i64 },
    Rate { training_id: i64, rating: i64 },
    Comment(i64),
    Publish(i64),
    Delete(i64),
    DeleteConfirm { training_id: i64, confirmed: bool },
    Revoke(i64),
    RevokeConfirm { training_id: i64, confirmed: bool },
    AddDistance,
    FinishTraining,
    Cancel,
    Close,
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

fn parse_pair(raw: &str) -> Option<(i64, i64)> {
    let (first, second) = raw.split_once('_')?;
    Some((parse_id(first)?, parse_id(second)?))
}

fn parse_confirmation(raw: &str) -> Option<(i64, bool)> {
    let (id, answer) = raw.split_once('_')?;
    let confirmed = match answer {
        "yes" => true,
        "no" => false,
        _ => return None,
    };
    Some((parse_id(id)?, confirmed))
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        use CallbackAction::*;

        match data {
            "add_distance" => return Some(AddDistance),
            "finish_training" => return Some(FinishTraining),
            "btn_cancel" => return Some(Cancel),
            "btn_close" => return Some(Close),
            _ => {}
        }

        if let Some(rest) = data.strip_prefix("register_training_") {
            parse_id(rest).map(RegisterTraining)
        } else if let Some(rest) = data.strip_prefix("distance_") {
            parse_pair(rest).map(|(training_id, distance_id)| ChooseDistance { training_id, distance_id })
        } else if let Some(rest) = data.strip_prefix("rate_training_") {
            parse_pair(rest).map(|(training_id, rating)| Rate { training_id, rating })
        } else if let Some(rest) = data.strip_prefix("comment_training_") {
            parse_id(rest).map(Comment)
        } else if let Some(rest) = data.strip_prefix("publish_training_") {
            parse_id(rest).map(Publish)
        } else if let Some(rest) = data.strip_prefix("delete_training_") {
            parse_id(rest).map(Delete)
        } else if let Some(rest) = data.strip_prefix("delete_confirm_") {
            parse_confirmation(rest).map(|(training_id, confirmed)| DeleteConfirm { training_id, confirmed })
        } else if let Some(rest) = data.strip_prefix("revoke_training_") {
            parse_id(rest).map(Revoke)
        } else if let Some(rest) = data.strip_prefix("revoke_confirm_") {
            parse_confirmation(rest).map(|(training_id, confirmed)| RevokeConfirm { training_id, confirmed })
        } else {
            None
        }
    }
}

async fn answer(bot: &Bot, q: &CallbackQuery) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn alert(bot: &Bot, q: &CallbackQuery, text: &str) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).text(text).show_alert(true).await?;
    Ok(())
}

/// Removes the buttons from the message the callback came from.
async fn clear_buttons(bot: &Bot, q: &CallbackQuery) {
    if let Some(message) = &q.message {
        if let Err(e) = bot.edit_message_reply_markup(message.chat.id, message.id).await {
            warn!("Could not clear buttons on message {}: {}", message.id, e);
        }
    }
}

pub async fn callback_handler(bot: Bot, q: CallbackQuery, dialogue: ClubDialogue, ctx: BotContext) -> HandlerResult {
    let user_id = q.from.id.0 as i64;
    let Some(data) = q.data.as_deref() else {
        return answer(&bot, &q).await;
    };
    let Some(chat_id) = q.message.as_ref().map(|m| m.chat.id) else {
        return answer(&bot, &q).await;
    };
    info!("Callback received: '{}' from user {} in chat {}", data, user_id, chat_id);

    let Some(action) = CallbackAction::parse(data) else {
        warn!("Unknown callback data: '{}'", data);
        return alert(&bot, &q, "Невідома дія").await;
    };

    match action {
        CallbackAction::RegisterTraining(training_id) => {
            let outcome = registration::register(ctx.pool(), training_id, user_id, None).await?;
            handle_registration(&bot, &q, outcome, &ctx).await?;
        }
        CallbackAction::ChooseDistance { training_id, distance_id } => {
            let outcome = registration::register(ctx.pool(), training_id, user_id, Some(distance_id)).await?;
            if let Some(message) = q.message.as_ref().filter(|_| outcome.closes_distance_choice()) {
                bot.delete_message(message.chat.id, message.id).await.ok();
            }
            handle_registration(&bot, &q, outcome, &ctx).await?;
        }
        CallbackAction::Rate { training_id, rating } => rate(&bot, &q, training_id, rating, &ctx).await?,
        CallbackAction::Comment(training_id) => {
            answer(&bot, &q).await?;
            comment::request(&bot, chat_id, &dialogue, training_id).await?;
        }
        CallbackAction::Publish(training_id) => {
            answer(&bot, &q).await?;
            trainings::publish(&bot, chat_id, user_id, training_id, &ctx).await?;
        }
        CallbackAction::Delete(training_id) => {
            answer(&bot, &q).await?;
            trainings::request_delete(&bot, chat_id, user_id, training_id, &ctx).await?;
        }
        CallbackAction::DeleteConfirm { training_id, confirmed } => {
            answer(&bot, &q).await?;
            clear_buttons(&bot, &q).await;
            trainings::confirm_delete(&bot, chat_id, user_id, training_id, confirmed, &ctx).await?;
        }
        CallbackAction::Revoke(training_id) => {
            answer(&bot, &q).await?;
            trainings::request_revoke(&bot, chat_id, user_id, training_id, &ctx).await?;
        }
        CallbackAction::RevokeConfirm { training_id, confirmed } => {
            answer(&bot, &q).await?;
            clear_buttons(&bot, &q).await;
            trainings::confirm_revoke(&bot, chat_id, user_id, training_id, confirmed, &ctx).await?;
        }
        CallbackAction::AddDistance | CallbackAction::FinishTraining => {
            let Some(State::CreateTraining { draft, step: CreationStep::Review }) = dialogue.get().await? else {
                return alert(&bot, &q, "Ця дія вже неактуальна").await;
            };
            answer(&bot, &q).await?;
            clear_buttons(&bot, &q).await;
            if action == CallbackAction::AddDistance {
                create_training::add_distance(&bot, chat_id, &dialogue, draft).await?;
            } else {
                create_training::finish(&bot, chat_id, user_id, &dialogue, draft, &ctx).await?;
            }
        }
        CallbackAction::Cancel => {
            answer(&bot, &q).await?;
            let state = dialogue.get().await?;
            dialogue.exit().await?;
            if let Some(State::AwaitingComment { prompt_id: Some(prompt_id), .. }) = state {
                bot.delete_message(chat_id, prompt_id).await.ok();
            }
            if let Some(message) = &q.message {
                bot.delete_message(chat_id, message.id).await.ok();
            }
        }
        CallbackAction::Close => {
            answer(&bot, &q).await?;
            if let Some(message) = &q.message {
                bot.delete_message(chat_id, message.id).await.ok();
            }
        }
    }
    Ok(())
}

/// Replies go to the member's private chat so group announcements stay clean.
async fn handle_registration(bot: &Bot, q: &CallbackQuery, outcome: RegistrationOutcome, ctx: &BotContext) -> HandlerResult {
    let member_chat = ChatId(q.from.id.0 as i64);
    let tz = ctx.tz();

    match outcome {
        RegistrationOutcome::NotFound => alert(bot, q, MSG_NOT_FOUND).await,
        RegistrationOutcome::Cancelled => alert(bot, q, MSG_CANCELLED).await,
        RegistrationOutcome::AlreadyPast => alert(bot, q, MSG_ALREADY_PAST).await,
        RegistrationOutcome::AlreadyRegistered => alert(bot, q, MSG_ALREADY_REGISTERED).await,
        RegistrationOutcome::NoDistances => alert(bot, q, MSG_NO_DISTANCES).await,
        RegistrationOutcome::Full => alert(bot, q, MSG_FULL).await,
        RegistrationOutcome::ChooseDistance { training, distances } => {
            let sent = bot
                .send_message(member_chat, texts::choose_distance(&training, tz))
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::distance_choice(training.id, &distances))
                .await;
            match sent {
                Ok(_) => answer(bot, q).await,
                Err(_) => alert(bot, q, "Спершу напишіть боту /start в особисті повідомлення").await,
            }
        }
        RegistrationOutcome::Registered { training, distance, participant, .. } => {
            answer(bot, q).await?;
            bot.send_message(member_chat, texts::registration_success(&participant, &training, &distance, tz))
                .parse_mode(ParseMode::Html)
                .await
                .ok();

            if let Some(creator) = ClubUser::find_by_id(ctx.pool(), training.created_by).await? {
                let notification = texts::creator_notification(&participant, &training, &distance, tz);
                if let Err(e) = bot
                    .send_message(ChatId(creator.telegram_id), notification)
                    .parse_mode(ParseMode::Html)
                    .await
                {
                    warn!("Could not notify creator {} about a registration: {}", creator.telegram_id, e);
                }
            }
            Ok(())
        }
    }
}

async fn rate(bot: &Bot, q: &CallbackQuery, training_id: i64, rating: i64, ctx: &BotContext) -> HandlerResult {
    let Ok(rating) = validate_rating(rating) else {
        return alert(bot, q, "Оцінка має бути від 1 до 5").await;
    };
    let member = ClubUser::find_by_telegram_id(ctx.pool(), q.from.id.0 as i64).await?;
    let training = TrainingEvent::find_by_id(ctx.pool(), training_id).await?;
    let (Some(member), Some(training)) = (member, training) else {
        return alert(bot, q, MSG_NOT_FOUND).await;
    };

    TrainingRating::upsert(ctx.pool(), training.id, member.id, rating).await?;
    answer(bot, q).await?;

    if let Some(message) = &q.message {
        bot.edit_message_text(message.chat.id, message.id, texts::rating_thanks(rating))
            .await
            .ok();
    }
    Ok(())
}
