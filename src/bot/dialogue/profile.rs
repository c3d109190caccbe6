use chrono::NaiveDate;
use teloxide::prelude::*;
use teloxide::types::{KeyboardMarkup, KeyboardRemove};

use crate::bot::keyboards::{self, BTN_CANCEL};
use crate::bot::texts::{MSG_PROFILE_CANCELLED, MSG_PROFILE_LATER, MSG_PROFILE_UPDATED};
use crate::bot::{BotContext, ClubDialogue, HandlerResult, State};
use crate::database::models::{ClubUser, ProfileField};
use crate::utils::datetime::local_today;
use crate::utils::logging::{log_database_operation, log_validation_error};
use crate::utils::validation::{normalize_phone, validate_date_of_birth, validate_person_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKeyboard {
    CancelOnly,
    ContactAndCancel,
}

/// How one profile field is asked for and checked.
#[derive(Debug)]
pub struct FieldDescriptor {
    pub field: ProfileField,
    pub prompt: &'static str,
    pub keyboard: FieldKeyboard,
    pub error: &'static str,
}

/// Asked in this order, skipping fields that are already filled.
pub const FIELDS: [FieldDescriptor; 4] = [
    FieldDescriptor {
        field: ProfileField::FirstName,
        prompt: "✍️ Введіть ваше ім'я:",
        keyboard: FieldKeyboard::CancelOnly,
        error: "❗ Ім'я повинно містити від 3 до 18 символів",
    },
    FieldDescriptor {
        field: ProfileField::LastName,
        prompt: "✍️ Введіть ваше прізвище:",
        keyboard: FieldKeyboard::CancelOnly,
        error: "❗ Прізвище повинно містити від 3 до 18 символів",
    },
    FieldDescriptor {
        field: ProfileField::PhoneNumber,
        prompt: "📱 Поділіться своїм номером телефону, натиснувши кнопку нижче 👇",
        keyboard: FieldKeyboard::ContactAndCancel,
        error: "Хибні дані. Будь ласка, скористайтесь кнопкою знизу 👇",
    },
    FieldDescriptor {
        field: ProfileField::DateOfBirth,
        prompt: "🎂 Введіть дату народження у форматі DD.MM.YYYY (наприклад 31.12.2000):",
        keyboard: FieldKeyboard::CancelOnly,
        error: "❗ Невірний формат або дата у майбутньому. Використовуйте DD.MM.YYYY",
    },
];

/// What the member sent in reply to a prompt.
#[derive(Debug, Clone, Copy)]
pub enum FieldInput<'a> {
    Text(&'a str),
    Contact { owner: Option<UserId>, phone: &'a str },
    Other,
}

impl<'a> FieldInput<'a> {
    pub fn from_message(msg: &'a Message) -> Self {
        if let Some(contact) = msg.contact() {
            return FieldInput::Contact {
                owner: contact.user_id,
                phone: &contact.phone_number,
            };
        }
        match msg.text() {
            Some(text) => FieldInput::Text(text),
            None => FieldInput::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
}

pub fn descriptor(field: ProfileField) -> &'static FieldDescriptor {
    match field {
        ProfileField::FirstName => &FIELDS[0],
        ProfileField::LastName => &FIELDS[1],
        ProfileField::PhoneNumber => &FIELDS[2],
        ProfileField::DateOfBirth => &FIELDS[3],
    }
}

impl FieldDescriptor {
    pub fn keyboard_markup(&self) -> KeyboardMarkup {
        match self.keyboard {
            FieldKeyboard::CancelOnly => keyboards::cancel(),
            FieldKeyboard::ContactAndCancel => keyboards::contact_and_cancel(),
        }
    }

    /// Checks the reply and returns the value to store, or this field's error text.
    pub fn validate(
        &self,
        input: FieldInput<'_>,
        sender: UserId,
        today: NaiveDate,
    ) -> Result<FieldValue, &'static str> {
        let value = match (self.field, input) {
            (ProfileField::FirstName | ProfileField::LastName, FieldInput::Text(text)) => {
                validate_person_name(text).map(FieldValue::Text).ok()
            }
            (ProfileField::PhoneNumber, FieldInput::Contact { owner, phone }) if owner == Some(sender) => {
                normalize_phone(phone).map(FieldValue::Text).ok()
            }
            (ProfileField::DateOfBirth, FieldInput::Text(text)) => {
                validate_date_of_birth(text, today).map(FieldValue::Date).ok()
            }
            _ => None,
        };
        value.ok_or(self.error)
    }
}

async fn store(pool: &sqlx::SqlitePool, member_id: i64, field: ProfileField, value: FieldValue) -> Result<(), sqlx::Error> {
    match (field, value) {
        (ProfileField::FirstName, FieldValue::Text(v)) => ClubUser::update_first_name(pool, member_id, &v).await,
        (ProfileField::LastName, FieldValue::Text(v)) => ClubUser::update_last_name(pool, member_id, &v).await,
        (ProfileField::PhoneNumber, FieldValue::Text(v)) => ClubUser::update_phone(pool, member_id, &v).await,
        (ProfileField::DateOfBirth, FieldValue::Date(d)) => ClubUser::update_date_of_birth(pool, member_id, d).await,
        _ => Ok(()),
    }
}

async fn ask(bot: &Bot, chat_id: ChatId, field: ProfileField) -> HandlerResult {
    let descriptor = descriptor(field);
    bot.send_message(chat_id, descriptor.prompt)
        .reply_markup(descriptor.keyboard_markup())
        .await?;
    Ok(())
}

/// "Так" on the start prompt: walk the missing fields in order.
pub async fn accept(bot: Bot, msg: Message, dialogue: ClubDialogue, ctx: BotContext) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(member) = ClubUser::find_by_telegram_id(ctx.pool(), user.id.0 as i64).await? else {
        bot.send_message(msg.chat.id, "Спершу надішліть /start").await?;
        return Ok(());
    };

    let remaining = member.missing_profile_fields();
    let Some(first) = remaining.first().copied() else {
        bot.send_message(msg.chat.id, "✅ Ваш профіль вже заповнено.")
            .reply_markup(KeyboardRemove::new())
            .await?;
        return Ok(());
    };

    dialogue.update(State::Profile { remaining }).await?;
    ask(&bot, msg.chat.id, first).await
}

/// "Ні" on the start prompt.
pub async fn decline(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, MSG_PROFILE_LATER)
        .reply_markup(KeyboardRemove::new())
        .await?;
    Ok(())
}

pub async fn receive_field(
    bot: Bot,
    msg: Message,
    dialogue: ClubDialogue,
    remaining: Vec<ProfileField>,
    ctx: BotContext,
) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };

    if msg.text() == Some(BTN_CANCEL) {
        dialogue.exit().await?;
        bot.send_message(msg.chat.id, MSG_PROFILE_CANCELLED)
            .reply_markup(KeyboardRemove::new())
            .await?;
        return Ok(());
    }

    let Some((&current, rest)) = remaining.split_first() else {
        dialogue.exit().await?;
        return Ok(());
    };
    let Some(member) = ClubUser::find_by_telegram_id(ctx.pool(), user.id.0 as i64).await? else {
        return super::abort_with_error(&bot, msg.chat.id, &dialogue).await;
    };

    let descriptor = descriptor(current);
    let value = match descriptor.validate(FieldInput::from_message(&msg), user.id, local_today(ctx.tz())) {
        Ok(value) => value,
        Err(error) => {
            log_validation_error(&format!("{current:?}"), msg.text().unwrap_or("<non-text>"), error, member.telegram_id);
            bot.send_message(msg.chat.id, error)
                .reply_markup(descriptor.keyboard_markup())
                .await?;
            return Ok(());
        }
    };

    store(ctx.pool(), member.id, current, value).await?;
    log_database_operation("UPDATE", "club_users", Some(&format!("member {} set {:?}", member.telegram_id, current)));

    match rest.first().copied() {
        Some(next) => {
            dialogue.update(State::Profile { remaining: rest.to_vec() }).await?;
            ask(&bot, msg.chat.id, next).await
        }
        None => {
            dialogue.exit().await?;
            bot.send_message(msg.chat.id, MSG_PROFILE_UPDATED)
                .reply_markup(KeyboardRemove::new())
                .await?;
            Ok(())
        }
    }
}
