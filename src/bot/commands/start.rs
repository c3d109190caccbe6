use chrono::{Datelike, NaiveDate};
use teloxide::prelude::*;
use teloxide::types::{ParseMode, User};

use crate::bot::keyboards;
use crate::bot::texts::{self, MSG_DEEP_LINK_NOT_FOUND};
use crate::bot::{BotContext, HandlerResult};
use crate::database::models::{ClubUser, DeepLink, TelegramProfile};
use crate::utils::datetime::{local_today, month_name_uk};
use crate::utils::html::{clean_tag_message, escape_html, truncate_chars};
use crate::utils::logging::{log_command_start, log_database_operation};
use crate::utils::media::input_file;

pub const CAPTION_LIMIT: usize = 1024;
pub const MESSAGE_LIMIT: usize = 4096;

/// Values substituted into deep link templates.
#[derive(Debug, Clone)]
pub struct DeepLinkContext {
    pub user_id: i64,
    pub full_name: String,
    pub username: String,
    pub today: NaiveDate,
}

impl DeepLinkContext {
    pub fn from_user(user: &User, today: NaiveDate) -> Self {
        let full_name = user.full_name();
        Self {
            user_id: user.id.0 as i64,
            full_name: if full_name.trim().is_empty() { "Користувач".to_string() } else { full_name },
            username: user.username.clone().unwrap_or_default(),
            today,
        }
    }
}

/// Fills `{user_id}`, `{full_name}`, `{username}`, `{today}` and `{current_month}`.
pub fn render_deep_link(template: &str, context: &DeepLinkContext) -> String {
    let current_month = format!(
        "{}-{}",
        month_name_uk(context.today.month()).to_uppercase(),
        context.today.year()
    );
    clean_tag_message(template)
        .replace("{user_id}", &context.user_id.to_string())
        .replace("{full_name}", &escape_html(&context.full_name))
        .replace("{username}", &escape_html(&context.username))
        .replace("{today}", &context.today.format("%d.%m.%Y").to_string())
        .replace("{current_month}", &current_month)
}

async fn profile_photo(bot: &Bot, user: &User) -> Option<String> {
    let photos = bot.get_user_profile_photos(user.id).limit(1).await.ok()?;
    photos
        .photos
        .first()
        .and_then(|sizes| sizes.last())
        .map(|size| size.file.id.clone())
}

/// `/start [deep_link]`
pub async fn start(bot: Bot, msg: Message, argument: String, ctx: BotContext) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    log_command_start("start", user.id.0 as i64, msg.chat.id.0, Some(&argument));

    let profile = TelegramProfile {
        telegram_id: user.id.0 as i64,
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
        photo_id: profile_photo(&bot, user).await,
        language_code: user.language_code.clone(),
    };
    let (member, created) = ClubUser::get_or_create(ctx.pool(), &profile).await?;
    if created {
        log_database_operation("INSERT", "club_users", Some(&format!("new member {}", member.telegram_id)));
    }

    let argument = argument.trim();
    if !argument.is_empty() {
        send_deep_link(&bot, &msg, user, argument, &ctx).await?;
    }

    if member.is_profile_complete() {
        bot.send_message(msg.chat.id, texts::start_complete(&user.first_name))
            .parse_mode(ParseMode::Html)
            .await?;
    } else {
        bot.send_message(msg.chat.id, texts::start_incomplete(&user.first_name))
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboards::yes_no())
            .await?;
    }
    Ok(())
}

async fn send_deep_link(bot: &Bot, msg: &Message, user: &User, command: &str, ctx: &BotContext) -> HandlerResult {
    let Some(link) = DeepLink::find_by_command(ctx.pool(), command).await? else {
        bot.send_message(msg.chat.id, MSG_DEEP_LINK_NOT_FOUND).await?;
        return Ok(());
    };

    let text = render_deep_link(&link.text, &DeepLinkContext::from_user(user, local_today(ctx.tz())));
    match link.image.as_deref().filter(|image| !image.is_empty()) {
        Some(image) => {
            bot.send_photo(msg.chat.id, input_file(image))
                .caption(truncate_chars(&text, CAPTION_LIMIT))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, truncate_chars(&text, MESSAGE_LIMIT))
                .parse_mode(ParseMode::Html)
                .await?;
        }
    }
    Ok(())
}

pub async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, texts::help())
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn my_id(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let username = user.username.as_deref().map(|u| format!("@{u}")).unwrap_or_else(|| "-".to_string());
    let title = msg.chat.title().unwrap_or("-");

    bot.send_message(
        msg.chat.id,
        texts::my_id(&user.full_name(), &username, user.id.0 as i64, msg.chat.id.0, title),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_deep_link_placeholders() {
        let context = DeepLinkContext {
            user_id: 42,
            full_name: "Олена Коваль".into(),
            username: "olena".into(),
            today: NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(),
        };
        let text = render_deep_link(
            "<p>Привіт, <b>{full_name}</b>!</p> Внесок за {current_month}: user_id:{user_id} ({username}, {today})",
            &context,
        );
        assert_eq!(
            text,
            "Привіт, <b>Олена Коваль</b>! Внесок за БЕРЕЗЕНЬ-2025: user_id:42 (olena, 08.03.2025)"
        );
    }

    #[test]
    fn test_render_deep_link_escapes_profile_names() {
        let context = DeepLinkContext {
            user_id: 7,
            full_name: "Ігор <script> & Ко".into(),
            username: "a<b>".into(),
            today: NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(),
        };
        let text = render_deep_link("<b>{full_name}</b> @{username}", &context);
        assert_eq!(text, "<b>Ігор &lt;script&gt; &amp; Ко</b> @a&lt;b&gt;");
    }
}
