use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::bot::{BotContext, HandlerResult};
use crate::services::weather::{current_forecast, OpenWeatherClient};
use crate::utils::logging::{log_command_start, log_external_error};

/// `/weather_now`
pub async fn weather_now(bot: Bot, msg: Message, ctx: BotContext) -> HandlerResult {
    let user_id = msg.from().map(|u| u.id.0 as i64).unwrap_or(0);
    log_command_start("weather_now", user_id, msg.chat.id.0, None);

    let Some(api_key) = ctx.config.weather_api_key.as_deref() else {
        bot.send_message(msg.chat.id, "⚠️ Прогноз погоди не налаштовано.").await?;
        return Ok(());
    };

    let client = OpenWeatherClient::new(api_key);
    let text = match current_forecast(&client, ctx.config.city_coordinates, ctx.tz()).await {
        Ok(text) => text,
        Err(e) => {
            log_external_error("openweathermap", "forecast", &e.to_string());
            "❌ Не вдалося отримати прогноз погоди. Спробуйте пізніше.".to_string()
        }
    };

    bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}
