use teloxide::prelude::*;

use crate::bot::commands::{chronopost, quiz, start, trainings, weather, Command, DynamicCommand};
use crate::bot::dialogue::{self, create_training};
use crate::bot::{BotContext, ClubDialogue, HandlerResult};
use crate::utils::logging::log_command_error;

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: ClubDialogue,
    ctx: BotContext,
) -> HandlerResult {
    let user_id = msg.from().map(|u| u.id.0 as i64).unwrap_or(0);
    let chat_id = msg.chat.id.0;
    let name = format!("{cmd:?}");

    let result = match cmd {
        Command::Start(argument) => start::start(bot, msg, argument, ctx).await,
        Command::Help => start::help(bot, msg).await,
        Command::MyId => start::my_id(bot, msg).await,
        Command::WeatherNow => weather::weather_now(bot, msg, ctx).await,
        Command::MyTrainings => trainings::my_trainings(bot, msg, ctx).await,
        Command::CreateTraining => create_training::start(bot, msg, dialogue, ctx).await,
        Command::Trainings => trainings::list(bot, msg, ctx).await,
        Command::Chronoposts => chronopost::list(bot, msg, ctx).await,
        Command::Quiz => quiz::quiz(bot, msg, ctx).await,
        Command::Cancel => dialogue::cancel(bot, msg, dialogue).await,
    };

    if let Err(e) = &result {
        log_command_error(&name, user_id, chat_id, &e.to_string());
    }
    result
}

pub async fn dynamic_command_handler(
    bot: Bot,
    msg: Message,
    cmd: DynamicCommand,
    ctx: BotContext,
) -> HandlerResult {
    match cmd {
        DynamicCommand::GetTraining(id) => trainings::show(bot, msg, id, ctx).await,
        DynamicCommand::UnregisterTraining(id) => trainings::unregister(bot, msg, id, ctx).await,
        DynamicCommand::ChronoPreview(id) => chronopost::preview(bot, msg, id, ctx).await,
    }
}
