pub mod chronopost;
pub mod quiz;
pub mod start;
pub mod trainings;
pub mod weather;

use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Команди бота бігового клубу:")]
pub enum Command {
    #[command(description = "почати роботу з ботом")]
    Start(String),
    #[command(description = "довідка")]
    Help,
    #[command(description = "інформація про ваш профіль і чат")]
    MyId,
    #[command(description = "прогноз погоди на сьогодні")]
    WeatherNow,
    #[command(description = "мої реєстрації на тренування")]
    MyTrainings,
    #[command(description = "створити тренування")]
    CreateTraining,
    #[command(description = "мої майбутні тренування")]
    Trainings,
    #[command(description = "неактивні хронопости")]
    Chronoposts,
    #[command(description = "надіслати вікторину в чат клубу")]
    Quiz,
    #[command(description = "перервати поточну дію")]
    Cancel,
}

/// Commands that carry an id in their name, like `/get_training_12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicCommand {
    GetTraining(i64),
    UnregisterTraining(i64),
    ChronoPreview(i64),
}

impl DynamicCommand {
    /// Parses the first word of a message; a `@bot_username` suffix must match when present.
    pub fn parse(text: &str, bot_username: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        let command = match word.split_once('@') {
            Some((command, mention)) if mention.eq_ignore_ascii_case(bot_username) => command,
            Some(_) => return None,
            None => word,
        };

        let id = |prefix: &str| command.strip_prefix(prefix).and_then(|id| id.parse::<i64>().ok());

        if let Some(id) = id("get_training_") {
            Some(DynamicCommand::GetTraining(id))
        } else if let Some(id) = id("unregister_training_") {
            Some(DynamicCommand::UnregisterTraining(id))
        } else {
            id("chrono_preview_").map(DynamicCommand::ChronoPreview)
        }
    }
}

/// The menu registered with Telegram at startup.
pub fn menu_commands() -> Vec<BotCommand> {
    [
        ("start", "Почати роботу з ботом"),
        ("help", "Довідка"),
        ("my_id", "Мій ID"),
        ("weather_now", "Прогноз погоди на сьогодні"),
        ("my_trainings", "Мої тренування"),
        ("create_training", "Створити тренування"),
        ("trainings", "Тренування, які я організовую"),
    ]
    .into_iter()
    .map(|(command, description)| BotCommand::new(command, description))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_static_commands() {
        assert_eq!(Command::parse("/my_trainings", "club_bot").unwrap(), Command::MyTrainings);
        assert_eq!(Command::parse("/start promo", "club_bot").unwrap(), Command::Start("promo".into()));
        assert_eq!(Command::parse("/start", "club_bot").unwrap(), Command::Start(String::new()));
        assert!(Command::parse("/get_training_5", "club_bot").is_err());
    }

    #[test]
    fn test_parse_dynamic_commands() {
        assert_eq!(
            DynamicCommand::parse("/get_training_12", "club_bot"),
            Some(DynamicCommand::GetTraining(12))
        );
        assert_eq!(
            DynamicCommand::parse("/unregister_training_3@club_bot", "club_bot"),
            Some(DynamicCommand::UnregisterTraining(3))
        );
        assert_eq!(
            DynamicCommand::parse("/chrono_preview_7 now", "club_bot"),
            Some(DynamicCommand::ChronoPreview(7))
        );
        assert_eq!(DynamicCommand::parse("/get_training_12@other_bot", "club_bot"), None);
        assert_eq!(DynamicCommand::parse("/get_training_x", "club_bot"), None);
        assert_eq!(DynamicCommand::parse("get_training_1", "club_bot"), None);
    }

    #[test]
    fn test_menu_has_public_commands() {
        let names: Vec<String> = menu_commands().into_iter().map(|c| c.command).collect();
        assert_eq!(names.len(), 7);
        assert!(names.contains(&"create_training".to_string()));
    }
}
