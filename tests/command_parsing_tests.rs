use run_club_bot::bot::commands::{Command, DynamicCommand};
use run_club_bot::bot::handlers::callback::CallbackAction;
use run_club_bot::bot::keyboards;
use run_club_bot::database::models::TrainingDistance;
use teloxide::types::{InlineKeyboardButtonKind, InlineKeyboardMarkup};
use teloxide::utils::command::BotCommands;

#[cfg(test)]
mod command_parsing_tests {
    use super::*;

    const BOT: &str = "run_club_bot";

    fn callback_data(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    fn distance(id: i64, km: f64) -> TrainingDistance {
        TrainingDistance {
            id,
            training_id: 8,
            distance: km,
            pace_min: None,
            pace_max: None,
            max_participants: 0,
            route_gpx: None,
            route_length_km: None,
            route_markers: None,
            route_status: "none".to_string(),
        }
    }

    #[test]
    fn test_simple_commands() {
        let cases = vec![
            ("/help", Command::Help),
            ("/my_id", Command::MyId),
            ("/weather_now", Command::WeatherNow),
            ("/my_trainings", Command::MyTrainings),
            ("/create_training", Command::CreateTraining),
            ("/trainings", Command::Trainings),
            ("/chronoposts", Command::Chronoposts),
            ("/quiz", Command::Quiz),
            ("/cancel", Command::Cancel),
        ];

        for (input, expected) in cases {
            assert_eq!(Command::parse(input, BOT).unwrap(), expected, "input {}", input);
        }
    }

    #[test]
    fn test_start_payload() {
        assert_eq!(
            Command::parse("/start invite_coach", BOT).unwrap(),
            Command::Start("invite_coach".to_string())
        );
        assert_eq!(
            Command::parse(&format!("/start@{BOT}"), BOT).unwrap(),
            Command::Start(String::new())
        );
    }

    #[test]
    fn test_unknown_commands() {
        assert!(Command::parse("/list", BOT).is_err());
        assert!(Command::parse("/help@another_bot", BOT).is_err());
        assert!(Command::parse("help", BOT).is_err());
    }

    #[test]
    fn test_dynamic_commands_with_mentions() {
        assert_eq!(
            DynamicCommand::parse(&format!("/get_training_41@{BOT}"), BOT),
            Some(DynamicCommand::GetTraining(41))
        );
        assert_eq!(
            DynamicCommand::parse("/unregister_training_41", BOT),
            Some(DynamicCommand::UnregisterTraining(41))
        );
        assert_eq!(DynamicCommand::parse("/chrono_preview_", BOT), None);
        assert_eq!(DynamicCommand::parse("/my_trainings", BOT), None);
    }

    #[test]
    fn test_keyboard_callbacks_parse_back() {
        let markups = vec![
            keyboards::rating_and_comment(8),
            keyboards::distance_choice(8, &[distance(1, 5.0), distance(2, 10.0), distance(3, 21.1)]),
            keyboards::cancel_inline(),
            keyboards::close(),
            keyboards::add_distance_or_finish(),
            keyboards::training_management(8),
            keyboards::register_training(8),
            keyboards::delete_confirmation(8),
            keyboards::revoke_confirmation(8),
            keyboards::revoke_offer(8),
        ];

        for markup in &markups {
            for data in callback_data(markup) {
                assert!(data.len() <= 64, "callback data too long: {}", data);
                assert!(CallbackAction::parse(&data).is_some(), "unparsed callback data: {}", data);
            }
        }
    }

    #[test]
    fn test_rating_buttons() {
        let data = callback_data(&keyboards::rating_and_comment(8));
        let ratings: Vec<CallbackAction> = data
            .iter()
            .filter_map(|d| CallbackAction::parse(d))
            .filter(|action| matches!(action, CallbackAction::Rate { .. }))
            .collect();

        assert_eq!(ratings.len(), 5);
        assert_eq!(ratings[4], CallbackAction::Rate { training_id: 8, rating: 5 });
        assert!(data.contains(&"comment_training_8".to_string()));
    }

    #[test]
    fn test_distance_choice_layout() {
        let markup = keyboards::distance_choice(8, &[distance(1, 5.0), distance(2, 10.0), distance(3, 21.1)]);
        // Two per row, then the close row
        assert_eq!(markup.inline_keyboard.len(), 3);
        assert_eq!(markup.inline_keyboard[0][1].text, "10 км");
        assert_eq!(markup.inline_keyboard[1][0].text, "21.1 км");
        assert_eq!(
            CallbackAction::parse("distance_8_3"),
            Some(CallbackAction::ChooseDistance { training_id: 8, distance_id: 3 })
        );
    }
}
