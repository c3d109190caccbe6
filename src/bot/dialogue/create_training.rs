//! Training creation wizard.
//!
//! Input checks live in [`apply`], a pure function over the draft, so every step can be
//! tested without Telegram. The handlers below only translate messages into [`StepInput`]
//! and outcomes into replies.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use teloxide::prelude::*;
use teloxide::types::{KeyboardRemove, ParseMode};
use tracing::{error, info};

use crate::bot::commands::trainings::send_training_card;
use crate::bot::keyboards;
use crate::bot::texts::{self, MSG_STAFF_ONLY};
use crate::bot::{BotContext, ClubDialogue, HandlerResult, State};
use crate::database::models::{format_km, NewDistance, NewTraining, TrainingEvent};
use crate::services::gpx;
use crate::utils::datetime::{local_to_utc, parse_date, parse_time};
use crate::utils::logging::{log_command_error, log_command_start, log_command_success};
use crate::utils::validation::{
    validate_distance, validate_location, validate_max_participants, validate_pace, validate_training_title,
};

pub const SKIP: &str = "/skip";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CreationStep {
    #[default]
    Title,
    Description,
    Date,
    Time,
    Location,
    Poster,
    Distance,
    MaxParticipants,
    PaceMin,
    PaceMax,
    Route,
    /// Waiting for "add distance" or "finish".
    Review,
}

#[derive(Clone, Debug, Default)]
pub struct TrainingDraft {
    pub title: String,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub starts_at: Option<DateTime<Utc>>,
    pub location: String,
    pub poster: Option<String>,
    pub distances: Vec<NewDistance>,
    /// Distance being filled in; moved into `distances` after the route step.
    pub current: Option<NewDistance>,
}

impl TrainingDraft {
    pub fn to_new_training(&self, created_by: i64) -> Option<NewTraining> {
        Some(NewTraining {
            title: self.title.clone(),
            description: self.description.clone(),
            date: self.starts_at?,
            location: self.location.clone(),
            poster: self.poster.clone(),
            created_by,
        })
    }

    fn current_pace_min(&self) -> Option<&str> {
        self.current.as_ref().and_then(|d| d.pace_min.as_deref())
    }
}

/// A reply in the wizard, reduced to what the steps care about.
#[derive(Debug, Clone)]
pub enum StepInput<'a> {
    Text(&'a str),
    Photo(String),
    Document { file_id: String, file_name: Option<&'a str> },
    Other,
}

impl<'a> StepInput<'a> {
    pub fn from_message(msg: &'a Message) -> Self {
        if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
            return StepInput::Photo(photo.file.id.clone());
        }
        if let Some(document) = msg.document() {
            return StepInput::Document {
                file_id: document.file.id.clone(),
                file_name: document.file_name.as_deref(),
            };
        }
        match msg.text() {
            Some(text) => StepInput::Text(text.trim()),
            None => StepInput::Other,
        }
    }

    fn is_skip(&self) -> bool {
        matches!(self, StepInput::Text(text) if text.eq_ignore_ascii_case(SKIP))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Next(CreationStep),
    Retry(String),
}

fn retry(message: impl Into<String>) -> StepOutcome {
    StepOutcome::Retry(message.into())
}

/// Applies one reply to the draft and says where the wizard goes next.
pub fn apply(
    draft: &mut TrainingDraft,
    step: CreationStep,
    input: &StepInput<'_>,
    now: DateTime<Utc>,
    tz: Tz,
) -> StepOutcome {
    use CreationStep::*;

    match step {
        Title => {
            let StepInput::Text(text) = input else {
                return retry("Введіть назву тренування текстом:");
            };
            match validate_training_title(text) {
                Ok(title) => {
                    draft.title = title;
                    StepOutcome::Next(Description)
                }
                Err(_) if text.chars().count() < 3 => {
                    retry("Назва тренування занадто коротка. Введіть принаймні 3 символи:")
                }
                Err(_) => retry("Назва тренування має бути одним рядком до 200 символів. Спробуйте ще раз:"),
            }
        }
        Description => {
            if input.is_skip() {
                draft.description = None;
                return StepOutcome::Next(Date);
            }
            match input {
                StepInput::Text(text) => {
                    draft.description = Some(text.to_string());
                    StepOutcome::Next(Date)
                }
                _ => retry("Введіть опис текстом або /skip:"),
            }
        }
        Date => {
            let Some(date) = text_of(input).and_then(parse_date) else {
                return retry("Введіть дату у форматі ДД.ММ.РРРР (наприклад, 25.12.2025):");
            };
            if date < now.with_timezone(&tz).date_naive() {
                return retry("Дата тренування не може бути в минулому. Введіть коректну дату:");
            }
            draft.date = Some(date);
            StepOutcome::Next(Time)
        }
        Time => {
            let (Some(date), Some(time)) = (draft.date, text_of(input).and_then(parse_time)) else {
                return retry("Некоректний формат часу. Введіть час у форматі ГГ:ММ (наприклад, 08:30):");
            };
            match local_to_utc(date, time, tz) {
                Ok(starts_at) if starts_at > now => {
                    draft.starts_at = Some(starts_at);
                    StepOutcome::Next(Location)
                }
                Ok(_) => retry("Час тренування не може бути в минулому. Введіть коректний час:"),
                Err(_) => retry("Такого часу не існує в цей день. Введіть інший час:"),
            }
        }
        Location => match text_of(input).map(validate_location) {
            Some(Ok(location)) => {
                draft.location = location;
                StepOutcome::Next(Poster)
            }
            _ => retry("Місце зустрічі має містити від 3 до 300 символів. Спробуйте ще раз:"),
        },
        Poster => {
            if input.is_skip() {
                return StepOutcome::Next(Distance);
            }
            match input {
                StepInput::Photo(file_id) => {
                    draft.poster = Some(file_id.clone());
                    StepOutcome::Next(Distance)
                }
                _ => retry("Будь ласка, надішліть фото або /skip:"),
            }
        }
        Distance => {
            let Some(Ok(distance)) = text_of(input).map(validate_distance) else {
                return retry(
                    "Некоректна дистанція. Введіть число більше 1 та не більше 100 (наприклад, 5 або 10.5):",
                );
            };
            if draft.distances.iter().any(|d| (d.distance - distance).abs() < f64::EPSILON) {
                return retry(format!(
                    "Дистанція {} км вже додана. Введіть іншу дистанцію:",
                    format_km(distance)
                ));
            }
            draft.current = Some(NewDistance {
                distance,
                max_participants: 0,
                pace_min: None,
                pace_max: None,
                route_gpx: None,
            });
            StepOutcome::Next(MaxParticipants)
        }
        MaxParticipants => match (text_of(input).map(validate_max_participants), draft.current.as_mut()) {
            (Some(Ok(max)), Some(current)) => {
                current.max_participants = max;
                StepOutcome::Next(PaceMin)
            }
            _ => retry("Некоректна кількість учасників. Введіть ціле число від 0 до 100:"),
        },
        PaceMin => {
            if input.is_skip() {
                return StepOutcome::Next(PaceMax);
            }
            match (text_of(input).map(validate_pace), draft.current.as_mut()) {
                (Some(Ok((pace, _))), Some(current)) => {
                    current.pace_min = Some(pace);
                    StepOutcome::Next(PaceMax)
                }
                _ => retry(pace_error()),
            }
        }
        PaceMax => {
            if input.is_skip() {
                return StepOutcome::Next(Route);
            }
            let Some(Ok((pace, seconds))) = text_of(input).map(validate_pace) else {
                return retry(pace_error());
            };
            if let Some(min) = draft.current_pace_min() {
                let min_seconds = validate_pace(min).map(|(_, s)| s).unwrap_or(0);
                if seconds < min_seconds {
                    return retry(format!(
                        "Максимальний темп не може бути швидшим за мінімальний ({min}). Введіть інший темп або /skip:"
                    ));
                }
            }
            if let Some(current) = draft.current.as_mut() {
                current.pace_max = Some(pace);
            }
            StepOutcome::Next(Route)
        }
        Route => {
            let route = match input {
                _ if input.is_skip() => None,
                StepInput::Document { file_id, file_name }
                    if file_name.is_some_and(|name| name.to_lowercase().ends_with(".gpx")) =>
                {
                    Some(file_id.clone())
                }
                _ => return retry("Будь ласка, надішліть файл з розширенням .gpx або /skip:"),
            };
            match draft.current.take() {
                Some(mut current) => {
                    current.route_gpx = route;
                    draft.distances.push(current);
                    StepOutcome::Next(Review)
                }
                None => StepOutcome::Next(Distance),
            }
        }
        Review => retry("Оберіть дію в меню вище 👆"),
    }
}

fn text_of<'a>(input: &StepInput<'a>) -> Option<&'a str> {
    match input {
        StepInput::Text(text) => Some(text),
        _ => None,
    }
}

fn pace_error() -> String {
    "Темп повинен бути між 03:00 та 15:00 хв/км у форматі ХХ:СС. Спробуйте ще раз або /skip:".to_string()
}

/// Question shown when the wizard enters `step`.
pub fn prompt(step: CreationStep, draft: &TrainingDraft) -> String {
    use CreationStep::*;

    match step {
        Title => "🏷 Введіть назву тренування:".to_string(),
        Description => "Введіть опис тренування (або /skip для пропуску):".to_string(),
        Date => "📅 Введіть дату тренування у форматі ДД.ММ.РРРР:".to_string(),
        Time => "Введіть час тренування у форматі ГГ:ММ:".to_string(),
        Location => "Введіть місце зустрічі для тренування:".to_string(),
        Poster => "Завантажте постер тренування (фото) або /skip:".to_string(),
        Distance if draft.distances.is_empty() => "Введіть першу дистанцію (у кілометрах):".to_string(),
        Distance => "Введіть наступну дистанцію (у кілометрах):".to_string(),
        MaxParticipants => format!(
            "Дистанція {} км.\nВведіть максимальну кількість учасників для цієї дистанції \
             (введіть 0 для необмеженої кількості):",
            draft.current.as_ref().map(|d| format_km(d.distance)).unwrap_or_default()
        ),
        PaceMin => "Введіть мінімальний (швидкий) темп у форматі ХХ:СС (наприклад, 04:30) \
                    або /skip для пропуску:"
            .to_string(),
        PaceMax => "Введіть максимальний (повільний) темп у форматі ХХ:СС (наприклад, 06:30) \
                    або /skip для пропуску:"
            .to_string(),
        Route => "Додайте файл маршруту в форматі .GPX, або /skip:".to_string(),
        Review => texts::distance_added(
            draft.distances.last().map(|d| d.distance).unwrap_or_default(),
            &draft.distances,
        ),
    }
}

async fn send_prompt(bot: &Bot, chat_id: ChatId, step: CreationStep, draft: &TrainingDraft) -> HandlerResult {
    let request = bot.send_message(chat_id, prompt(step, draft)).parse_mode(ParseMode::Html);
    if step == CreationStep::Review {
        request.reply_markup(keyboards::add_distance_or_finish()).await?;
    } else {
        request.await?;
    }
    Ok(())
}

/// `/create_training`
pub async fn start(bot: Bot, msg: Message, dialogue: ClubDialogue, ctx: BotContext) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    log_command_start("create_training", user_id, msg.chat.id.0, None);

    if ctx.staff_member(user_id).await?.is_none() {
        bot.send_message(msg.chat.id, MSG_STAFF_ONLY).await?;
        return Ok(());
    }

    let draft = TrainingDraft::default();
    dialogue
        .update(State::CreateTraining { draft: draft.clone(), step: CreationStep::Title })
        .await?;
    bot.send_message(msg.chat.id, "🏃 Створюємо нове тренування. Надішліть /cancel, щоб перервати.")
        .reply_markup(KeyboardRemove::new())
        .await?;
    send_prompt(&bot, msg.chat.id, CreationStep::Title, &draft).await
}

pub async fn receive(
    bot: Bot,
    msg: Message,
    dialogue: ClubDialogue,
    (mut draft, step): (TrainingDraft, CreationStep),
    ctx: BotContext,
) -> HandlerResult {
    let input = StepInput::from_message(&msg);

    match apply(&mut draft, step, &input, Utc::now(), ctx.tz()) {
        StepOutcome::Retry(message) => {
            bot.send_message(msg.chat.id, message).await?;
        }
        StepOutcome::Next(next) => {
            if step == CreationStep::Title && TrainingEvent::title_exists(ctx.pool(), &draft.title).await? {
                bot.send_message(
                    msg.chat.id,
                    format!("❌ Тренування з назвою '{}' вже існує. Введіть іншу назву:", draft.title),
                )
                .await?;
                return Ok(());
            }
            dialogue.update(State::CreateTraining { draft: draft.clone(), step: next }).await?;
            send_prompt(&bot, msg.chat.id, next, &draft).await?;
        }
    }
    Ok(())
}

/// "Add distance" button after a distance is complete.
pub async fn add_distance(bot: &Bot, chat_id: ChatId, dialogue: &ClubDialogue, draft: TrainingDraft) -> HandlerResult {
    dialogue
        .update(State::CreateTraining { draft: draft.clone(), step: CreationStep::Distance })
        .await?;
    send_prompt(bot, chat_id, CreationStep::Distance, &draft).await
}

/// "Finish" button: persists the draft, shows the card and starts route analysis.
pub async fn finish(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    dialogue: &ClubDialogue,
    draft: TrainingDraft,
    ctx: &BotContext,
) -> HandlerResult {
    let Some(staff) = ctx.staff_member(user_id).await? else {
        dialogue.exit().await?;
        bot.send_message(chat_id, MSG_STAFF_ONLY).await?;
        return Ok(());
    };
    let Some(new_training) = draft.to_new_training(staff.id).filter(|_| !draft.distances.is_empty()) else {
        return super::abort_with_error(bot, chat_id, dialogue).await;
    };

    if TrainingEvent::title_exists(ctx.pool(), &new_training.title).await? {
        dialogue.exit().await?;
        bot.send_message(
            chat_id,
            format!("❌ Тренування з назвою '{}' вже існує. Створення скасовано.", new_training.title),
        )
        .await?;
        return Ok(());
    }

    let progress = bot.send_message(chat_id, "⏳ Створюю тренування...").await?;
    let (training, distances) =
        match TrainingEvent::create_with_distances(ctx.pool(), new_training, &draft.distances).await {
            Ok(created) => created,
            Err(e) => {
                log_command_error("create_training", user_id, chat_id.0, &e.to_string());
                bot.delete_message(chat_id, progress.id).await.ok();
                return super::abort_with_error(bot, chat_id, dialogue).await;
            }
        };
    dialogue.exit().await?;
    bot.delete_message(chat_id, progress.id).await.ok();

    send_training_card(
        bot,
        chat_id,
        &training,
        &distances,
        &staff.full_name(),
        0,
        ctx.tz(),
        Some(keyboards::training_management(training.id)),
    )
    .await?;
    log_command_success("create_training", user_id, chat_id.0, Some(&format!("training {}", training.id)));

    for distance in distances.into_iter().filter(|d| d.route_gpx.is_some()) {
        let bot = bot.clone();
        let pool = ctx.pool().clone();
        tokio::spawn(async move {
            match gpx::process_distance_route(&bot, &pool, distance.id, chat_id).await {
                Ok(analysis) => info!("Distance {} route ready: {:.2} km", distance.id, analysis.total_km),
                Err(e) => {
                    error!("Distance {} route failed: {}", distance.id, e);
                    let _ = bot
                        .send_message(
                            chat_id,
                            format!("⚠️ Не вдалося обробити маршрут для {} км: {}", format_km(distance.distance), e),
                        )
                        .await;
                }
            }
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Kyiv;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 10, 9, 0, 0).unwrap()
    }

    fn step(draft: &mut TrainingDraft, step: CreationStep, text: &str) -> StepOutcome {
        apply(draft, step, &StepInput::Text(text), now(), Kyiv)
    }

    #[test]
    fn test_date_and_time_must_be_in_future() {
        let mut draft = TrainingDraft::default();
        assert!(matches!(step(&mut draft, CreationStep::Date, "09.05.2025"), StepOutcome::Retry(_)));
        assert_eq!(step(&mut draft, CreationStep::Date, "10/05/2025"), StepOutcome::Next(CreationStep::Time));

        // 11:30 in Kyiv is 08:30 UTC, before now
        assert!(matches!(step(&mut draft, CreationStep::Time, "11.30"), StepOutcome::Retry(_)));
        assert_eq!(step(&mut draft, CreationStep::Time, "18,30"), StepOutcome::Next(CreationStep::Location));
        assert_eq!(draft.starts_at, Some(Utc.with_ymd_and_hms(2025, 5, 10, 15, 30, 0).unwrap()));
    }

    #[test]
    fn test_duplicate_distance_is_rejected() {
        let mut draft = TrainingDraft::default();
        assert_eq!(step(&mut draft, CreationStep::Distance, "5"), StepOutcome::Next(CreationStep::MaxParticipants));
        assert_eq!(step(&mut draft, CreationStep::MaxParticipants, "0"), StepOutcome::Next(CreationStep::PaceMin));
        assert_eq!(step(&mut draft, CreationStep::PaceMin, "/skip"), StepOutcome::Next(CreationStep::PaceMax));
        assert_eq!(step(&mut draft, CreationStep::PaceMax, "/skip"), StepOutcome::Next(CreationStep::Route));
        assert_eq!(step(&mut draft, CreationStep::Route, "/skip"), StepOutcome::Next(CreationStep::Review));
        assert_eq!(draft.distances.len(), 1);

        assert!(matches!(step(&mut draft, CreationStep::Distance, "5,0"), StepOutcome::Retry(_)));
        assert!(matches!(step(&mut draft, CreationStep::Distance, "1"), StepOutcome::Retry(_)));
        assert_eq!(step(&mut draft, CreationStep::Distance, "10,5"), StepOutcome::Next(CreationStep::MaxParticipants));
    }

    #[test]
    fn test_pace_max_cannot_be_faster_than_min() {
        let mut draft = TrainingDraft::default();
        step(&mut draft, CreationStep::Distance, "10");
        step(&mut draft, CreationStep::MaxParticipants, "20");
        assert!(matches!(step(&mut draft, CreationStep::PaceMin, "2:50"), StepOutcome::Retry(_)));
        assert_eq!(step(&mut draft, CreationStep::PaceMin, "5.30"), StepOutcome::Next(CreationStep::PaceMax));
        assert!(matches!(step(&mut draft, CreationStep::PaceMax, "5:00"), StepOutcome::Retry(_)));
        assert_eq!(step(&mut draft, CreationStep::PaceMax, "6 15"), StepOutcome::Next(CreationStep::Route));

        let current = draft.current.as_ref().unwrap();
        assert_eq!(current.pace_min.as_deref(), Some("5:30"));
        assert_eq!(current.pace_max.as_deref(), Some("6:15"));
    }

    #[test]
    fn test_route_requires_gpx_document() {
        let mut draft = TrainingDraft::default();
        step(&mut draft, CreationStep::Distance, "21.1");

        let pdf = StepInput::Document { file_id: "a".into(), file_name: Some("route.pdf") };
        assert!(matches!(apply(&mut draft, CreationStep::Route, &pdf, now(), Kyiv), StepOutcome::Retry(_)));

        let gpx = StepInput::Document { file_id: "b".into(), file_name: Some("Route.GPX") };
        assert_eq!(apply(&mut draft, CreationStep::Route, &gpx, now(), Kyiv), StepOutcome::Next(CreationStep::Review));
        assert_eq!(draft.distances[0].route_gpx.as_deref(), Some("b"));
        assert!(draft.current.is_none());
    }

    #[test]
    fn test_prompt_mentions_current_distance() {
        let mut draft = TrainingDraft::default();
        assert_eq!(prompt(CreationStep::Distance, &draft), "Введіть першу дистанцію (у кілометрах):");
        step(&mut draft, CreationStep::Distance, "10");
        assert!(prompt(CreationStep::MaxParticipants, &draft).starts_with("Дистанція 10 км."));
    }
}
