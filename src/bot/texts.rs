//! HTML message templates. Every user-supplied value goes through [`escape_html`].

use chrono_tz::Tz;

use crate::database::models::{
    format_km, ClubUser, MyRegistration, NewDistance, ScheduledMessage, TrainingDistance, TrainingEvent,
};
use crate::utils::datetime::{format_date, format_datetime, format_time};
use crate::utils::html::{clean_tag_message, escape_html};

pub const MSG_PROFILE_UPDATED: &str = "✅ Дані успішно оновлено!";
pub const MSG_PROFILE_LATER: &str = "❌ Ви можете заповнити дані пізніше через особистий кабінет.";
pub const MSG_PROFILE_CANCELLED: &str = "Шкода, що Ви передумали.";
pub const MSG_NOT_FOUND: &str = "❌ Тренування або профіль користувача не знайдено!";
pub const MSG_CANCELLED: &str = "⚠️ Тренування було скасовано!";
pub const MSG_ALREADY_PAST: &str = "⚠️ Це тренування вже відбулося!";
pub const MSG_ALREADY_REGISTERED: &str = "⚠️ Ви вже зареєстровані на це тренування!";
pub const MSG_FULL: &str = "⚠️ Вибачте, максимальна кількість учасників вже зареєстрована!";
pub const MSG_NO_DISTANCES: &str = "⚠️ Для цього тренування ще не визначено дистанцій.";
pub const MSG_STAFF_ONLY: &str = "⛔ Ця команда доступна лише організаторам тренувань.";
pub const MSG_ADMIN_ONLY: &str = "⛔ Ця команда доступна лише адміністраторам.";
pub const MSG_DEEP_LINK_NOT_FOUND: &str = "Deep link не знайдено або він недійсний.";
pub const MSG_COMMENT_PROMPT: &str = "📝 Будь ласка, напишіть ваш коментар про тренування:";
pub const MSG_COMMENT_THANKS: &str = "🙏 Дякуємо за ваш відгук!";
pub const MSG_GENERIC_ERROR: &str = "❌ Сталася помилка. Спробуйте пізніше.";

pub fn start_incomplete(name: &str) -> String {
    [
        format!("<b>📢 Привіт, {}!</b>", escape_html(name)),
        "\t\tМи помітили, що у твоєму профілі учасника бігового клубу не заповнені всі дані.\n\
         Щоб ми могли краще організовувати тренування та заходи, будь ласка, доповни свій профіль.\n\
         Це займе всього кілька хвилин! 😊"
            .to_string(),
        "Заповнити профіль зараз?".to_string(),
    ]
    .join("\n\n")
}

pub fn start_complete(name: &str) -> String {
    format!("Вітаю, {}!", escape_html(name))
}

pub fn help() -> String {
    [
        "<b>🏃 Бот бігового клубу</b>",
        "",
        "/start - почати роботу з ботом",
        "/my_trainings - мої реєстрації на тренування",
        "/weather_now - прогноз погоди на сьогодні",
        "/my_id - інформація про ваш профіль і чат",
        "/help - ця довідка",
        "",
        "<b>Для організаторів:</b>",
        "/create_training - створити тренування",
        "/trainings - мої майбутні тренування",
        "/chronoposts - неактивні хронопости",
        "/cancel - перервати поточну дію",
    ]
    .join("\n")
}

pub fn my_id(full_name: &str, username: &str, user_id: i64, chat_id: i64, title: &str) -> String {
    [
        "Ваша інформація:\n".to_string(),
        format!("<b>🚻 ПІБ:</b> {}", escape_html(full_name)),
        format!("<b>🪪 Username:</b><code> {}</code>", escape_html(username)),
        format!("<b>🆔 Ваш ID:</b><code> {user_id}</code>"),
        format!("<b>💬 Чат ID:</b><code> {chat_id}</code>"),
        format!("<b>🔸 Заголовок:</b><code> {}</code>", escape_html(title)),
    ]
    .join("\n")
}

fn training_header(training: &TrainingEvent, tz: Tz) -> String {
    format!(
        "🏃‍♀️ Тренування: {}\n📅 Дата: {}\n📍 Місце: {}",
        escape_html(&training.title),
        format_datetime(&training.date, tz),
        escape_html(&training.location)
    )
}

pub fn registration_success(
    participant: &ClubUser,
    training: &TrainingEvent,
    distance: &TrainingDistance,
    tz: Tz,
) -> String {
    format!(
        "✅ Реєстрація успішна!\n\n👤 Учасник: {}\n{}\n🎯 Дистанція: {} км\n🔗 Всі реєстрації: /my_trainings\n\n\
         Бажаємо успішного тренування! 💪",
        escape_html(&participant.full_name()),
        training_header(training, tz),
        format_km(distance.distance)
    )
}

pub fn creator_notification(
    participant: &ClubUser,
    training: &TrainingEvent,
    distance: &TrainingDistance,
    tz: Tz,
) -> String {
    format!(
        "🆕 Нова реєстрація на тренування!\n\n👤 Учасник: {} {}\n{}\n🎯 Дистанція: {} км",
        escape_html(&participant.full_name()),
        escape_html(&participant.mention()),
        training_header(training, tz),
        format_km(distance.distance)
    )
}

pub fn choose_distance(training: &TrainingEvent, tz: Tz) -> String {
    format!(
        "{}\n\nОберіть дистанцію на яку бажаєте зареєструватися:",
        training_header(training, tz)
    )
}

pub fn unregistered(training: &TrainingEvent, tz: Tz) -> String {
    format!(
        "❌ Реєстрацію скасовано\n\n🏃‍♀️ Тренування: {}\n📅 Дата: {}\n\nВи більше не зареєстровані на це тренування.",
        escape_html(&training.title),
        format_datetime(&training.date, tz)
    )
}

pub fn rating_request(training: &TrainingEvent, tz: Tz) -> String {
    format!(
        "👋 Дякуємо, що були з нами на тренуванні!\n\n🏃‍♀️ <b>{}</b>\n📅 {}\n\n\
         ⭐ Будь ласка, оцініть тренування або залиште коментар:",
        escape_html(&training.title),
        format_datetime(&training.date, tz)
    )
}

pub fn rating_thanks(rating: i64) -> String {
    format!("Дякую за вашу оцінку: {}", "⭐".repeat(rating.clamp(1, 5) as usize))
}

pub fn comment_notification(participant: &ClubUser, training: &TrainingEvent, comment: &str) -> String {
    format!(
        "💬 Новий коментар до тренування <b>{}</b>\n\n👤 {} {}\n\n{}",
        escape_html(&training.title),
        escape_html(&participant.full_name()),
        escape_html(&participant.mention()),
        escape_html(comment)
    )
}

fn pace_range(pace_min: Option<&str>, pace_max: Option<&str>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(min) = pace_min {
        parts.push(format!("від {min}"));
    }
    if let Some(max) = pace_max {
        parts.push(format!("до {max}"));
    }
    (!parts.is_empty()).then(|| parts.join(" "))
}

fn participants_limit(max: i64) -> String {
    if max == 0 {
        "необмежено".to_string()
    } else {
        format!("макс. {max}")
    }
}

/// Full training card used after creation, in `/get_training_{id}` and in announcements.
pub fn training_card(
    training: &TrainingEvent,
    distances: &[TrainingDistance],
    organizer: &str,
    registrations: i64,
    tz: Tz,
) -> String {
    let mut lines = vec![format!("🏷 <b>Назва:</b> {}", escape_html(&training.title))];

    if let Some(description) = training.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(format!("📋 <b>Опис:</b> {}", clean_tag_message(description)));
    }
    if training.poster.is_some() {
        lines.push("\n🖼 <b>Постер додано</b>".to_string());
    }

    lines.push(format!("\n📅 <b>Дата:</b> {}", format_date(&training.date, tz)));
    lines.push(format!("🕒 <b>Час:</b> {}", format_time(&training.date, tz)));
    lines.push(format!("📍 <b>Місце:</b> {}", escape_html(&training.location)));

    if training.is_cancelled {
        lines.push("\n🛑 <b>Тренування скасовано</b>".to_string());
    }

    if !distances.is_empty() {
        lines.push("\n📏 <b>Дистанції:</b>".to_string());
        for distance in distances {
            let mut line = format!(
                "  • {} км | 👥 {}",
                format_km(distance.distance),
                participants_limit(distance.max_participants)
            );
            if let Some(pace) = pace_range(distance.pace_min.as_deref(), distance.pace_max.as_deref()) {
                line.push_str(&format!(" | 🏃 <i>темп:</i> {pace}"));
            }
            if distance.route_gpx.is_some() {
                match distance.route_length_km {
                    Some(km) => line.push_str(&format!(" | 🗺 маршрут {km:.1} км")),
                    None => line.push_str(" | 🗺 маршрут"),
                }
            }
            lines.push(line);
        }
    }

    if registrations > 0 {
        lines.push(format!("\n👥 <b>Зареєстровано:</b> {registrations} учасник(а / ів)"));
    }
    lines.push(format!("\n👤 <b>Організатор:</b> {}", escape_html(organizer)));
    lines.push(format!("🆔 <b>ID тренування:</b> <code>{}</code>", training.id));

    lines.join("\n")
}

/// Distances collected so far in the creation dialogue.
pub fn draft_distances(distances: &[NewDistance]) -> String {
    distances
        .iter()
        .map(|d| {
            let mut line = format!(
                "• {} км - {} учасників",
                format_km(d.distance),
                participants_limit(d.max_participants)
            );
            if let Some(pace) = pace_range(d.pace_min.as_deref(), d.pace_max.as_deref()) {
                line.push_str(&format!(" (темп: {pace})"));
            }
            if d.route_gpx.is_some() {
                line.push_str(" (маршрут: 🗺)");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn distance_added(distance: f64, distances: &[NewDistance]) -> String {
    format!(
        "🎯 <b>Дистанція {} км успішно додана!</b>\n\n📊 <i>Список доданих дистанцій:</i>\n{}\n\n\
         🛠️ <b>Наступні дії:</b>\n\nОберіть дію з меню нижче 👇",
        format_km(distance),
        draft_distances(distances)
    )
}

pub fn delete_confirmation(training: &TrainingEvent, participants: i64) -> String {
    format!(
        "⚠️ <b>Підтвердження видалення тренування</b>\n\n📌 <b>Назва:</b> {}\n🆔 <b>ID:</b> {}\n\
         👥 <b>Учасників:</b> {}\n\n🔥 <b>Увага: ця дія незворотна!</b>",
        escape_html(&training.title),
        training.id,
        participants
    )
}

pub fn delete_blocked(training: &TrainingEvent, participants: i64) -> String {
    format!(
        "⚠️ Тренування <b>{}</b> вже має {} зареєстрованих учасників і не може бути видалене.\n\n\
         Ви можете скасувати його, і всі учасники отримають сповіщення.",
        escape_html(&training.title),
        participants
    )
}

pub fn revoke_confirmation(training: &TrainingEvent) -> String {
    format!(
        "⚠️ <b>Підтвердження скасування тренування</b>\n\n📌 <b>Назва:</b> {}\n🆔 <b>ID:</b> {}\n",
        escape_html(&training.title),
        training.id
    )
}

pub fn cancellation_notice(training: &TrainingEvent, tz: Tz) -> String {
    format!(
        "🚨 <b>Важливе сповіщення!</b>\n\n😔 <i>Тренування </i><b>{} </b><i>, на яке ви зареєстровані,</i>\n\
         📅 <b>Дата:</b> {}\n\n‼️СКАСОВАНО‼️\n\n🚧 <b>Причина:</b> адміністративне рішення\n\n\
         🙏 Вибачте за незручності! Ми повідомимо про нові тренування.",
        escape_html(&training.title),
        format_datetime(&training.date, tz)
    )
}

pub fn cancellation_confirmation(training: &TrainingEvent, notified: usize, tz: Tz) -> String {
    format!(
        "✅ <b>Тренування «{}» скасовано!</b>\n\n📊 <i>Деталі:</i>\n   • Дата: {}\n   \
         • Учасників повідомлено: <b>{}</b> осб.\n📨 <i>Всі зареєстровані учасники отримали сповіщення</i>",
        escape_html(&training.title),
        format_datetime(&training.date, tz),
        notified
    )
}

pub fn staff_trainings(trainings: &[TrainingEvent], tz: Tz) -> String {
    if trainings.is_empty() {
        return "📭 У вас немає запланованих тренувань.".to_string();
    }
    let items = trainings
        .iter()
        .map(|t| {
            format!(
                "🏃 <b>{}</b>\n📅 {}\n👉 /get_training_{}",
                escape_html(&t.title),
                format_datetime(&t.date, tz),
                t.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("📋 <b>Ваші майбутні тренування:</b>\n\n{items}")
}

pub fn my_registrations(registrations: &[MyRegistration], tz: Tz) -> String {
    if registrations.is_empty() {
        return "📭 Ви ще не зареєстровані на жодне тренування.".to_string();
    }
    let items = registrations
        .iter()
        .map(|r| {
            format!(
                "🏃‍♀️ <b>{}</b>\n📅 {}\n📍 {}\n🎯 {} км\n❌ Скасувати: /unregister_training_{}",
                escape_html(&r.title),
                format_datetime(&r.date, tz),
                escape_html(&r.location),
                format_km(r.distance),
                r.training_id
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("📋 <b>Ваші реєстрації:</b>\n\n{items}")
}

pub fn chronopost_list(messages: &[ScheduledMessage], tz: Tz) -> String {
    if messages.is_empty() {
        return "📭 Неактивних хронопостів немає.".to_string();
    }
    let items = messages
        .iter()
        .map(|m| {
            format!(
                "🕒 {} ({})\n💬 чат {}\n👁 /chrono_preview_{}",
                format_datetime(&m.scheduled_time, tz),
                m.periodicity.label(),
                m.chat_id,
                m.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("🗂 <b>Неактивні хронопости:</b>\n\n{items}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn training() -> TrainingEvent {
        let date = Utc.with_ymd_and_hms(2025, 5, 1, 4, 30, 0).unwrap();
        TrainingEvent {
            id: 12,
            title: "Ранкова <пробіжка>".into(),
            slug: "s".into(),
            description: None,
            date,
            location: "Парк".into(),
            poster: None,
            created_by: 1,
            is_cancelled: false,
            cancellation_reason: None,
            survey_sent_at: None,
            created_at: date,
            updated_at: date,
        }
    }

    #[test]
    fn test_training_header_uses_local_time_and_escapes() {
        let text = rating_request(&training(), chrono_tz::Europe::Kyiv);
        assert!(text.contains("Ранкова &lt;пробіжка&gt;"));
        assert!(text.contains("01.05.2025 07:30"));
    }

    #[test]
    fn test_draft_distances() {
        let distances = vec![
            NewDistance {
                distance: 5.0,
                max_participants: 0,
                pace_min: Some("5:00".into()),
                pace_max: None,
                route_gpx: None,
            },
            NewDistance {
                distance: 10.5,
                max_participants: 20,
                pace_min: None,
                pace_max: None,
                route_gpx: Some("file".into()),
            },
        ];
        assert_eq!(
            draft_distances(&distances),
            "• 5 км - необмежено учасників (темп: від 5:00)\n• 10.5 км - макс. 20 учасників (маршрут: 🗺)"
        );
    }

    #[test]
    fn test_rating_thanks() {
        assert_eq!(rating_thanks(3), "Дякую за вашу оцінку: ⭐⭐⭐");
    }
}
