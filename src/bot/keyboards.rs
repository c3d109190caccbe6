use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
};

use crate::database::models::{format_km, TrainingDistance};

pub const BTN_YES: &str = "Так";
pub const BTN_NO: &str = "Ні";
pub const BTN_CANCEL: &str = "Скасувати";
pub const BTN_SHARE_PHONE: &str = "📱 Поділитися номером";
pub const BTN_CLOSE: &str = "❌ Прибрати";
pub const BTN_ADD_DISTANCE: &str = "➕ Додати ще дистанцію";
pub const BTN_FINISH_TRAINING: &str = "🏁 Завершити створення";
pub const BTN_PUBLISH: &str = "🗞 Анонсувати";
pub const BTN_DELETE: &str = "🗑 Видалити";
pub const BTN_REVOKE: &str = "🛑 Скасувати анонсоване тренування";
pub const BTN_REGISTER: &str = "®️ Я, буду!";

pub fn yes_no() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(BTN_YES), KeyboardButton::new(BTN_NO)]])
        .resize_keyboard(true)
}

pub fn cancel() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(BTN_CANCEL)]]).resize_keyboard(true)
}

pub fn contact_and_cancel() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(BTN_SHARE_PHONE).request(ButtonRequest::Contact),
        KeyboardButton::new(BTN_CANCEL),
    ]])
    .resize_keyboard(true)
}

/// Five star buttons laid out 3 + 2, then comment and cancel rows.
pub fn rating_and_comment(training_id: i64) -> InlineKeyboardMarkup {
    let stars: Vec<InlineKeyboardButton> = (1..=5)
        .map(|i| {
            InlineKeyboardButton::callback("⭐".repeat(i), format!("rate_training_{training_id}_{i}"))
        })
        .collect();
    let (first, second) = stars.split_at(3);

    InlineKeyboardMarkup::new(vec![
        first.to_vec(),
        second.to_vec(),
        vec![InlineKeyboardButton::callback(
            "📝 Залишити коментар",
            format!("comment_training_{training_id}"),
        )],
        vec![InlineKeyboardButton::callback(BTN_CANCEL, "btn_cancel")],
    ])
}

/// Two distances per row and a close button.
pub fn distance_choice(training_id: i64, distances: &[TrainingDistance]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = distances
        .chunks(2)
        .map(|chunk| {
            chunk
                .iter()
                .map(|d| {
                    InlineKeyboardButton::callback(
                        format!("{} км", format_km(d.distance)),
                        format!("distance_{}_{}", training_id, d.id),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(BTN_CLOSE, "btn_close")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn cancel_inline() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(BTN_CANCEL, "btn_cancel")]])
}

pub fn close() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(BTN_CLOSE, "btn_close")]])
}

pub fn add_distance_or_finish() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(BTN_ADD_DISTANCE, "add_distance")],
        vec![InlineKeyboardButton::callback(BTN_FINISH_TRAINING, "finish_training")],
    ])
}

pub fn training_management(training_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(BTN_PUBLISH, format!("publish_training_{training_id}")),
        InlineKeyboardButton::callback(BTN_DELETE, format!("delete_training_{training_id}")),
    ]])
}

pub fn register_training(training_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        BTN_REGISTER,
        format!("register_training_{training_id}"),
    )]])
}

pub fn delete_confirmation(training_id: i64) -> InlineKeyboardMarkup {
    confirmation("delete_confirm", training_id)
}

pub fn revoke_confirmation(training_id: i64) -> InlineKeyboardMarkup {
    confirmation("revoke_confirm", training_id)
}

pub fn revoke_offer(training_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(BTN_REVOKE, format!("revoke_training_{training_id}"))],
        vec![InlineKeyboardButton::callback(BTN_CLOSE, "btn_close")],
    ])
}

fn confirmation(prefix: &str, training_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Так", format!("{prefix}_{training_id}_yes")),
        InlineKeyboardButton::callback("❌ Ні", format!("{prefix}_{training_id}_no")),
    ]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callback_data(button: &InlineKeyboardButton) -> Option<&str> {
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.as_str()),
            _ => None,
        }
    }

    #[test]
    fn test_rating_keyboard_layout() {
        let keyboard = rating_and_comment(7);
        let sizes: Vec<usize> = keyboard.inline_keyboard.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 2, 1, 1]);
        assert_eq!(callback_data(&keyboard.inline_keyboard[1][1]), Some("rate_training_7_5"));
        assert_eq!(callback_data(&keyboard.inline_keyboard[2][0]), Some("comment_training_7"));
        assert_eq!(callback_data(&keyboard.inline_keyboard[3][0]), Some("btn_cancel"));
    }

    #[test]
    fn test_confirmation_callbacks() {
        let keyboard = delete_confirmation(3);
        assert_eq!(callback_data(&keyboard.inline_keyboard[0][0]), Some("delete_confirm_3_yes"));
        assert_eq!(callback_data(&keyboard.inline_keyboard[0][1]), Some("delete_confirm_3_no"));
    }
}
