use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use sqlx::SqlitePool;
use teloxide::prelude::*;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::bot::keyboards;
use crate::bot::texts;
use crate::database::models::{TrainingEvent, TrainingRegistration};
use crate::services::broadcaster;

pub const SURVEY_BATCH_SIZE: usize = 50;

/// How long after the start a training is considered finished.
pub fn survey_delay() -> Duration {
    Duration::hours(2)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyMessage {
    pub chat_id: i64,
    pub text: String,
    pub training_id: i64,
}

/// One message per participant, skipping members already asked about an earlier training.
pub fn plan_messages(trainings: &[(TrainingEvent, Vec<i64>)], tz: Tz) -> Vec<SurveyMessage> {
    let mut seen = HashSet::new();
    let mut messages = Vec::new();

    for (training, participants) in trainings {
        for telegram_id in participants {
            if !seen.insert(*telegram_id) {
                continue;
            }
            messages.push(SurveyMessage {
                chat_id: *telegram_id,
                text: texts::rating_request(training, tz),
                training_id: training.id,
            });
        }
    }
    messages
}

/// Asks participants of recently finished trainings for a rating. Returns delivered messages.
pub async fn dispatch_surveys(
    bot: &Bot,
    pool: &SqlitePool,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<usize, sqlx::Error> {
    let trainings = TrainingEvent::due_for_survey(pool, now, survey_delay()).await?;
    if trainings.is_empty() {
        return Ok(0);
    }

    let mut with_participants = Vec::with_capacity(trainings.len());
    for training in trainings {
        let participants = TrainingRegistration::participants_of(pool, training.id).await?;
        with_participants.push((training, participants));
    }

    let messages = plan_messages(&with_participants, tz);
    let delivered = send_in_batches(bot, messages).await;

    for (training, _) in &with_participants {
        TrainingEvent::mark_survey_sent(pool, training.id, now).await?;
    }
    info!(
        "Survey sent for {} training(s), {} message(s) delivered",
        with_participants.len(),
        delivered
    );
    Ok(delivered)
}

async fn send_in_batches(bot: &Bot, messages: Vec<SurveyMessage>) -> usize {
    let mut delivered = 0;

    for batch in messages.chunks(SURVEY_BATCH_SIZE) {
        let mut tasks = JoinSet::new();
        for message in batch.iter().cloned() {
            let bot = bot.clone();
            tasks.spawn(async move {
                let markup = keyboards::rating_and_comment(message.training_id);
                broadcaster::send_message(&bot, ChatId(message.chat_id), &message.text, Some(markup)).await
            });
        }

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(e) => error!("Survey task failed: {}", e),
            }
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training(id: i64) -> TrainingEvent {
        let now = Utc::now();
        TrainingEvent {
            id,
            title: format!("Training {id}"),
            slug: format!("training-{id}"),
            description: None,
            date: now,
            location: "Парк".into(),
            poster: None,
            created_by: 1,
            is_cancelled: false,
            cancellation_reason: None,
            survey_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_each_participant_is_asked_once() {
        let plan = plan_messages(
            &[(training(1), vec![10, 11]), (training(2), vec![11, 12])],
            chrono_tz::Europe::Kyiv,
        );
        let chats: Vec<(i64, i64)> = plan.iter().map(|m| (m.chat_id, m.training_id)).collect();
        assert_eq!(chats, vec![(10, 1), (11, 1), (12, 2)]);
    }
}
