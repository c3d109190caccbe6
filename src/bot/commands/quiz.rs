use rand::seq::SliceRandom;
use rand::Rng;
use teloxide::prelude::*;
use teloxide::types::PollType;
use thiserror::Error;
use tracing::info;

use crate::bot::texts::MSG_ADMIN_ONLY;
use crate::bot::{BotContext, HandlerResult};
use crate::database::models::{QuizAnswer, QuizQuestion};
use crate::utils::html::truncate_chars;
use crate::utils::media::input_file;

pub const EXPLANATION_LIMIT: usize = 200;
const QUESTION_LIMIT: usize = 300;
const OPTION_LIMIT: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("a quiz needs at least 2 answers, found {0}")]
    NotEnoughAnswers(usize),
    #[error("a quiz needs exactly one correct answer, found {0}")]
    CorrectAnswers(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuiz {
    pub question: String,
    pub options: Vec<String>,
    pub correct_option: u8,
    pub explanation: Option<String>,
}

/// Shuffles the answers and locates the single correct one.
pub fn prepare_quiz<R: Rng + ?Sized>(
    question: &QuizQuestion,
    mut answers: Vec<QuizAnswer>,
    rng: &mut R,
) -> Result<PreparedQuiz, QuizError> {
    if answers.len() < 2 {
        return Err(QuizError::NotEnoughAnswers(answers.len()));
    }
    answers.shuffle(rng);

    let correct: Vec<usize> = answers
        .iter()
        .enumerate()
        .filter(|(_, answer)| answer.is_correct)
        .map(|(index, _)| index)
        .collect();
    let [correct_option] = correct.as_slice() else {
        return Err(QuizError::CorrectAnswers(correct.len()));
    };

    Ok(PreparedQuiz {
        question: truncate_chars(&question.text, QUESTION_LIMIT),
        options: answers.iter().map(|a| truncate_chars(&a.text, OPTION_LIMIT)).collect(),
        correct_option: *correct_option as u8,
        explanation: question
            .explanation
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(|e| truncate_chars(e, EXPLANATION_LIMIT)),
    })
}

/// `/quiz`: sends the oldest active question to the club chat as a quiz poll.
pub async fn quiz(bot: Bot, msg: Message, ctx: BotContext) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    if !ctx.is_admin(user.id.0 as i64) {
        bot.send_message(msg.chat.id, MSG_ADMIN_ONLY).await?;
        return Ok(());
    }

    let Some(question) = QuizQuestion::first_active(ctx.pool()).await? else {
        bot.send_message(msg.chat.id, "📭 Активних питань для вікторини немає.").await?;
        return Ok(());
    };
    let answers = question.answers(ctx.pool()).await?;
    // The thread-local rng is not Send and must be gone before the next await
    let prepared = prepare_quiz(&question, answers, &mut rand::thread_rng());
    let prepared = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            bot.send_message(msg.chat.id, format!("❌ Питання #{} не можна надіслати: {e}", question.id))
                .await?;
            return Ok(());
        }
    };

    let club_chat = ChatId(ctx.config.default_chat_id);
    if let Some(image) = question.image.as_deref().filter(|i| !i.is_empty()) {
        bot.send_photo(club_chat, input_file(image)).await?;
    }

    let mut poll = bot
        .send_poll(club_chat, prepared.question, prepared.options)
        .type_(PollType::Quiz)
        .correct_option_id(prepared.correct_option)
        .is_anonymous(false);
    if let Some(explanation) = prepared.explanation {
        poll = poll.explanation(explanation);
    }
    poll.await?;

    QuizQuestion::deactivate(ctx.pool(), question.id).await?;
    info!("Quiz question {} sent to chat {}", question.id, club_chat);
    bot.send_message(msg.chat.id, "✅ Вікторину надіслано.").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_quiz_handler_is_send() {
        // Dispatcher handlers are spawned, so this only needs to type-check
        #[allow(dead_code)]
        fn check(bot: Bot, msg: Message, ctx: BotContext) {
            assert_send(&quiz(bot, msg, ctx));
        }
    }

    fn question(explanation: Option<&str>) -> QuizQuestion {
        QuizQuestion {
            id: 1,
            text: "Скільки кілометрів у марафоні?".into(),
            explanation: explanation.map(str::to_string),
            image: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn answer(id: i64, text: &str, is_correct: bool) -> QuizAnswer {
        QuizAnswer { id, question_id: 1, text: text.into(), is_correct }
    }

    #[test]
    fn test_correct_option_follows_shuffle() {
        let answers = vec![answer(1, "21.1", false), answer(2, "42.195", true), answer(3, "50", false)];
        let mut rng = StdRng::seed_from_u64(7);
        let quiz = prepare_quiz(&question(None), answers, &mut rng).unwrap();

        assert_eq!(quiz.options.len(), 3);
        assert_eq!(quiz.options[quiz.correct_option as usize], "42.195");
        assert_eq!(quiz.explanation, None);
    }

    #[test]
    fn test_invalid_answer_sets() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            prepare_quiz(&question(None), vec![answer(1, "так", true)], &mut rng),
            Err(QuizError::NotEnoughAnswers(1))
        );
        assert_eq!(
            prepare_quiz(&question(None), vec![answer(1, "a", true), answer(2, "b", true)], &mut rng),
            Err(QuizError::CorrectAnswers(2))
        );
    }

    #[test]
    fn test_explanation_is_cut() {
        let long = "а".repeat(250);
        let answers = vec![answer(1, "a", true), answer(2, "b", false)];
        let quiz = prepare_quiz(&question(Some(&long)), answers, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(quiz.explanation.map(|e| e.chars().count()), Some(EXPLANATION_LIMIT));
    }
}
