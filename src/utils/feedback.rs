use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};

use crate::utils::html::escape_html;

/// Outcome kinds a status reply can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackType {
    Success,
    Error,
    Processing,
}

impl FeedbackType {
    pub fn emoji(&self) -> &'static str {
        match self {
            FeedbackType::Success => "✅",
            FeedbackType::Error => "❌",
            FeedbackType::Processing => "⏳",
        }
    }
}

/// Plain text prefixed with the emoji of its kind, escaped for HTML.
pub fn format_feedback(feedback_type: FeedbackType, message: &str) -> String {
    format!("{} {}", feedback_type.emoji(), escape_html(message))
}

/// `"<message> (step/total)"`, the label of a running job.
pub fn progress_label(message: &str, step: u32, total: u32) -> String {
    format!("{message} ({step}/{total})")
}

/// Short status replies into one chat.
pub struct CommandFeedback {
    bot: Bot,
    chat_id: ChatId,
}

impl CommandFeedback {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }

    pub async fn send(&self, feedback_type: FeedbackType, message: &str) -> ResponseResult<Message> {
        self.bot
            .send_message(self.chat_id, format_feedback(feedback_type, message))
            .parse_mode(ParseMode::Html)
            .await
    }

    pub async fn edit(
        &self,
        message_id: MessageId,
        feedback_type: FeedbackType,
        message: &str,
    ) -> ResponseResult<Message> {
        self.bot
            .edit_message_text(self.chat_id, message_id, format_feedback(feedback_type, message))
            .parse_mode(ParseMode::Html)
            .await
    }

    /// Error reply followed by a hint on what to send instead.
    pub async fn validation_error(&self, error: &str, suggestion: &str) -> ResponseResult<Message> {
        self.send(FeedbackType::Error, &format!("{error}\n\n💡 {suggestion}"))
            .await
    }
}

/// One status message edited in place while a multi-step job runs.
/// The first `advance` sends it, later calls edit it.
pub struct ProgressTracker {
    feedback: CommandFeedback,
    message_id: Option<MessageId>,
    total_steps: u32,
    current_step: u32,
}

impl ProgressTracker {
    pub fn new(feedback: CommandFeedback, total_steps: u32) -> Self {
        Self {
            feedback,
            message_id: None,
            total_steps,
            current_step: 0,
        }
    }

    pub async fn advance(&mut self, message: &str) -> ResponseResult<()> {
        self.current_step = (self.current_step + 1).min(self.total_steps);
        let label = progress_label(message, self.current_step, self.total_steps);
        match self.message_id {
            Some(message_id) => {
                self.feedback.edit(message_id, FeedbackType::Processing, &label).await?;
            }
            None => {
                let sent = self.feedback.send(FeedbackType::Processing, &label).await?;
                self.message_id = Some(sent.id);
            }
        }
        Ok(())
    }

    /// Replaces the status with the final outcome; a no-op if nothing was sent.
    pub async fn finish(&mut self, feedback_type: FeedbackType, message: &str) -> ResponseResult<()> {
        if let Some(message_id) = self.message_id.take() {
            self.feedback.edit(message_id, feedback_type, message).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_feedback_escapes_html() {
        assert_eq!(
            format_feedback(FeedbackType::Error, "Назва <b> зайнята"),
            "❌ Назва &lt;b&gt; зайнята"
        );
        assert!(format_feedback(FeedbackType::Processing, "Будую карту").starts_with("⏳"));
    }

    #[test]
    fn test_progress_label() {
        assert_eq!(progress_label("Аналізую маршрут 5 км", 2, 3), "Аналізую маршрут 5 км (2/3)");
    }
}
