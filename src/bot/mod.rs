/// Slash commands, static and dynamic
pub mod commands;
/// Multi-step conversations
pub mod dialogue;
/// Update routing and callback handling
pub mod handlers;
/// Reply and inline keyboards
pub mod keyboards;
/// Message templates
pub mod texts;

use std::sync::Arc;

use chrono_tz::Tz;
use sqlx::SqlitePool;
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::types::MessageId;

use crate::config::Config;
use crate::database::connection::DatabaseManager;
use crate::database::models::{ClubUser, ProfileField};
use dialogue::create_training::{CreationStep, TrainingDraft};

pub type HandlerResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
pub type ClubDialogue = Dialogue<State, InMemStorage<State>>;

/// Per-chat conversation state.
#[derive(Clone, Debug, Default)]
pub enum State {
    #[default]
    Idle,
    /// Remaining profile fields, asked in order.
    Profile { remaining: Vec<ProfileField> },
    CreateTraining { draft: TrainingDraft, step: CreationStep },
    AwaitingComment {
        training_id: i64,
        prompt_id: Option<MessageId>,
    },
}

/// Shared handles injected into every handler.
#[derive(Clone)]
pub struct BotContext {
    pub db: DatabaseManager,
    pub config: Arc<Config>,
}

impl BotContext {
    pub fn new(db: DatabaseManager, config: Arc<Config>) -> Self {
        Self { db, config }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }

    pub fn tz(&self) -> Tz {
        self.config.time_zone
    }

    pub fn is_admin(&self, telegram_id: i64) -> bool {
        self.config.is_admin(telegram_id)
    }

    /// Staff members and bot admins may manage trainings.
    pub async fn staff_member(&self, telegram_id: i64) -> Result<Option<ClubUser>, sqlx::Error> {
        let member = ClubUser::find_by_telegram_id(self.pool(), telegram_id).await?;
        Ok(member.filter(|m| m.is_staff || self.is_admin(telegram_id)))
    }
}
