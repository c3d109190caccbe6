pub mod callback;
pub mod general_message;
pub mod message;

use teloxide::{
    dispatching::{dialogue, dialogue::InMemStorage, UpdateHandler},
    prelude::*,
    types::Me,
};

use super::commands::{Command, DynamicCommand};
use super::dialogue::{comment, create_training, profile};
use super::{BotContext, State};

pub struct BotHandler {
    pub ctx: BotContext,
}

impl BotHandler {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    /// Values every endpoint can ask for by type.
    pub fn dependencies(&self) -> dptree::di::DependencyMap {
        dptree::deps![InMemStorage::<State>::new(), self.ctx.clone()]
    }

    /// Commands win over conversation state so `/cancel` works mid-dialogue.
    pub fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
        use dptree::case;

        let commands = teloxide::filter_command::<Command, _>().endpoint(message::command_handler);

        let dynamic_commands = dptree::filter_map(|msg: Message, me: Me| {
            msg.text().and_then(|text| DynamicCommand::parse(text, me.username()))
        })
        .endpoint(message::dynamic_command_handler);

        let messages = Update::filter_message()
            .branch(commands)
            .branch(dynamic_commands)
            .branch(case![State::Profile { remaining }].endpoint(profile::receive_field))
            .branch(case![State::CreateTraining { draft, step }].endpoint(create_training::receive))
            .branch(case![State::AwaitingComment { training_id, prompt_id }].endpoint(comment::receive))
            .branch(dptree::endpoint(general_message::handle_general_message));

        let callbacks = Update::filter_callback_query().endpoint(callback::callback_handler);

        dialogue::enter::<Update, InMemStorage<State>, State, _>()
            .branch(messages)
            .branch(callbacks)
    }
}
