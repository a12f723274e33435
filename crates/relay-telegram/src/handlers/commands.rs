use teloxide::types::Message;
use tracing::{info, warn};

use relay_core::{
    domain::{ChatId, SenderId},
    messaging::port::MessagingPort,
};

use crate::router::AppState;

pub const NEW_CONVERSATION_REPLY: &str =
    "Conversación reiniciada. El próximo mensaje empieza de cero.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Forget the assistant thread for this chat.
    New,
}

impl Command {
    /// `/new` or `/new@botname`, surrounding whitespace ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?;
        let name = word.split_once('@').map_or(word, |(name, _)| name);
        match name {
            "new" => Some(Command::New),
            _ => None,
        }
    }
}

pub async fn handle_command(msg: &Message, cmd: Command, state: &AppState) {
    let chat_id = ChatId(msg.chat.id.0);
    match cmd {
        Command::New => {
            let sender = SenderId::from(chat_id);
            let had_state = state.dispatcher.conversations().reset(&sender);
            info!(%sender, had_state, "conversation reset");
            if let Err(e) = state
                .messenger
                .send_text(chat_id, NEW_CONVERSATION_REPLY)
                .await
            {
                warn!(chat_id = chat_id.0, error = %e, "failed to confirm reset");
            }
        }
    }
}
