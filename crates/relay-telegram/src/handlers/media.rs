use teloxide::types::Message;
use tracing::warn;

use relay_core::{config::Config, domain::ChatId, messaging::port::MessagingPort};

use super::MessageKind;
use crate::router::AppState;

pub async fn handle_media(msg: &Message, kind: &MessageKind, state: &AppState) {
    let Some(reply) = canned_reply(kind, &state.cfg) else {
        return;
    };

    let chat_id = ChatId(msg.chat.id.0);
    if let Err(e) = state.messenger.send_text(chat_id, reply).await {
        warn!(chat_id = chat_id.0, error = %e, "failed to send canned reply");
    }
}

fn canned_reply<'a>(kind: &MessageKind, cfg: &'a Config) -> Option<&'a str> {
    match kind {
        MessageKind::Media => Some(cfg.media_reply.as_str()),
        MessageKind::VoiceNote => Some(cfg.voice_note_reply.as_str()),
        MessageKind::Text(_) | MessageKind::Unsupported => None,
    }
}
