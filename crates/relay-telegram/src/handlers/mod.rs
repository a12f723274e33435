//! Telegram update handlers.
//!
//! Text goes into the core dispatcher; media and voice notes get a canned
//! reply since the assistant only handles text. `/new` resets the chat's
//! assistant thread.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::debug;

use crate::router::AppState;

mod commands;
mod media;
mod text;

use commands::Command;

/// What the bot does with an inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Text(String),
    Media,
    VoiceNote,
    Unsupported,
}

impl MessageKind {
    pub fn of(msg: &Message) -> Self {
        if let Some(text) = msg.text() {
            return MessageKind::Text(text.to_string());
        }
        if msg.voice().is_some() || msg.audio().is_some() || msg.video_note().is_some() {
            return MessageKind::VoiceNote;
        }
        if msg.photo().is_some()
            || msg.document().is_some()
            || msg.video().is_some()
            || msg.animation().is_some()
            || msg.sticker().is_some()
        {
            return MessageKind::Media;
        }
        MessageKind::Unsupported
    }
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if state.cfg.ignore_groups && !msg.chat.is_private() {
        debug!(chat_id = msg.chat.id.0, "ignoring non-private chat");
        return Ok(());
    }

    match MessageKind::of(&msg) {
        MessageKind::Text(body) => match Command::parse(&body) {
            Some(cmd) => commands::handle_command(&msg, cmd, &state).await,
            None => text::handle_text(&msg, body, &state),
        },
        kind @ (MessageKind::Media | MessageKind::VoiceNote) => {
            media::handle_media(&msg, &kind, &state).await
        }
        MessageKind::Unsupported => {
            debug!(chat_id = msg.chat.id.0, "ignoring unsupported message");
        }
    }

    Ok(())
}
