use std::sync::Arc;

use teloxide::types::Message;

use relay_core::{
    domain::{ChatId, InboundEvent, SenderId},
    messaging::sink::ChatSink,
};

use crate::router::AppState;

/// Queue a text message for its chat. Returns without waiting for the reply.
pub fn handle_text(msg: &Message, body: String, state: &AppState) {
    if body.trim().is_empty() {
        return;
    }

    let chat_id = ChatId(msg.chat.id.0);
    let sink = Arc::new(ChatSink::new(state.messenger.clone(), chat_id));
    // The drain task runs detached.
    drop(state.dispatcher.on_inbound_event(
        InboundEvent {
            sender: SenderId::from(chat_id),
            body,
        },
        sink,
    ));
}
