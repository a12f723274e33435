//! Per-sender conversation state handed to the completion client.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use crate::domain::SenderId;

/// State for one conversation partner.
///
/// The completion client stores its remote thread id here so follow-up
/// messages continue the same thread.
#[derive(Debug)]
pub struct ConversationState {
    sender: SenderId,
    thread_id: Mutex<Option<String>>,
}

impl ConversationState {
    pub fn new(sender: SenderId) -> Self {
        Self {
            sender,
            thread_id: Mutex::new(None),
        }
    }

    pub fn sender(&self) -> &SenderId {
        &self.sender
    }

    pub fn thread_id(&self) -> Option<String> {
        self.thread_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_thread_id(&self, id: impl Into<String>) {
        *self.thread_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(id.into());
    }
}

/// In-memory store of conversation states, one per sender.
#[derive(Debug, Default)]
pub struct ConversationStore {
    inner: Mutex<HashMap<SenderId, Arc<ConversationState>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, sender: &SenderId) -> Arc<ConversationState> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(sender.clone())
            .or_insert_with(|| Arc::new(ConversationState::new(sender.clone())))
            .clone()
    }

    /// Forget a sender's state; the next message starts a new thread.
    pub fn reset(&self, sender: &SenderId) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(sender)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
