use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::{
    domain::ChatId,
    messaging::{port::MessagingPort, types::ChatAction},
    ports::DeliverySink,
    Result,
};

/// Delivery sink bound to one chat of a messenger.
#[derive(Clone)]
pub struct ChatSink {
    messenger: Arc<dyn MessagingPort>,
    chat_id: ChatId,
}

impl ChatSink {
    pub fn new(messenger: Arc<dyn MessagingPort>, chat_id: ChatId) -> Self {
        Self { messenger, chat_id }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }
}

impl fmt::Debug for ChatSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSink")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DeliverySink for ChatSink {
    async fn deliver(&self, chunk: &str) -> Result<()> {
        self.messenger.send_text(self.chat_id, chunk).await?;
        Ok(())
    }

    async fn signal_typing(&self) -> Result<()> {
        self.messenger
            .send_chat_action(self.chat_id, ChatAction::Typing)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::{MessageId, MessageRef};

    #[derive(Default)]
    struct FakeMessenger {
        texts: Mutex<Vec<(ChatId, String)>>,
        actions: Mutex<Vec<(ChatId, ChatAction)>>,
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            let mut texts = self.texts.lock().unwrap();
            texts.push((chat_id, text.to_string()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(texts.len() as i32),
            })
        }

        async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
            self.actions.lock().unwrap().push((chat_id, action));
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivers_chunks_and_typing_to_bound_chat() {
        let messenger = Arc::new(FakeMessenger::default());
        let sink = ChatSink::new(messenger.clone(), ChatId(42));
        assert_eq!(sink.chat_id(), ChatId(42));

        sink.signal_typing().await.unwrap();
        sink.deliver("hola").await.unwrap();

        assert_eq!(
            *messenger.texts.lock().unwrap(),
            vec![(ChatId(42), "hola".to_string())]
        );
        assert_eq!(
            *messenger.actions.lock().unwrap(),
            vec![(ChatId(42), ChatAction::Typing)]
        );
    }
}
