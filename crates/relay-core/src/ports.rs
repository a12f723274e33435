use async_trait::async_trait;

use crate::{conversation::ConversationState, Result};

/// External text-completion service.
///
/// May be slow and may fail; the core never retries.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn ask(&self, conversation: &ConversationState, text: &str) -> Result<String>;
}

/// Outbound channel back to one sender.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Deliver a single reply chunk.
    async fn deliver(&self, chunk: &str) -> Result<()>;

    /// Best-effort presence ("typing...") signal.
    async fn signal_typing(&self) -> Result<()> {
        Ok(())
    }
}
