use crate::domain::SenderId;

/// Core error type for the relay bot.
///
/// Adapter crates map their specific errors into this type so the queue and
/// processor can report failures consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("external error: {0}")]
    External(String),

    /// A completion call or a chunk delivery failed for one work item.
    #[error("processing failed for {sender}: {source}")]
    Processing {
        sender: SenderId,
        #[source]
        source: Box<Error>,
    },

    /// The queue registry's exclusion discipline was violated.
    #[error("registry inconsistency: {0}")]
    RegistryInconsistency(String),
}

impl Error {
    pub fn processing(sender: &SenderId, source: Error) -> Self {
        Error::Processing {
            sender: sender.clone(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
