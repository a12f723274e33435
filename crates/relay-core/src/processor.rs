use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use regex::Regex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::{errors::Error, ports::DeliverySink, queue::WorkItem, Result};

#[derive(Clone, Copy, Debug)]
pub struct ProcessorOptions {
    /// Send a typing indicator while waiting for the completion.
    pub typing_enabled: bool,
    /// How often the indicator is refreshed (messengers expire it after a few seconds).
    pub typing_interval: Duration,
}

impl ProcessorOptions {
    pub fn without_typing() -> Self {
        Self {
            typing_enabled: false,
            ..Self::default()
        }
    }
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            typing_enabled: true,
            typing_interval: Duration::from_secs(4),
        }
    }
}

/// Turns one work item into delivered reply chunks.
#[derive(Clone, Debug, Default)]
pub struct MessageProcessor {
    opts: ProcessorOptions,
}

impl MessageProcessor {
    pub fn new(opts: ProcessorOptions) -> Self {
        Self { opts }
    }

    /// Ask the completion client and deliver the reply chunk by chunk.
    ///
    /// Each delivery is awaited before the next one starts. Any completion or
    /// delivery failure aborts the item with [`Error::Processing`].
    pub async fn process(&self, item: &WorkItem) -> Result<()> {
        let typing = if self.opts.typing_enabled {
            Some(TypingIndicator::start(item.sink.clone(), self.opts.typing_interval).await)
        } else {
            None
        };

        let reply = item.completion.ask(&item.conversation, &item.body).await;

        if let Some(typing) = typing {
            typing.stop().await;
        }
        let reply = reply.map_err(|e| Error::processing(&item.sender, e))?;

        let chunks = split_reply(&reply);
        debug!(sender = %item.sender, chunks = chunks.len(), "delivering reply");
        for chunk in &chunks {
            item.sink
                .deliver(chunk)
                .await
                .map_err(|e| Error::processing(&item.sender, e))?;
        }
        Ok(())
    }
}

/// Split a completion reply into deliverable chunks.
///
/// Paragraphs are separated by two or more newlines. Each chunk is trimmed and
/// stripped of citation markers such as `【4:0†source】`, together with one
/// space in front of the marker so the surrounding words keep a single
/// separator. Chunks left empty are dropped.
pub fn split_reply(text: &str) -> Vec<String> {
    blank_lines()
        .split(text)
        .map(|chunk| {
            citation_marker()
                .replace_all(chunk.trim(), "")
                .trim()
                .to_string()
        })
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{2,}").expect("valid regex"))
}

fn citation_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]?【[^】]*】").expect("valid regex"))
}

/// Best-effort typing loop for one sink.
struct TypingIndicator {
    stop_tx: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl TypingIndicator {
    /// Signal once inline, then keep refreshing in the background.
    async fn start(sink: Arc<dyn DeliverySink>, interval: Duration) -> Self {
        signal(sink.as_ref()).await;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut tick = tokio::time::interval_at(start, interval);
            loop {
                tokio::select! {
                    _ = tick.tick() => signal(sink.as_ref()).await,
                    _ = &mut stop_rx => break,
                }
            }
        });
        Self { stop_tx, task }
    }

    /// Stop refreshing; returns once no further signal can be sent.
    async fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.task.await;
    }
}

async fn signal(sink: &dyn DeliverySink) {
    if let Err(e) = sink.signal_typing().await {
        debug!(error = %e, "typing indicator failed");
    }
}
