use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    conversation::ConversationStore,
    domain::InboundEvent,
    ports::{CompletionClient, DeliverySink},
    processor::MessageProcessor,
    queue::{DrainReport, QueueRegistry, WorkItem},
};

/// Entry point for inbound events.
///
/// Enqueues each event under its sender and spawns a drain task when the
/// sender was idle. Never blocks on processing.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<QueueRegistry>,
    processor: Arc<MessageProcessor>,
    conversations: Arc<ConversationStore>,
    completion: Arc<dyn CompletionClient>,
}

impl Dispatcher {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        processor: MessageProcessor,
        conversations: Arc<ConversationStore>,
    ) -> Self {
        Self {
            registry: Arc::new(QueueRegistry::new()),
            processor: Arc::new(processor),
            conversations,
            completion,
        }
    }

    pub fn registry(&self) -> &Arc<QueueRegistry> {
        &self.registry
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    /// Queue `event` for its sender, replying through `sink`.
    ///
    /// Returns the drain task's handle when this call started one; callers
    /// are free to drop it.
    pub fn on_inbound_event(
        &self,
        event: InboundEvent,
        sink: Arc<dyn DeliverySink>,
    ) -> Option<JoinHandle<DrainReport>> {
        let conversation = self.conversations.get_or_create(&event.sender);
        let item = WorkItem {
            sender: event.sender,
            body: event.body,
            conversation,
            sink,
            completion: self.completion.clone(),
        };

        let permit = self.registry.enqueue_and_try_start(item)?;
        debug!(sender = %permit.sender(), "spawning drain task");

        let registry = self.registry.clone();
        let processor = self.processor.clone();
        Some(tokio::spawn(async move {
            registry.drain(permit, processor).await
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::domain::SenderId;
    use crate::processor::ProcessorOptions;
    use crate::testing::{FakeCompletion, FakeSink};

    fn dispatcher(completion: Arc<FakeCompletion>) -> Dispatcher {
        Dispatcher::new(
            completion,
            MessageProcessor::new(ProcessorOptions::without_typing()),
            Arc::new(ConversationStore::new()),
        )
    }

    fn event(sender: &str, body: &str) -> InboundEvent {
        InboundEvent {
            sender: SenderId::from(sender),
            body: body.to_string(),
        }
    }

    async fn finish(handle: JoinHandle<DrainReport>) -> DrainReport {
        timeout(Duration::from_secs(5), handle)
            .await
            .expect("drain finished in time")
            .expect("drain task joined")
    }

    #[tokio::test]
    async fn events_for_one_sender_share_a_single_drain() {
        let (completion, gate) = FakeCompletion::echo().gated_on("1");
        let completion = Arc::new(completion);
        let sink = Arc::new(FakeSink::default());
        let d = dispatcher(completion.clone());

        let handle = d.on_inbound_event(event("a", "1"), sink.clone()).unwrap();
        assert!(d.on_inbound_event(event("a", "2"), sink.clone()).is_none());
        assert!(d.on_inbound_event(event("a", "3"), sink.clone()).is_none());

        gate.notify_one();
        let report = finish(handle).await;

        assert_eq!(report.processed, 3);
        assert_eq!(sink.delivered(), vec!["1", "2", "3"]);
        assert_eq!(completion.max_in_flight("a"), 1);
        assert!(d.registry().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn slow_sender_does_not_delay_other_senders() {
        let (completion, slow_gate) = FakeCompletion::echo().gated_on("slow");
        let completion = Arc::new(completion);
        let slow_sink = Arc::new(FakeSink::default());
        let fast_sink = Arc::new(FakeSink::default());
        let d = dispatcher(completion.clone());

        let slow = d
            .on_inbound_event(event("a", "slow"), slow_sink.clone())
            .unwrap();
        let fast = d
            .on_inbound_event(event("b", "fast"), fast_sink.clone())
            .unwrap();

        // B finishes while A is still waiting on its completion.
        finish(fast).await;
        assert_eq!(fast_sink.delivered(), vec!["fast"]);
        assert!(slow_sink.delivered().is_empty());
        assert!(d.registry().is_draining(&SenderId::from("a")));
        assert_eq!(d.registry().active_senders(), vec![SenderId::from("a")]);

        slow_gate.notify_one();
        finish(slow).await;
        assert_eq!(slow_sink.delivered(), vec!["slow"]);
        assert!(d.registry().is_empty());
    }

    #[tokio::test]
    async fn failed_item_does_not_block_the_rest_of_the_queue() {
        let completion = Arc::new(FakeCompletion::echo().failing_on("2"));
        let sink = Arc::new(FakeSink::default());
        let d = dispatcher(completion.clone());

        let handle = d.on_inbound_event(event("a", "1"), sink.clone()).unwrap();
        d.on_inbound_event(event("a", "2"), sink.clone());
        d.on_inbound_event(event("a", "3"), sink.clone());

        let report = finish(handle).await;
        assert_eq!(report, DrainReport { processed: 2, failed: 1 });
        assert_eq!(sink.delivered(), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn sender_starts_fresh_after_going_idle() {
        let completion = Arc::new(FakeCompletion::echo());
        let sink = Arc::new(FakeSink::default());
        let d = dispatcher(completion.clone());
        let a = SenderId::from("a");

        let first = d.on_inbound_event(event("a", "1"), sink.clone()).unwrap();
        finish(first).await;
        assert!(!d.registry().is_tracked(&a));

        let second = d
            .on_inbound_event(event("a", "2"), sink.clone())
            .expect("idle sender gets a new drain");
        assert_eq!(finish(second).await.processed, 1);
        assert_eq!(sink.delivered(), vec!["1", "2"]);

        // Conversation state outlives the queue.
        assert_eq!(d.conversations().len(), 1);
    }

    #[tokio::test]
    async fn aborted_drain_does_not_strand_the_sender() {
        let (completion, _gate) = FakeCompletion::echo().gated_on("1");
        let completion = Arc::new(completion);
        let sink = Arc::new(FakeSink::default());
        let d = dispatcher(completion.clone());

        let first = d.on_inbound_event(event("a", "1"), sink.clone()).unwrap();
        timeout(Duration::from_secs(5), async {
            while completion.asked().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("first item started");
        first.abort();
        let _ = first.await;

        let second = d
            .on_inbound_event(event("a", "2"), sink.clone())
            .expect("sender is drained again after an abort");
        assert_eq!(finish(second).await.processed, 1);
        assert_eq!(sink.delivered(), vec!["2"]);
        assert!(d.registry().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_senders_keep_per_sender_order() {
        let completion = Arc::new(FakeCompletion::echo());
        let d = dispatcher(completion.clone());
        let senders = ["a", "b", "c", "d"];
        let sinks: Vec<Arc<FakeSink>> = senders.iter().map(|_| Arc::default()).collect();

        let mut handles = Vec::new();
        for i in 0..25 {
            for (sender, sink) in senders.iter().zip(&sinks) {
                let body = format!("{sender}{i}");
                if let Some(h) = d.on_inbound_event(event(sender, &body), sink.clone()) {
                    handles.push(h);
                }
            }
        }
        for h in handles {
            finish(h).await;
        }

        for (sender, sink) in senders.iter().zip(&sinks) {
            let expected: Vec<String> = (0..25).map(|i| format!("{sender}{i}")).collect();
            assert_eq!(sink.delivered(), expected);
            assert_eq!(completion.max_in_flight(sender), 1);
        }
        assert!(d.registry().is_empty());
    }
}
