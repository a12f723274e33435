//! Hand-written fakes for the collaborator ports.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    conversation::ConversationState,
    domain::SenderId,
    errors::Error,
    ports::{CompletionClient, DeliverySink},
    queue::WorkItem,
    Result,
};

pub fn work_item(
    sender: &str,
    body: &str,
    completion: &Arc<FakeCompletion>,
    sink: &Arc<FakeSink>,
) -> WorkItem {
    let sender = SenderId::from(sender);
    WorkItem {
        conversation: Arc::new(ConversationState::new(sender.clone())),
        sender,
        body: body.to_string(),
        sink: sink.clone(),
        completion: completion.clone(),
    }
}

#[derive(Default)]
pub struct FakeCompletion {
    fixed_reply: Option<String>,
    fail_on: Vec<String>,
    panic_on: Vec<String>,
    gates: HashMap<String, Arc<Notify>>,
    asked: Mutex<Vec<String>>,
    in_flight: Mutex<HashMap<SenderId, usize>>,
    max_in_flight: Mutex<HashMap<SenderId, usize>>,
}

impl FakeCompletion {
    /// Replies with the question itself.
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn replying(reply: &str) -> Self {
        Self {
            fixed_reply: Some(reply.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, body: &str) -> Self {
        self.fail_on.push(body.to_string());
        self
    }

    pub fn panicking_on(mut self, body: &str) -> Self {
        self.panic_on.push(body.to_string());
        self
    }

    /// Hold the reply for `body` until the returned gate is notified.
    pub fn gated_on(mut self, body: &str) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gates.insert(body.to_string(), gate.clone());
        (self, gate)
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    /// Highest number of concurrent `ask` calls seen for `sender`.
    pub fn max_in_flight(&self, sender: &str) -> usize {
        self.max_in_flight
            .lock()
            .unwrap()
            .get(&SenderId::from(sender))
            .copied()
            .unwrap_or(0)
    }

    fn enter(&self, sender: &SenderId) {
        let mut in_flight = self.in_flight.lock().unwrap();
        let n = in_flight.entry(sender.clone()).or_insert(0);
        *n += 1;
        let mut max = self.max_in_flight.lock().unwrap();
        let m = max.entry(sender.clone()).or_insert(0);
        *m = (*m).max(*n);
    }

    fn leave(&self, sender: &SenderId) {
        if let Some(n) = self.in_flight.lock().unwrap().get_mut(sender) {
            *n -= 1;
        }
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn ask(&self, conversation: &ConversationState, text: &str) -> Result<String> {
        let sender = conversation.sender().clone();
        self.asked.lock().unwrap().push(text.to_string());
        self.enter(&sender);

        if let Some(gate) = self.gates.get(text) {
            gate.notified().await;
        }
        tokio::task::yield_now().await;
        self.leave(&sender);

        if self.panic_on.iter().any(|b| b == text) {
            panic!("completion client blew up on {text}");
        }
        if self.fail_on.iter().any(|b| b == text) {
            return Err(Error::External(format!("completion failed for {text}")));
        }
        Ok(self.fixed_reply.clone().unwrap_or_else(|| text.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Typing,
    Delivered(String),
}

#[derive(Default)]
pub struct FakeSink {
    fail_on: Vec<String>,
    fail_typing: bool,
    events: Mutex<Vec<SinkEvent>>,
}

impl FakeSink {
    pub fn failing_on(mut self, chunk: &str) -> Self {
        self.fail_on.push(chunk.to_string());
        self
    }

    pub fn failing_typing(mut self) -> Self {
        self.fail_typing = true;
        self
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn delivered(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Delivered(chunk) => Some(chunk),
                SinkEvent::Typing => None,
            })
            .collect()
    }
}

#[async_trait]
impl DeliverySink for FakeSink {
    async fn deliver(&self, chunk: &str) -> Result<()> {
        if self.fail_on.iter().any(|c| c == chunk) {
            return Err(Error::External(format!("delivery failed for {chunk}")));
        }
        tokio::task::yield_now().await;
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::Delivered(chunk.to_string()));
        Ok(())
    }

    async fn signal_typing(&self) -> Result<()> {
        if self.fail_typing {
            return Err(Error::External("typing failed".to_string()));
        }
        self.events.lock().unwrap().push(SinkEvent::Typing);
        Ok(())
    }
}
