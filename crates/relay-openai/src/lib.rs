//! OpenAI adapter (Assistants API completion client).
//!
//! Each sender gets its own thread; every question is appended to that thread
//! and answered by a run of the configured assistant.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tracing::debug;

use relay_core::{
    config::Config, conversation::ConversationState, errors::Error, ports::CompletionClient,
    Result,
};

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub assistant_id: String,
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl From<&Config> for OpenAiConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            api_key: cfg.openai_api_key.clone(),
            assistant_id: cfg.assistant_id.clone(),
            base_url: cfg.openai_base_url.clone(),
            poll_interval: cfg.openai_poll_interval,
            request_timeout: cfg.openai_request_timeout,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OpenAiAssistantClient {
    cfg: OpenAiConfig,
    http: reqwest::Client,
}

impl OpenAiAssistantClient {
    pub fn new(cfg: OpenAiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|e| Error::External(format!("openai client build error: {e}")))?;
        Ok(Self { cfg, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.cfg.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let resp = req
            .bearer_auth(&self.cfg.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .send()
            .await
            .map_err(|e| Error::External(format!("openai request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "openai request failed: {status} {}",
                truncate(&body, 200)
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::External(format!("openai json error: {e}")))
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> Result<T> {
        self.send(self.http.post(self.url(path)).json(&body)).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.http.get(self.url(path))).await
    }

    async fn thread_for(&self, conversation: &ConversationState) -> Result<String> {
        if let Some(id) = conversation.thread_id() {
            return Ok(id);
        }
        let thread: Created = self.post("threads", json!({})).await?;
        debug!(sender = %conversation.sender(), thread = %thread.id, "created thread");
        conversation.set_thread_id(thread.id.clone());
        Ok(thread.id)
    }

    async fn wait_for_run(&self, thread_id: &str, mut run: Run) -> Result<Run> {
        loop {
            match run.state() {
                RunState::Completed => return Ok(run),
                RunState::Failed(reason) => return Err(Error::External(reason)),
                RunState::Pending => {
                    tokio::time::sleep(self.cfg.poll_interval).await;
                    run = self
                        .get(&format!("threads/{thread_id}/runs/{}", run.id))
                        .await?;
                }
            }
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiAssistantClient {
    async fn ask(&self, conversation: &ConversationState, text: &str) -> Result<String> {
        let thread_id = self.thread_for(conversation).await?;

        let _: Created = self
            .post(
                &format!("threads/{thread_id}/messages"),
                json!({ "role": "user", "content": text }),
            )
            .await?;

        let run: Run = self
            .post(
                &format!("threads/{thread_id}/runs"),
                json!({ "assistant_id": self.cfg.assistant_id }),
            )
            .await?;
        let run = self.wait_for_run(&thread_id, run).await?;

        let messages: MessageList = self
            .get(&format!(
                "threads/{thread_id}/messages?run_id={}&order=asc",
                run.id
            ))
            .await?;

        let reply = messages.assistant_text();
        if reply.trim().is_empty() {
            return Err(Error::External(
                "openai assistant returned an empty reply".to_string(),
            ));
        }
        Ok(reply)
    }
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Run {
    id: String,
    status: String,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum RunState {
    Pending,
    Completed,
    Failed(String),
}

impl Run {
    fn state(&self) -> RunState {
        match self.status.as_str() {
            "queued" | "in_progress" | "cancelling" => RunState::Pending,
            "completed" => RunState::Completed,
            other => {
                let detail = self
                    .last_error
                    .as_ref()
                    .map(|e| {
                        format!(
                            ": {} {}",
                            e.code.as_deref().unwrap_or("error"),
                            e.message.as_deref().unwrap_or("")
                        )
                    })
                    .unwrap_or_default();
                RunState::Failed(format!(
                    "openai run {} ended as {other}{}",
                    self.id,
                    detail.trim_end()
                ))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: String,
}

impl MessageList {
    /// Text of every assistant message, in list order, separated by blank lines.
    fn assistant_text(&self) -> String {
        self.data
            .iter()
            .filter(|m| m.role == "assistant")
            .flat_map(|m| m.content.iter())
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.value.as_str()),
                ContentPart::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
