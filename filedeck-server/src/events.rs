//! Upload notifications.
//!
//! Observers are told when an upload starts, succeeds or fails. Each observer
//! drains its own queue on a dedicated task, so it sees events in emit order
//! while a slow or failing observer never delays or changes the outcome of
//! the upload that triggered it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UploadEvent {
    Started { file_name: String },
    Succeeded { url: String },
    Failed { message: String },
}

impl UploadEvent {
    pub fn title(&self) -> &'static str {
        match self {
            UploadEvent::Started { .. } => "Upload Start",
            UploadEvent::Succeeded { .. } => "Upload Success",
            UploadEvent::Failed { .. } => "Upload Fail",
        }
    }

    pub fn body(&self) -> &str {
        match self {
            UploadEvent::Started { file_name } => file_name,
            UploadEvent::Succeeded { url } => url,
            UploadEvent::Failed { message } => message,
        }
    }
}

#[async_trait]
pub trait UploadObserver: Send + Sync {
    async fn notify(&self, event: &UploadEvent) -> anyhow::Result<()>;
}

/// Fan-out of upload events to every subscribed observer.
#[derive(Clone, Default)]
pub struct EventBus {
    queues: Vec<mpsc::UnboundedSender<UploadEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a delivery task for `observer`. Must be called inside a tokio runtime.
    pub fn subscribe(&mut self, observer: Arc<dyn UploadObserver>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<UploadEvent>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = observer.notify(&event).await {
                    warn!(title = event.title(), error = %e, "Upload observer failed");
                }
            }
        });
        self.queues.push(tx);
    }

    /// Queue the event for each observer and return at once.
    pub fn emit(&self, event: UploadEvent) {
        for queue in &self.queues {
            if queue.send(event.clone()).is_err() {
                warn!(title = event.title(), "Upload observer task has stopped");
            }
        }
    }
}

/// Posts `{"title", "body"}` JSON to a fixed endpoint for every event.
pub struct WebhookObserver {
    client: Client,
    url: String,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    body: &'a str,
}

impl WebhookObserver {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl UploadObserver for WebhookObserver {
    async fn notify(&self, event: &UploadEvent) -> anyhow::Result<()> {
        let payload = WebhookPayload {
            title: event.title(),
            body: event.body(),
        };
        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("Webhook request failed")?;

        if !resp.status().is_success() {
            bail!("Webhook returned HTTP {}", resp.status());
        }

        debug!(url = %self.url, title = payload.title, "Webhook delivered");
        Ok(())
    }
}
