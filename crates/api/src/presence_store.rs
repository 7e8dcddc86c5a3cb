//! External presence store
//!
//! Mirrors online/offline transitions to the profile store through an HTTP
//! webhook. Updates are queued to a single writer task that delivers them in
//! the order they were recorded, retrying transient failures with exponential
//! backoff before moving on. The relay path never waits on it.

use std::time::Duration;

use chatline_shared::{PresenceStatus, SharedError, UserIdentity};
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;

/// Base delay for retry backoff
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Maximum delay between retries
const RETRY_MAX_DELAY: Duration = Duration::from_secs(2);

/// Body posted to the webhook
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub user_id: UserIdentity,
    pub status: PresenceStatus,
    /// RFC 3339 timestamp of the transition
    pub at: String,
}

impl PresenceUpdate {
    pub fn now(user_id: UserIdentity, status: PresenceStatus) -> Self {
        let at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self { user_id, status, at }
    }
}

enum Command {
    Write(PresenceUpdate),
    Flush(oneshot::Sender<()>),
}

struct WebhookSink {
    client: reqwest::Client,
    url: String,
    max_retries: usize,
    retry_base: Duration,
}

/// Handle to the optional external presence store
///
/// Cheap to clone; every clone feeds the same writer. A disabled store
/// accepts updates and drops them.
#[derive(Clone, Default)]
pub struct PresenceStore {
    queue: Option<mpsc::UnboundedSender<Command>>,
}

impl PresenceStore {
    /// Store that discards every update
    pub fn disabled() -> Self {
        Self { queue: None }
    }

    /// Store posting to `url`
    ///
    /// Spawns the writer task, so it must be called inside a tokio runtime.
    pub fn webhook(
        url: impl Into<String>,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self, SharedError> {
        Self::start(WebhookSink::new(url, timeout, max_retries)?)
    }

    /// Build from configuration; a bad webhook setup disables the store rather than failing startup
    pub fn from_config(config: &Config) -> Self {
        let Some(url) = config.presence_webhook_url.as_deref() else {
            return Self::disabled();
        };

        match Self::webhook(
            url,
            config.presence_webhook_timeout(),
            config.presence_webhook_max_retries,
        ) {
            Ok(store) => {
                tracing::info!(url = %url, "Presence webhook enabled");
                store
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to start presence webhook, presence store disabled");
                Self::disabled()
            }
        }
    }

    fn start(sink: WebhookSink) -> Result<Self, SharedError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SharedError::PresenceStore(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(run_writer(sink, rx));

        Ok(Self { queue: Some(tx) })
    }

    /// Whether updates are actually delivered anywhere
    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    /// Queue a transition without waiting for delivery
    ///
    /// Returns false when the store is disabled or its writer has stopped.
    pub fn record(&self, user_id: &UserIdentity, status: PresenceStatus) -> bool {
        let Some(queue) = self.queue.as_ref() else {
            return false;
        };

        let update = PresenceUpdate::now(user_id.clone(), status);
        if queue.send(Command::Write(update)).is_err() {
            tracing::warn!(user_id = %user_id, status = %status, "Presence writer stopped, update dropped");
            return false;
        }
        true
    }

    /// Wait until every update queued before this call has been handled
    pub async fn flush(&self) {
        let Some(queue) = self.queue.as_ref() else {
            return;
        };

        let (done_tx, done_rx) = oneshot::channel();
        if queue.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run_writer(sink: WebhookSink, mut queue: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = queue.recv().await {
        match command {
            Command::Write(update) => {
                if let Err(e) = sink.write(&update).await {
                    tracing::warn!(
                        error = %e,
                        user_id = %update.user_id,
                        status = %update.status,
                        "Failed to update presence store"
                    );
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    tracing::debug!("Presence writer stopped");
}

impl WebhookSink {
    fn new(url: impl Into<String>, timeout: Duration, max_retries: usize) -> Result<Self, SharedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SharedError::PresenceStore(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            max_retries,
            retry_base: RETRY_BASE_DELAY,
        })
    }

    /// Deliver one update, retrying transient failures
    async fn write(&self, update: &PresenceUpdate) -> Result<(), SharedError> {
        use tokio_retry::strategy::{jitter, ExponentialBackoff};
        use tokio_retry::RetryIf;

        let retry_strategy = ExponentialBackoff::from_millis(self.retry_base.as_millis() as u64)
            .max_delay(RETRY_MAX_DELAY)
            .map(jitter)
            .take(self.max_retries);

        RetryIf::spawn(
            retry_strategy,
            || self.post(update),
            |e: &SharedError| {
                tracing::debug!(error = %e, transient = e.is_transient(), "Presence store write failed");
                e.is_transient()
            },
        )
        .await
    }

    async fn post(&self, update: &PresenceUpdate) -> Result<(), SharedError> {
        let response = self
            .client
            .post(&self.url)
            .json(update)
            .send()
            .await
            .map_err(|e| SharedError::PresenceStore(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SharedError::PresenceStoreStatus(status.as_u16()))
        }
    }
}
