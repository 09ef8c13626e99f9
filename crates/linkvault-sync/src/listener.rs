//! Change listener: turns server-pushed events into refresh callbacks.

use crate::{ChangeEvent, ChangeFeed, SyncError, SyncResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// What a running subscription reports to its callback.
#[derive(Debug)]
pub enum Notification {
    Change(ChangeEvent),
    /// The stream reported an error and keeps running.
    Failed(SyncError),
    /// The server ended the stream; nothing follows.
    Closed,
}

/// Starts owner-scoped subscriptions on a [`ChangeFeed`].
#[derive(Clone)]
pub struct ChangeListener {
    feed: Arc<dyn ChangeFeed>,
}

impl ChangeListener {
    pub fn new(feed: Arc<dyn ChangeFeed>) -> Self {
        Self { feed }
    }

    /// Subscribe to changes on the rows of `owner_id` and call `on_notify`
    /// for every event, stream error and the end of the stream, until the
    /// returned handle is stopped or dropped.
    ///
    /// Events are not deduplicated against fetches the caller makes itself.
    /// A deliberate stop does not produce [`Notification::Closed`].
    pub async fn start<F, Fut>(&self, owner_id: &str, on_notify: F) -> SyncResult<Subscription>
    where
        F: Fn(Notification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut stream = self.feed.subscribe(owner_id).await?;
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let owner = owner_id.to_string();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        stream.close().await;
                        debug!(owner_id = %owner, "subscription stopped");
                        break;
                    }
                    next = stream.next_event() => match next {
                        Some(Ok(event)) => {
                            debug!(owner_id = %owner, kind = ?event.kind, row_id = ?event.row_id(), "change received");
                            on_notify(Notification::Change(event)).await;
                        }
                        Some(Err(e)) => {
                            warn!(owner_id = %owner, error = %e, "change stream error");
                            on_notify(Notification::Failed(e)).await;
                        }
                        None => {
                            warn!(owner_id = %owner, "change stream ended");
                            on_notify(Notification::Closed).await;
                            break;
                        }
                    }
                }
            }
        });

        info!(owner_id, "change listener started");
        Ok(Subscription {
            owner_id: owner_id.to_string(),
            stop_tx: Some(stop_tx),
            task: Some(task),
        })
    }
}

/// Live subscription handle. Dropping it tears the subscription down.
pub struct Subscription {
    owner_id: String,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// False once the stream has ended or the handle was stopped.
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Leave the channel and wait for the background task to finish.
    /// No callback runs after this returns.
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(STOP_TIMEOUT, &mut task).await.is_err() {
                warn!(owner_id = %self.owner_id, "subscription did not stop in time, aborting");
                task.abort();
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
