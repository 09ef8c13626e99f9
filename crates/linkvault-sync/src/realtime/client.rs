//! Websocket client for the realtime service.

use super::protocol::{channel_topic, realtime_url, PhoenixMessage};
use crate::{AccessTokenProvider, ChangeEvent, ChangeFeed, ChangeStream, SyncError, SyncResult};
use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use linkvault_config_and_utils::Config;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};
use url::Url;

/// Realtime client configuration.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Channel name; the topic is `realtime:<name>`.
    pub channel_name: String,
    pub heartbeat_interval: Duration,
    /// How long to wait for the join reply.
    pub join_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_name: "bookmarks-channel".to_string(),
            heartbeat_interval: Duration::from_secs(25),
            join_timeout: Duration::from_secs(10),
        }
    }
}

/// [`ChangeFeed`] backed by the realtime websocket.
pub struct RealtimeFeed {
    url: Url,
    table: String,
    tokens: Arc<dyn AccessTokenProvider>,
    config: RealtimeConfig,
}

impl RealtimeFeed {
    pub fn new(
        api_base: &str,
        publishable_key: &str,
        table: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> SyncResult<Self> {
        Ok(Self {
            url: realtime_url(api_base, publishable_key)?,
            table: table.into(),
            tokens,
            config: RealtimeConfig::default(),
        })
    }

    pub fn from_config(config: &Config, tokens: Arc<dyn AccessTokenProvider>) -> SyncResult<Self> {
        Self::new(
            &config.api_base(),
            &config.supabase_publishable_key,
            &config.bookmarks_table,
            tokens,
        )
    }

    pub fn with_config(mut self, config: RealtimeConfig) -> Self {
        self.config = config;
        self
    }
}

/// Monotonic message refs shared by the tasks of one connection.
#[derive(Clone)]
struct RefCounter(Arc<AtomicU64>);

impl RefCounter {
    fn new() -> Self {
        Self(Arc::new(AtomicU64::new(1)))
    }

    fn next(&self) -> String {
        self.0.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

#[async_trait]
impl ChangeFeed for RealtimeFeed {
    async fn subscribe(&self, owner_id: &str) -> SyncResult<Box<dyn ChangeStream>> {
        let access_token = self.tokens.access_token().await?;
        let topic = channel_topic(&self.config.channel_name);
        let refs = RefCounter::new();

        info!(host = ?self.url.host_str(), %topic, "connecting to realtime");
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        let join_ref = refs.next();
        let join = PhoenixMessage::join(&topic, &self.table, owner_id, &access_token, &join_ref);
        write.send(Message::Text(join.to_json()?.into())).await?;
        debug!(%topic, join_ref = %join_ref, "sent phx_join");

        let reply = tokio::time::timeout(
            self.config.join_timeout,
            await_reply(&mut read, &topic, &join_ref),
        )
        .await
        .map_err(|_| SyncError::Timeout)??;

        if reply.reply_status() != Some("ok") {
            error!(%topic, payload = %reply.payload, "realtime join refused");
            return Err(SyncError::Realtime(format!(
                "join refused: {}",
                reply.payload
            )));
        }
        info!(%topic, owner_id, "subscribed to bookmark changes");

        let (msg_tx, mut msg_rx) = mpsc::channel::<Message>(32);
        let (event_tx, event_rx) = mpsc::channel::<SyncResult<ChangeEvent>>(64);

        let sender_handle = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        let heartbeat_sender = msg_tx.clone();
        let heartbeat_refs = refs.clone();
        let period = self.config.heartbeat_interval;
        let heartbeat_handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let heartbeat = PhoenixMessage::heartbeat(&heartbeat_refs.next());
                let Ok(json) = heartbeat.to_json() else {
                    continue;
                };
                if heartbeat_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        });

        let pong_sender = msg_tx.clone();
        let reader_topic = topic.clone();
        let reader_handle = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        let msg = match PhoenixMessage::from_json(text.as_str()) {
                            Ok(msg) => msg,
                            Err(e) => {
                                warn!(error = %e, "failed to parse realtime frame");
                                continue;
                            }
                        };
                        let Some(result) = msg.channel_event(&reader_topic) else {
                            continue;
                        };
                        let fatal = matches!(result, Err(SyncError::Realtime(_)));
                        if event_tx.send(result).await.is_err() || fatal {
                            break;
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        let _ = pong_sender.send(Message::Pong(data)).await;
                    }
                    Ok(Message::Close(_)) => {
                        info!("realtime connection closed");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "realtime websocket error");
                        let _ = event_tx.send(Err(e.into())).await;
                        break;
                    }
                }
            }
        });

        Ok(Box::new(RealtimeStream {
            topic,
            join_ref,
            refs,
            events: event_rx,
            msg_tx: Some(msg_tx),
            sender_handle: Some(sender_handle),
            background: vec![heartbeat_handle, reader_handle],
        }))
    }
}

/// Read frames until the reply to `msg_ref` arrives.
async fn await_reply<S>(read: &mut S, topic: &str, msg_ref: &str) -> SyncResult<PhoenixMessage>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = read.next().await {
        match frame? {
            Message::Text(text) => {
                let msg = PhoenixMessage::from_json(text.as_str())?;
                if msg.is_reply_to(topic, msg_ref) {
                    return Ok(msg);
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Err(SyncError::Realtime(
        "connection closed before join reply".to_string(),
    ))
}

/// A joined realtime channel.
pub struct RealtimeStream {
    topic: String,
    join_ref: String,
    refs: RefCounter,
    events: mpsc::Receiver<SyncResult<ChangeEvent>>,
    msg_tx: Option<mpsc::Sender<Message>>,
    sender_handle: Option<JoinHandle<()>>,
    background: Vec<JoinHandle<()>>,
}

#[async_trait]
impl ChangeStream for RealtimeStream {
    async fn next_event(&mut self) -> Option<SyncResult<ChangeEvent>> {
        self.events.recv().await
    }

    async fn close(&mut self) {
        for handle in self.background.drain(..) {
            handle.abort();
        }

        // Queue the leave, then drop the last sender so the writer drains and closes.
        if let Some(msg_tx) = self.msg_tx.take() {
            let leave = PhoenixMessage::leave(&self.topic, &self.refs.next(), &self.join_ref);
            if let Ok(json) = leave.to_json() {
                let _ = msg_tx.send(Message::Text(json.into())).await;
            }
        }

        if let Some(mut handle) = self.sender_handle.take() {
            if tokio::time::timeout(Duration::from_secs(2), &mut handle)
                .await
                .is_err()
            {
                handle.abort();
            }
        }
        debug!(topic = %self.topic, "left realtime channel");
    }
}

impl Drop for RealtimeStream {
    fn drop(&mut self) {
        for handle in self.background.drain(..) {
            handle.abort();
        }
        if let Some(handle) = self.sender_handle.take() {
            handle.abort();
        }
    }
}
