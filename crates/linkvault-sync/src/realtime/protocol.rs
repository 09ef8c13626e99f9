//! Phoenix channel messages used by the realtime service.

use crate::{ChangeEvent, SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

pub const PHX_JOIN: &str = "phx_join";
pub const PHX_LEAVE: &str = "phx_leave";
pub const PHX_REPLY: &str = "phx_reply";
pub const PHX_ERROR: &str = "phx_error";
pub const PHX_CLOSE: &str = "phx_close";
pub const HEARTBEAT: &str = "heartbeat";
pub const POSTGRES_CHANGES: &str = "postgres_changes";
const SYSTEM: &str = "system";
const PHOENIX_TOPIC: &str = "phoenix";
const PROTOCOL_VSN: &str = "1.0.0";

/// One frame on the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

/// Topic name for a channel.
pub fn channel_topic(name: &str) -> String {
    format!("realtime:{}", name)
}

/// Websocket endpoint derived from the project URL.
pub fn realtime_url(api_base: &str, publishable_key: &str) -> SyncResult<Url> {
    let mut url = Url::parse(api_base)?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(SyncError::Realtime(format!(
                "unsupported scheme for realtime: {}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| SyncError::Realtime("cannot switch to websocket scheme".into()))?;
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", publishable_key)
        .append_pair("vsn", PROTOCOL_VSN);
    Ok(url)
}

impl PhoenixMessage {
    /// Join `topic`, listening to every change on `table` rows owned by `owner_id`.
    pub fn join(topic: &str, table: &str, owner_id: &str, access_token: &str, msg_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: PHX_JOIN.to_string(),
            payload: json!({
                "config": {
                    "broadcast": {"ack": false, "self": false},
                    "presence": {"key": ""},
                    "postgres_changes": [{
                        "event": "*",
                        "schema": "public",
                        "table": table,
                        "filter": format!("user_id=eq.{}", owner_id),
                    }],
                },
                "access_token": access_token,
            }),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: Some(msg_ref.to_string()),
        }
    }

    pub fn heartbeat(msg_ref: &str) -> Self {
        Self {
            topic: PHOENIX_TOPIC.to_string(),
            event: HEARTBEAT.to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: None,
        }
    }

    pub fn leave(topic: &str, msg_ref: &str, join_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: PHX_LEAVE.to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: Some(join_ref.to_string()),
        }
    }

    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Whether this is the reply to the message sent with `msg_ref` on `topic`.
    pub fn is_reply_to(&self, topic: &str, msg_ref: &str) -> bool {
        self.event == PHX_REPLY && self.topic == topic && self.msg_ref.as_deref() == Some(msg_ref)
    }

    /// `status` of a `phx_reply`.
    pub fn reply_status(&self) -> Option<&str> {
        if self.event != PHX_REPLY {
            return None;
        }
        self.payload.get("status").and_then(Value::as_str)
    }

    /// Interpret a frame received on `topic`.
    ///
    /// Returns `None` for frames that carry nothing for the subscriber
    /// (replies, presence, other topics).
    pub fn channel_event(&self, topic: &str) -> Option<SyncResult<ChangeEvent>> {
        if self.topic != topic {
            return None;
        }
        match self.event.as_str() {
            POSTGRES_CHANGES => {
                let data = self.payload.get("data").cloned().unwrap_or(Value::Null);
                Some(serde_json::from_value(data).map_err(SyncError::from))
            }
            PHX_ERROR => Some(Err(SyncError::Realtime("channel error".into()))),
            PHX_CLOSE => Some(Err(SyncError::Realtime("channel closed by server".into()))),
            SYSTEM if self.payload.get("status").and_then(Value::as_str) == Some("error") => {
                let message = self
                    .payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("subscription failed");
                Some(Err(SyncError::Realtime(message.to_string())))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChangeKind;

    #[test]
    fn test_realtime_url() {
        let url = realtime_url("https://abc.supabase.co/", "pk").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=pk&vsn=1.0.0"
        );

        let local = realtime_url("http://127.0.0.1:54321", "pk").unwrap();
        assert!(local.as_str().starts_with("ws://127.0.0.1:54321/realtime/v1/websocket?"));

        assert!(realtime_url("ftp://abc", "pk").is_err());
    }

    #[test]
    fn test_join_shape() {
        let join = PhoenixMessage::join("realtime:bookmarks-channel", "bookmarks", "user-1", "jwt", "1");
        let value: Value = serde_json::from_str(&join.to_json().unwrap()).unwrap();

        assert_eq!(value["topic"], "realtime:bookmarks-channel");
        assert_eq!(value["event"], "phx_join");
        assert_eq!(value["ref"], "1");
        assert_eq!(value["join_ref"], "1");
        assert_eq!(value["payload"]["access_token"], "jwt");

        let changes = &value["payload"]["config"]["postgres_changes"][0];
        assert_eq!(changes["event"], "*");
        assert_eq!(changes["schema"], "public");
        assert_eq!(changes["table"], "bookmarks");
        assert_eq!(changes["filter"], "user_id=eq.user-1");
    }

    #[test]
    fn test_heartbeat_shape() {
        let json = PhoenixMessage::heartbeat("7").to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["topic"], "phoenix");
        assert_eq!(value["event"], "heartbeat");
        assert_eq!(value["ref"], "7");
        assert!(value.get("join_ref").is_none());
    }

    #[test]
    fn test_join_reply() {
        let reply = PhoenixMessage::from_json(
            r#"{"topic":"realtime:c","event":"phx_reply","payload":{"status":"ok","response":{"postgres_changes":[{"id":1}]}},"ref":"1"}"#,
        )
        .unwrap();
        assert!(reply.is_reply_to("realtime:c", "1"));
        assert!(!reply.is_reply_to("realtime:c", "2"));
        assert_eq!(reply.reply_status(), Some("ok"));
        assert!(reply.channel_event("realtime:c").is_none());
    }

    #[test]
    fn test_postgres_change_event() {
        let frame = PhoenixMessage::from_json(
            r#"{
                "topic": "realtime:c",
                "event": "postgres_changes",
                "payload": {
                    "data": {
                        "type": "INSERT",
                        "table": "bookmarks",
                        "schema": "public",
                        "record": {"id": "b-1", "title": "GitHub"},
                        "old_record": null,
                        "commit_timestamp": "2024-05-01T10:00:00.000Z",
                        "columns": []
                    },
                    "ids": [1]
                },
                "ref": null
            }"#,
        )
        .unwrap();

        let event = frame.channel_event("realtime:c").unwrap().unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.row_id(), Some("b-1"));
        assert!(frame.channel_event("realtime:other").is_none());
    }

    #[test]
    fn test_channel_failures() {
        let error = PhoenixMessage::from_json(
            r#"{"topic":"realtime:c","event":"phx_error","payload":{},"ref":null}"#,
        )
        .unwrap();
        assert!(matches!(
            error.channel_event("realtime:c"),
            Some(Err(SyncError::Realtime(_)))
        ));

        let system = PhoenixMessage::from_json(
            r#"{"topic":"realtime:c","event":"system","payload":{"status":"error","message":"bad filter","extension":"postgres_changes"},"ref":null}"#,
        )
        .unwrap();
        match system.channel_event("realtime:c") {
            Some(Err(SyncError::Realtime(message))) => assert_eq!(message, "bad filter"),
            other => panic!("unexpected: {:?}", other.map(|r| r.is_ok())),
        }

        let ok_system = PhoenixMessage::from_json(
            r#"{"topic":"realtime:c","event":"system","payload":{"status":"ok"},"ref":null}"#,
        )
        .unwrap();
        assert!(ok_system.channel_event("realtime:c").is_none());
    }
}
