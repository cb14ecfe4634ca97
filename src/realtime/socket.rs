//! Websocket transport speaking the Phoenix channel protocol used by
//! Supabase realtime.

use std::collections::BTreeMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::{ChangeEvent, ChangeKind, ChannelSpec, RealtimeBridge, RealtimeError, RealtimeTransport, Table};

/// Protocol version sent in the connect URL
const PROTOCOL_VSN: &str = "1.0.0";

#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Supabase project URL (http or https)
    pub supabase_url: String,
    pub api_key: String,
    /// User token sent with each join so row-level security applies
    pub access_token: Option<String>,
    pub heartbeat_interval: Duration,
    pub max_reconnect_delay: Duration,
}

impl SocketConfig {
    pub fn new(supabase_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            supabase_url: supabase_url.into(),
            api_key: api_key.into(),
            access_token: None,
            heartbeat_interval: Duration::from_secs(30),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Websocket endpoint: `ws(s)://<host>/realtime/v1/websocket?apikey=..&vsn=..`
    pub fn endpoint(&self) -> Result<String, RealtimeError> {
        let base = self.supabase_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else if base.starts_with("wss://") || base.starts_with("ws://") {
            base.to_string()
        } else {
            return Err(RealtimeError::Connect(format!(
                "unsupported realtime URL scheme: {}",
                self.supabase_url
            )));
        };
        Ok(format!(
            "{}/realtime/v1/websocket?apikey={}&vsn={}",
            ws_base, self.api_key, PROTOCOL_VSN
        ))
    }
}

#[derive(Debug)]
enum Command {
    Join(ChannelSpec),
    Leave(ChannelSpec),
    Shutdown,
}

/// Handle to the background websocket task. Dropping every handle or
/// calling `shutdown` closes the connection.
#[derive(Debug, Clone)]
pub struct SocketTransport {
    commands: mpsc::UnboundedSender<Command>,
}

impl SocketTransport {
    /// Start the connection task. Change events arrive on the returned
    /// receiver.
    pub fn spawn(config: SocketConfig) -> (Self, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(config, command_rx, events));
        (Self { commands }, event_rx)
    }

    /// Bridge backed by a websocket connection
    pub fn bridge(config: SocketConfig) -> RealtimeBridge {
        let (transport, events) = Self::spawn(config);
        RealtimeBridge::with_events(std::sync::Arc::new(transport), events)
    }
}

impl RealtimeTransport for SocketTransport {
    fn join(&self, channel: &ChannelSpec) {
        let _ = self.commands.send(Command::Join(channel.clone()));
    }

    fn leave(&self, channel: &ChannelSpec) {
        let _ = self.commands.send(Command::Leave(channel.clone()));
    }

    fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

enum SessionEnd {
    /// Shutdown requested or every transport handle is gone
    Shutdown,
    /// Server closed the connection
    Closed,
}

/// Channel membership, kept across reconnects
type Channels = BTreeMap<String, ChannelSpec>;

/// Apply a membership change. Returns the frame to send if the set changed.
fn apply(channels: &mut Channels, command: Command, access_token: Option<&str>, reference: u64) -> Option<Value> {
    match command {
        Command::Join(spec) => {
            let topic = spec.topic();
            if channels.contains_key(&topic) {
                return None;
            }
            let frame = join_frame(&spec, access_token, reference);
            channels.insert(topic, spec);
            Some(frame)
        }
        Command::Leave(spec) => {
            let topic = spec.topic();
            channels.remove(&topic)?;
            Some(leave_frame(&topic, reference))
        }
        Command::Shutdown => None,
    }
}

async fn run(
    config: SocketConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ChangeEvent>,
) {
    let endpoint = match config.endpoint() {
        Ok(endpoint) => endpoint,
        Err(e) => {
            warn!("{e}; realtime notifications disabled");
            return;
        }
    };

    let mut channels = Channels::new();
    let mut backoff = Duration::from_secs(1);

    loop {
        match session(&config, &endpoint, &mut commands, &mut channels, &events).await {
            Ok(SessionEnd::Shutdown) => {
                info!("realtime transport stopped");
                return;
            }
            Ok(SessionEnd::Closed) => {
                info!("realtime connection closed by server");
                backoff = Duration::from_secs(1);
            }
            Err(e) => {
                warn!(backoff_secs = backoff.as_secs(), "{e}");
            }
        }

        // Keep tracking membership while disconnected
        let sleep = tokio::time::sleep(backoff);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => {
                        info!("realtime transport stopped");
                        return;
                    }
                    Some(command) => {
                        apply(&mut channels, command, config.access_token.as_deref(), 0);
                    }
                },
            }
        }
        backoff = (backoff * 2).min(config.max_reconnect_delay);
    }
}

async fn session(
    config: &SocketConfig,
    endpoint: &str,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    channels: &mut Channels,
    events: &mpsc::UnboundedSender<ChangeEvent>,
) -> Result<SessionEnd, RealtimeError> {
    let (ws_stream, _) = connect_async(endpoint)
        .await
        .map_err(|e| RealtimeError::Connect(e.to_string()))?;
    let (mut sink, mut stream) = ws_stream.split();
    info!(channels = channels.len(), "realtime connected");

    let mut reference: u64 = 0;
    let mut next_ref = || {
        reference += 1;
        reference
    };

    for spec in channels.values() {
        let frame = join_frame(spec, config.access_token.as_deref(), next_ref());
        sink.send(Message::Text(frame.to_string().into()))
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;
    }

    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let command = match command {
                    Some(Command::Shutdown) | None => {
                        let _ = sink.close().await;
                        return Ok(SessionEnd::Shutdown);
                    }
                    Some(command) => command,
                };
                if let Some(frame) = apply(channels, command, config.access_token.as_deref(), next_ref()) {
                    sink.send(Message::Text(frame.to_string().into()))
                        .await
                        .map_err(|e| RealtimeError::Connect(e.to_string()))?;
                }
            }
            _ = heartbeat.tick() => {
                sink.send(Message::Text(heartbeat_frame(next_ref()).to_string().into()))
                    .await
                    .map_err(|e| RealtimeError::Connect(e.to_string()))?;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match parse_frame(&text) {
                    Ok(Some(event)) => {
                        if events.send(event).is_err() {
                            return Ok(SessionEnd::Shutdown);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("{e}"),
                },
                Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(RealtimeError::Connect(e.to_string())),
            },
        }
    }
}

// =============================================================================
// Frames
// =============================================================================

#[derive(Debug, Deserialize)]
struct Frame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
}

pub(crate) fn join_frame(spec: &ChannelSpec, access_token: Option<&str>, reference: u64) -> Value {
    let mut change = Map::new();
    change.insert("event".into(), json!(spec.table.event()));
    change.insert("schema".into(), json!("public"));
    change.insert("table".into(), json!(spec.table.as_str()));
    if let Some(ref filter) = spec.filter {
        change.insert("filter".into(), json!(filter.to_string()));
    }

    let mut payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [Value::Object(change)],
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = json!(token);
    }

    json!({
        "topic": spec.topic(),
        "event": "phx_join",
        "payload": payload,
        "ref": reference.to_string(),
    })
}

fn leave_frame(topic: &str, reference: u64) -> Value {
    json!({
        "topic": topic,
        "event": "phx_leave",
        "payload": {},
        "ref": reference.to_string(),
    })
}

fn heartbeat_frame(reference: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference.to_string(),
    })
}

/// Decode one server frame. Returns a change event for `postgres_changes`
/// frames on known tables, `None` for replies and anything else.
pub(crate) fn parse_frame(text: &str) -> Result<Option<ChangeEvent>, RealtimeError> {
    let frame: Frame =
        serde_json::from_str(text).map_err(|e| RealtimeError::Protocol(e.to_string()))?;

    match frame.event.as_str() {
        "postgres_changes" => {}
        "phx_reply" => {
            if frame.payload.get("status").and_then(Value::as_str) == Some("error") {
                warn!(topic = %frame.topic, "realtime join rejected: {}", frame.payload);
            }
            return Ok(None);
        }
        "phx_error" | "system" => {
            debug!(topic = %frame.topic, "realtime {}: {}", frame.event, frame.payload);
            return Ok(None);
        }
        _ => return Ok(None),
    }

    let Some(data) = frame.payload.get("data") else {
        return Ok(None);
    };
    let Some(table) = data.get("table").and_then(Value::as_str).and_then(Table::parse) else {
        return Ok(None);
    };
    let Some(kind) = data.get("type").and_then(Value::as_str).and_then(ChangeKind::parse) else {
        return Ok(None);
    };

    let mut event = ChangeEvent::new(table, kind).on_topic(frame.topic);
    let row = data
        .get("record")
        .and_then(Value::as_object)
        .filter(|record| !record.is_empty())
        .or_else(|| data.get("old_record").and_then(Value::as_object));
    if let Some(row) = row {
        for (column, value) in row {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            event.fields.insert(column.clone(), value);
        }
    }
    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::ChannelFilter;

    #[test]
    fn test_endpoint_from_https() {
        let config = SocketConfig::new("https://proj.supabase.co/", "anon-key");
        assert_eq!(
            config.endpoint().unwrap(),
            "wss://proj.supabase.co/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );
    }

    #[test]
    fn test_endpoint_from_http() {
        let config = SocketConfig::new("http://localhost:54321", "k");
        assert_eq!(
            config.endpoint().unwrap(),
            "ws://localhost:54321/realtime/v1/websocket?apikey=k&vsn=1.0.0"
        );
    }

    #[test]
    fn test_endpoint_rejects_unknown_scheme() {
        let config = SocketConfig::new("ftp://example.com", "k");
        assert!(matches!(config.endpoint(), Err(RealtimeError::Connect(_))));
    }

    #[test]
    fn test_join_frame_with_filter() {
        let spec = ChannelSpec::filtered(Table::Messages, ChannelFilter::eq("conversation_id", "c1"));
        let frame = join_frame(&spec, Some("jwt"), 3);

        assert_eq!(frame["topic"], "realtime:messages:conversation_id=eq.c1");
        assert_eq!(frame["event"], "phx_join");
        assert_eq!(frame["ref"], "3");
        assert_eq!(frame["payload"]["access_token"], "jwt");
        let change = &frame["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "INSERT");
        assert_eq!(change["schema"], "public");
        assert_eq!(change["table"], "messages");
        assert_eq!(change["filter"], "conversation_id=eq.c1");
    }

    #[test]
    fn test_join_frame_for_leads_listens_to_all_events() {
        let frame = join_frame(&ChannelSpec::table(Table::Leads), None, 1);
        let change = &frame["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "*");
        assert!(change.get("filter").is_none());
        assert!(frame["payload"].get("access_token").is_none());
    }

    #[test]
    fn test_parse_insert_frame() {
        let text = r#"{
            "topic": "realtime:messages",
            "event": "postgres_changes",
            "payload": {
                "data": {
                    "table": "messages",
                    "type": "INSERT",
                    "record": {"id": "m1", "conversation_id": "c1", "body": "hi", "meta": {"x": 1}}
                },
                "ids": [1]
            },
            "ref": null
        }"#;
        let event = parse_frame(text).unwrap().unwrap();
        assert_eq!(event.table, Table::Messages);
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.topic.as_deref(), Some("realtime:messages"));
        assert_eq!(event.fields.get("conversation_id").map(String::as_str), Some("c1"));
        assert!(!event.fields.contains_key("meta"));
    }

    #[test]
    fn test_parse_delete_uses_old_record() {
        let text = r#"{"topic":"realtime:leads","event":"postgres_changes","payload":{"data":{"table":"leads","type":"DELETE","record":{},"old_record":{"id":"l1"}}}}"#;
        let event = parse_frame(text).unwrap().unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert_eq!(event.fields.get("id").map(String::as_str), Some("l1"));
    }

    #[test]
    fn test_parse_ignores_replies_and_unknown_tables() {
        let reply = r#"{"topic":"realtime:calls","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#;
        assert!(parse_frame(reply).unwrap().is_none());

        let other = r#"{"topic":"realtime:x","event":"postgres_changes","payload":{"data":{"table":"audit_logs","type":"INSERT","record":{}}}}"#;
        assert!(parse_frame(other).unwrap().is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_frame("not json"), Err(RealtimeError::Protocol(_))));
    }

    #[test]
    fn test_apply_tracks_membership() {
        let mut channels = Channels::new();
        let spec = ChannelSpec::table(Table::Calls);

        assert!(apply(&mut channels, Command::Join(spec.clone()), None, 1).is_some());
        assert!(apply(&mut channels, Command::Join(spec.clone()), None, 2).is_none());
        let leave = apply(&mut channels, Command::Leave(spec.clone()), None, 3).unwrap();
        assert_eq!(leave["event"], "phx_leave");
        assert!(apply(&mut channels, Command::Leave(spec), None, 4).is_none());
        assert!(apply(&mut channels, Command::Shutdown, None, 5).is_none());
        assert!(channels.is_empty());
    }
}
