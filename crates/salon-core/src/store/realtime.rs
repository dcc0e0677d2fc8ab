//! Realtime change feed over the Phoenix channel websocket protocol.

use std::fmt;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::connect_async;

use super::{FeedItem, StoreError, StoreResult, Subscription, SubscriptionHandle};
use crate::models::{ChangeKind, RawChange, Table};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const JOIN_REF: &str = "1";

#[derive(Clone)]
pub struct RealtimeClient {
    socket_url: String,
    access_token: Option<String>,
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RealtimeClient")
            .field("socket_url", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl RealtimeClient {
    /// `base_url` is the project URL without any API suffix.
    pub fn new(
        base_url: &str,
        anon_key: impl Into<String>,
        access_token: Option<String>,
    ) -> StoreResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        let socket_base = if let Some(rest) = base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(StoreError::InvalidConfiguration(
                "Supabase URL must include http:// or https://".to_string(),
            ));
        };

        Ok(Self {
            socket_url: format!(
                "{socket_base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
                anon_key.into().trim()
            ),
            access_token,
        })
    }

    /// Open a socket and join the change channel of `table`.
    ///
    /// Each subscription owns its socket; the returned stream ends when the
    /// socket closes or the channel reports an error.
    pub async fn subscribe(&self, table: Table) -> StoreResult<Subscription> {
        let (socket, _) = connect_async(self.socket_url.as_str())
            .await
            .map_err(|error| StoreError::Feed(format!("connecting {table} feed: {error}")))?;
        let (mut write, read) = socket.split();

        let join = join_message(table, self.access_token.as_deref());
        write
            .send(WsMessage::Text(join.to_string()))
            .await
            .map_err(|error| StoreError::Feed(format!("joining {table} feed: {error}")))?;
        tracing::debug!("Joined realtime channel {}", topic(table));

        let (sender, subscription) = Subscription::channel(table);
        tokio::spawn(pump(write, read, sender, subscription.handle(), table));
        Ok(subscription)
    }
}

async fn pump<W, R>(
    mut write: W,
    mut read: R,
    sender: mpsc::UnboundedSender<FeedItem>,
    handle: SubscriptionHandle,
    table: Table,
) where
    W: Sink<WsMessage> + Unpin + Send + 'static,
    R: Stream<Item = Result<WsMessage, WsError>> + Unpin + Send + 'static,
{
    let mut heartbeat = interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            () = handle.cancelled() => {
                let leave = json!({
                    "topic": topic(table),
                    "event": "phx_leave",
                    "payload": {},
                    "ref": next_ref.to_string(),
                    "join_ref": JOIN_REF,
                });
                let _ = write.send(WsMessage::Text(leave.to_string())).await;
                let _ = write.close().await;
                break;
            }
            _ = heartbeat.tick() => {
                let beat = json!({
                    "topic": "phoenix",
                    "event": "heartbeat",
                    "payload": {},
                    "ref": next_ref.to_string(),
                });
                next_ref += 1;
                if write.send(WsMessage::Text(beat.to_string())).await.is_err() {
                    let _ = sender.send(Err(StoreError::Feed(format!(
                        "{table} feed heartbeat failed"
                    ))));
                    break;
                }
            }
            message = read.next() => match message {
                Some(Ok(WsMessage::Text(text))) => match parse_realtime_message(&text, table) {
                    Ok(Some(change)) => {
                        if sender.send(Ok(change)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(StoreError::InvalidPayload(reason)) => {
                        tracing::warn!("Skipping malformed {} feed message: {}", table, reason);
                    }
                    Err(error) => {
                        let _ = sender.send(Err(error));
                        break;
                    }
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    tracing::debug!("Realtime socket for {} closed", table);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    let _ = sender.send(Err(StoreError::Feed(format!("{table} feed: {error}"))));
                    break;
                }
            }
        }
    }
}

fn topic(table: Table) -> String {
    format!("realtime:public:{table}")
}

fn join_message(table: Table, access_token: Option<&str>) -> Value {
    let mut payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [
                { "event": "*", "schema": "public", "table": table.as_str() }
            ]
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = Value::String(token.to_string());
    }

    json!({
        "topic": topic(table),
        "event": "phx_join",
        "payload": payload,
        "ref": JOIN_REF,
        "join_ref": JOIN_REF,
    })
}

/// Decode one socket frame for the channel of `table`.
///
/// Returns `Ok(None)` for frames that carry no row change (replies,
/// heartbeats, presence), `Err(StoreError::Feed)` when the channel failed and
/// `Err(StoreError::InvalidPayload)` for frames that cannot be understood.
pub fn parse_realtime_message(text: &str, table: Table) -> StoreResult<Option<RawChange>> {
    let message: Value = serde_json::from_str(text)
        .map_err(|error| StoreError::InvalidPayload(format!("not JSON: {error}")))?;

    let topic_matches = message
        .get("topic")
        .and_then(Value::as_str)
        .map_or(true, |value| value == topic(table));
    if !topic_matches {
        return Ok(None);
    }

    let payload = message.get("payload").cloned().unwrap_or(Value::Null);
    match message.get("event").and_then(Value::as_str).unwrap_or_default() {
        "postgres_changes" => decode_postgres_change(&payload, table).map(Some),
        "phx_reply" | "system" if payload.get("status").and_then(Value::as_str) == Some("error") => {
            let reason = payload
                .get("response")
                .and_then(|response| response.get("reason"))
                .or_else(|| payload.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown reason");
            Err(StoreError::Feed(format!("{table} channel refused: {reason}")))
        }
        "phx_error" => Err(StoreError::Feed(format!("{table} channel crashed"))),
        "phx_close" => Err(StoreError::Feed(format!("{table} channel closed"))),
        _ => Ok(None),
    }
}

fn decode_postgres_change(payload: &Value, table: Table) -> StoreResult<RawChange> {
    let data = payload
        .get("data")
        .ok_or_else(|| StoreError::InvalidPayload("postgres_changes without data".to_string()))?;

    if let Some(source) = data.get("table").and_then(Value::as_str) {
        if source != table.as_str() {
            return Err(StoreError::InvalidPayload(format!(
                "change for {source} delivered on {table} channel"
            )));
        }
    }

    let kind: ChangeKind = data
        .get("type")
        .or_else(|| data.get("eventType"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .parse()
        .map_err(StoreError::InvalidPayload)?;
    let after = non_empty_row(data.get("record"));
    let before = non_empty_row(data.get("old_record"));

    match (kind, after, before) {
        (ChangeKind::Insert, Some(after), _) => Ok(RawChange::insert(table, after)),
        (ChangeKind::Update, Some(after), before) => Ok(RawChange::update(table, before, after)),
        (ChangeKind::Delete, _, Some(before)) => Ok(RawChange::delete(table, before)),
        (kind, _, _) => Err(StoreError::InvalidPayload(format!(
            "{kind} change on {table} is missing its row"
        ))),
    }
}

fn non_empty_row(row: Option<&Value>) -> Option<Value> {
    row.filter(|row| row.as_object().is_some_and(|fields| !fields.is_empty()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_builds_websocket_url() {
        let client = RealtimeClient::new("https://demo.supabase.co", "anon", None).unwrap();
        assert_eq!(
            client.socket_url,
            "wss://demo.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
        let local = RealtimeClient::new("http://localhost:54321", "anon", None).unwrap();
        assert!(local.socket_url.starts_with("ws://localhost:54321/"));
    }

    #[test]
    fn join_message_requests_all_events_for_table() {
        let join = join_message(Table::Appointments, Some("jwt"));
        assert_eq!(join["topic"], "realtime:public:appointments");
        assert_eq!(join["event"], "phx_join");
        assert_eq!(
            join["payload"]["config"]["postgres_changes"][0]["table"],
            "appointments"
        );
        assert_eq!(join["payload"]["access_token"], "jwt");
    }

    #[test]
    fn parse_insert_change() {
        let text = r#"{
            "topic": "realtime:public:clients",
            "event": "postgres_changes",
            "payload": { "data": {
                "schema": "public", "table": "clients", "type": "INSERT",
                "record": { "id": "a", "name": "Anna" }, "old_record": null
            }},
            "ref": null
        }"#;
        let change = parse_realtime_message(text, Table::Clients).unwrap().unwrap();
        assert_eq!(change, RawChange::insert(Table::Clients, json!({ "id": "a", "name": "Anna" })));
    }

    #[test]
    fn parse_delete_change_uses_old_record() {
        let text = r#"{
            "topic": "realtime:public:services",
            "event": "postgres_changes",
            "payload": { "data": {
                "table": "services", "type": "DELETE",
                "record": {}, "old_record": { "id": "s1" }
            }}
        }"#;
        let change = parse_realtime_message(text, Table::Services).unwrap().unwrap();
        assert_eq!(change.kind, ChangeKind::Delete);
        assert_eq!(change.row_id(), Some("s1"));
    }

    #[test]
    fn parse_ignores_replies_and_other_topics() {
        let ok_reply = r#"{"topic":"realtime:public:clients","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#;
        assert_eq!(parse_realtime_message(ok_reply, Table::Clients).unwrap(), None);

        let heartbeat = r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"error"},"ref":"2"}"#;
        assert_eq!(parse_realtime_message(heartbeat, Table::Clients).unwrap(), None);
    }

    #[test]
    fn parse_reports_channel_errors() {
        let refused = r#"{"topic":"realtime:public:clients","event":"phx_reply","payload":{"status":"error","response":{"reason":"unauthorized"}},"ref":"1"}"#;
        let error = parse_realtime_message(refused, Table::Clients).unwrap_err();
        assert!(matches!(error, StoreError::Feed(ref message) if message.contains("unauthorized")));

        let closed = r#"{"topic":"realtime:public:clients","event":"phx_close","payload":{}}"#;
        assert!(matches!(
            parse_realtime_message(closed, Table::Clients),
            Err(StoreError::Feed(_))
        ));
    }

    #[test]
    fn parse_rejects_malformed_frames() {
        assert!(matches!(
            parse_realtime_message("not json", Table::Clients),
            Err(StoreError::InvalidPayload(_))
        ));
        let missing_row = r#"{"topic":"realtime:public:clients","event":"postgres_changes","payload":{"data":{"type":"UPDATE","record":null}}}"#;
        assert!(matches!(
            parse_realtime_message(missing_row, Table::Clients),
            Err(StoreError::InvalidPayload(_))
        ));
    }
}
