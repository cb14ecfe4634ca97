use callhook_dashboard::cache::{QueryCache, QueryKey, Resource};
use callhook_dashboard::realtime::{SocketConfig, SocketTransport};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Accept one websocket connection, report every frame the client sends
/// and push `postgres_changes` frames fed through the returned sender
async fn fake_realtime() -> (String, mpsc::UnboundedReceiver<Value>, mpsc::UnboundedSender<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Value>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let frame: Value = serde_json::from_str(&text).unwrap();
                        let reply = json!({
                            "topic": frame["topic"],
                            "event": "phx_reply",
                            "payload": {"status": "ok", "response": {}},
                            "ref": frame["ref"],
                        });
                        sink.send(Message::Text(reply.to_string().into())).await.unwrap();
                        let _ = seen_tx.send(frame);
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                },
                push = push_rx.recv() => match push {
                    Some(frame) => sink.send(Message::Text(frame.to_string().into())).await.unwrap(),
                    None => break,
                },
            }
        }
    });

    (url, seen_rx, push_tx)
}

async fn next_frame(seen: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(Duration::from_secs(5), seen.recv())
        .await
        .expect("timed out waiting for a client frame")
        .expect("fake server stopped")
}

#[tokio::test]
async fn test_calls_notification_invalidates_calls_and_dashboard() {
    let (url, mut seen, push) = fake_realtime().await;
    let bridge = SocketTransport::bridge(SocketConfig::new(url, "anon").with_access_token("jwt"));

    let cache = QueryCache::default();
    let calls = QueryKey::new(Resource::Calls);
    let stats = QueryKey::scoped(Resource::Dashboard, "stats");
    for key in [&calls, &stats] {
        cache
            .fetch(key.clone(), || async { Ok::<_, String>(0u8) })
            .await
            .unwrap();
    }
    let mut invalidations = cache.subscribe();

    let watch = bridge.watch_calls(&cache);
    let join = next_frame(&mut seen).await;
    assert_eq!(join["event"], "phx_join");
    assert_eq!(join["topic"], "realtime:calls");
    assert_eq!(join["payload"]["access_token"], "jwt");
    assert_eq!(join["payload"]["config"]["postgres_changes"][0]["table"], "calls");

    push.send(json!({
        "topic": "realtime:calls",
        "event": "postgres_changes",
        "payload": {"data": {
            "table": "calls",
            "type": "INSERT",
            "record": {"id": "c1", "status": "missed"}
        }},
        "ref": null,
    }))
    .unwrap();

    let mut hit = Vec::new();
    while hit.len() < 2 {
        let key = tokio::time::timeout(Duration::from_secs(5), invalidations.recv())
            .await
            .expect("timed out waiting for invalidation")
            .unwrap();
        hit.push(key);
    }
    assert!(hit.contains(&calls));
    assert!(hit.contains(&stats));
    assert!(cache.peek::<u8>(&calls).unwrap().is_stale);

    drop(watch);
    let leave = next_frame(&mut seen).await;
    assert_eq!(leave["event"], "phx_leave");
    assert_eq!(leave["topic"], "realtime:calls");
}

#[tokio::test]
async fn test_shutdown_closes_the_connection() {
    let (url, mut seen, _push) = fake_realtime().await;
    let bridge = SocketTransport::bridge(SocketConfig::new(url, "anon").with_access_token("jwt"));
    let cache = QueryCache::default();

    let watch = bridge.watch_leads(&cache);
    let join = next_frame(&mut seen).await;
    assert_eq!(join["topic"], "realtime:leads");

    bridge.shutdown();
    assert!(bridge.active_channels().is_empty());

    // The fake server stops once the client closes; no leave is sent
    drop(watch);
    let closed = tokio::time::timeout(Duration::from_secs(5), seen.recv())
        .await
        .expect("connection was not closed");
    assert!(closed.is_none());
}
