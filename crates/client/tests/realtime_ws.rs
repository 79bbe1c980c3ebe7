//! End-to-end tests against a real WebSocket server on a loopback socket.
//!
//! Timing-sensitive behavior (backoff schedules, fallback cadence) is covered
//! by the paused-time unit tests; these only prove the tungstenite transport
//! holds up against an actual peer.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

use opspulse_client::{ConnectionConfig, ConnectionState, RealtimeClient};
use opspulse_shared::{ClientCommand, ServerEvent};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn config_for(addr: SocketAddr) -> ConnectionConfig {
    ConnectionConfig {
        url: format!("ws://{addr}/metrics"),
        reconnect_interval: Duration::from_millis(50),
        heartbeat_interval: Duration::from_millis(100),
        ..ConnectionConfig::default()
    }
}

async fn wait_for(client: &RealtimeClient, state: ConnectionState) {
    let mut status = client.watch_status();
    timeout(Duration::from_secs(5), async {
        loop {
            if status.borrow().state == state {
                return;
            }
            status.changed().await.expect("controller alive");
        }
    })
    .await
    .expect("state not reached in time");
}

#[tokio::test]
async fn delivers_server_events_to_handlers() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::text(
            r#"{"type":"metrics","payload":{"metrics":{"cpu_usage":{"timestamp":"2026-08-30T12:00:00Z","value":55.0,"status":"healthy"}}}}"#,
        ))
        .await
        .unwrap();
        // Keep the socket open until the client hangs up.
        while ws.next().await.is_some() {}
    });

    let client = RealtimeClient::new(config_for(addr));
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let _guard = client.add_message_handler(move |event| {
        let _ = event_tx.send(event.clone());
    });

    client.connect();
    wait_for(&client, ConnectionState::Connected).await;

    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no event delivered")
        .expect("handler channel closed");
    let ServerEvent::Metrics { payload } = event else {
        panic!("expected metrics event, got {event:?}");
    };
    assert_eq!(payload.get("cpu_usage").unwrap().value, 55.0);

    client.disconnect();
}

#[tokio::test]
async fn heartbeats_flow_and_pongs_stay_internal() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (frame_tx, mut frames) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                let _ = frame_tx.send(text.to_string());
                if text.as_str() == r#"{"type":"ping"}"# {
                    // Answer the heartbeat, then push a real event right
                    // behind it.
                    ws.send(Message::text(r#"{"type":"pong"}"#)).await.unwrap();
                    ws.send(Message::text(r#"{"type":"anomalies","items":[]}"#))
                        .await
                        .unwrap();
                }
            }
        }
    });

    let client = RealtimeClient::new(config_for(addr));
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let _guard = client.add_message_handler(move |event| {
        let _ = event_tx.send(event.clone());
    });

    client.connect();
    wait_for(&client, ConnectionState::Connected).await;

    let ping = timeout(Duration::from_secs(5), frames.recv())
        .await
        .expect("no heartbeat sent")
        .expect("server task ended");
    assert_eq!(ping, r#"{"type":"ping"}"#);

    // The pong went over the wire first; if it were forwarded it would arrive
    // ahead of the anomalies event.
    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no event delivered")
        .expect("handler channel closed");
    assert_eq!(event, ServerEvent::Anomalies { items: vec![] });

    client.disconnect();
}

#[tokio::test]
async fn reconnects_after_losing_the_socket() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (conn_tx, mut conns) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        // First connection: wait for traffic, then drop the socket without a
        // close handshake.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ = ws.next().await;
        drop(ws);

        // Second connection stays up.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ = conn_tx.send(());
        while ws.next().await.is_some() {}
    });

    let client = RealtimeClient::new(config_for(addr));
    client.connect();
    wait_for(&client, ConnectionState::Connected).await;
    client.send(ClientCommand::Subscribe {
        channel: "metrics".to_string(),
    });

    timeout(Duration::from_secs(5), conns.recv())
        .await
        .expect("no reconnect")
        .expect("server task ended");
    wait_for(&client, ConnectionState::Connected).await;
    assert_eq!(client.reconnect_attempts(), 0);

    client.disconnect();
}

#[tokio::test]
async fn manual_disconnect_sends_the_manual_close_code() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (close_tx, mut closes) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Close(frame) = message {
                let _ = close_tx.send(frame);
                break;
            }
        }
    });

    let client = RealtimeClient::new(config_for(addr));
    client.connect();
    wait_for(&client, ConnectionState::Connected).await;

    client.disconnect();
    wait_for(&client, ConnectionState::Disconnected).await;

    let frame = timeout(Duration::from_secs(5), closes.recv())
        .await
        .expect("no close frame")
        .expect("server task ended")
        .expect("close frame carries a body");
    assert_eq!(frame.code, CloseCode::Library(4000));
    assert_eq!(frame.reason.as_str(), "manual disconnect");
}
