//! Socket transport: one WebSocket per connect attempt, adapted into a pair of
//! channels so the controller never touches tungstenite types directly.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;

use opspulse_shared::ServerEvent;

/// Transport-level failures. Display strings are what consumers see in the
/// status projection, so they stay short and stable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The channel did not reach the open state within the configured timeout.
    #[error("Connection timeout")]
    Timeout,
    /// The connect handshake failed. Detail goes to the log, not the UI.
    #[error("WebSocket connection error")]
    Connect(String),
    /// The transport could not even be constructed (bad URL, bad header).
    #[error("{0}")]
    Construct(String),
}

/// Inbound side of an open socket.
#[derive(Debug)]
pub enum LinkEvent {
    Event(ServerEvent),
    /// The socket closed. `clean` means the peer sent a proper close frame.
    Closed { clean: bool },
}

/// Outbound side of an open socket.
#[derive(Debug)]
pub enum LinkCommand {
    Text(String),
    Close { code: u16, reason: String },
}

/// A live, open socket reduced to two channels. Dropping the link tears down
/// the pump tasks.
pub struct SocketLink {
    pub events: mpsc::UnboundedReceiver<LinkEvent>,
    pub commands: mpsc::UnboundedSender<LinkCommand>,
}

/// Seam between the controller and the concrete socket implementation.
/// Production uses [`WsConnector`]; tests script their own links.
#[async_trait]
pub trait SocketConnector: Send + Sync {
    async fn connect(&self, url: &str, protocols: &[String]) -> Result<SocketLink, TransportError>;
}

/// tokio-tungstenite backed connector.
pub struct WsConnector;

#[async_trait]
impl SocketConnector for WsConnector {
    async fn connect(&self, url: &str, protocols: &[String]) -> Result<SocketLink, TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::Construct(e.to_string()))?;
        if !protocols.is_empty() {
            let value = protocols
                .join(", ")
                .parse()
                .map_err(|_| TransportError::Construct("invalid sub-protocol list".to_string()))?;
            request
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", value);
        }

        let (stream, _response) = connect_async(request).await.map_err(|e| {
            tracing::debug!("websocket handshake failed: {e}");
            TransportError::Connect(e.to_string())
        })?;
        tracing::info!("websocket connected to {url}");

        let (mut write, mut read) = stream.split();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();

        // Read pump: parse inbound frames into ServerEvents.
        tokio::spawn(async move {
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerEvent>(text.as_str()) {
                            Ok(event) => {
                                if event_tx.send(LinkEvent::Event(event)).is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::warn!("unparseable message: {e}"),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!("websocket closed by peer: {frame:?}");
                        let _ = event_tx.send(LinkEvent::Closed { clean: true });
                        break;
                    }
                    // Pings are answered automatically by tungstenite; pongs
                    // and binary frames carry nothing for us.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("websocket read error: {e}");
                        let _ = event_tx.send(LinkEvent::Closed { clean: false });
                        break;
                    }
                    None => {
                        let _ = event_tx.send(LinkEvent::Closed { clean: false });
                        break;
                    }
                }
            }
        });

        // Write pump: serialize outbound frames; a Close command ends it.
        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                match command {
                    LinkCommand::Text(json) => {
                        if let Err(e) = write.send(Message::text(json)).await {
                            tracing::warn!("websocket send failed: {e}");
                            break;
                        }
                    }
                    LinkCommand::Close { code, reason } => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        if let Err(e) = write.send(Message::Close(Some(frame))).await {
                            tracing::debug!("websocket close failed: {e}");
                        }
                        break;
                    }
                }
            }
        });

        Ok(SocketLink {
            events: event_rx,
            commands: command_tx,
        })
    }
}
