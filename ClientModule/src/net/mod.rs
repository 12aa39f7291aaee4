//! # Network Module
//!
//! WebSocket transport to the SpacetimeDB server. [`open`] performs the
//! handshake and spawns two pump tasks: one writes queued [`ClientMessage`]s,
//! the other decodes incoming frames and forwards them as [`NetEvent`]s.

pub mod protocol;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use rpg_shared::constants::network::JSON_SUBPROTOCOL;
use rpg_shared::{ConnectionParams, DisconnectReason};

use crate::error::{ClientError, ClientResult};

pub use protocol::{ClientMessage, ServerMessage, TransactionUpdate, UpdateStatus};

/// What the read pump reports
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    Message(ServerMessage),
    Closed(DisconnectReason),
}

#[derive(Debug)]
enum Outgoing {
    Message(ClientMessage),
    Close,
}

/// Sending half of an open socket. Dropping every handle closes the socket.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl SocketHandle {
    pub fn send(&self, message: ClientMessage) -> ClientResult<()> {
        self.tx
            .send(Outgoing::Message(message))
            .map_err(|_| ClientError::NotConnected)
    }

    pub fn close(&self) {
        let _ = self.tx.send(Outgoing::Close);
    }
}

/// Connect to the subscription endpoint in `params`
pub async fn open(
    params: &ConnectionParams,
) -> ClientResult<(SocketHandle, mpsc::UnboundedReceiver<NetEvent>)> {
    let mut request = params.url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static(JSON_SUBPROTOCOL),
    );
    if let Some(token) = &params.auth_token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|err| ClientError::InvalidConfig(format!("auth token: {}", err)))?;
        headers.insert("Authorization", value);
    }

    let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
    info!("WebSocket open to {}", params.url);
    let (mut sink, mut source) = stream.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outgoing>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<NetEvent>();

    tokio::spawn(async move {
        while let Some(outgoing) = out_rx.recv().await {
            match outgoing {
                Outgoing::Message(message) => {
                    let text = match message.to_json() {
                        Ok(text) => text,
                        Err(err) => {
                            error!("Failed to encode message: {}", err);
                            continue;
                        }
                    };
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        warn!("WebSocket send failed: {}", err);
                        break;
                    }
                }
                Outgoing::Close => break,
            }
        }
        let _ = sink.send(Message::Close(None)).await;
        debug!("WebSocket writer stopped");
    });

    tokio::spawn(async move {
        let reason = loop {
            match source.next().await {
                Some(Ok(Message::Text(text))) => match ServerMessage::decode(&text) {
                    Ok(message) => {
                        if event_tx.send(NetEvent::Message(message)).is_err() {
                            break DisconnectReason::ClientRequest;
                        }
                    }
                    Err(err) => warn!("Dropping undecodable server message: {}", err),
                },
                Some(Ok(Message::Binary(_))) => {
                    warn!("Ignoring binary frame on the JSON protocol");
                }
                Some(Ok(Message::Close(_))) | None => break DisconnectReason::ServerClosed,
                Some(Ok(_)) => {}
                Some(Err(err)) => break DisconnectReason::NetworkError(err.to_string()),
            }
        };
        debug!("WebSocket reader stopped: {:?}", reason);
        let _ = event_tx.send(NetEvent::Closed(reason));
    });

    Ok((SocketHandle { tx: out_tx }, event_rx))
}
