//! Native WebSocket transport using tokio-tungstenite.

use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{SocketCommand, SocketEvent, SocketLink, Transport, WsHandle};

/// Opens real sockets. Each `open` spawns one background task on the current
/// tokio runtime that owns the socket until it closes.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteTransport;

impl TungsteniteTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for TungsteniteTransport {
    fn open(&self, url: &str) -> SocketLink {
        let (cmd_tx, mut cmd_rx) = unbounded::<SocketCommand>();
        let (event_tx, event_rx) = unbounded::<SocketEvent>();
        let url = url.to_string();

        tokio::spawn(async move {
            let emit = |tx: &UnboundedSender<SocketEvent>, ev: SocketEvent| {
                let _ = tx.unbounded_send(ev);
            };

            let ws_stream = match connect_async(url.as_str()).await {
                Ok((ws_stream, _response)) => ws_stream,
                Err(e) => {
                    crate::log_error!("WebSocket connect failed: {}", e);
                    emit(&event_tx, SocketEvent::Error(e.to_string()));
                    emit(&event_tx, SocketEvent::Closed);
                    return;
                }
            };

            emit(&event_tx, SocketEvent::Open);
            let (mut write, mut read) = ws_stream.split();

            loop {
                tokio::select! {
                    incoming = read.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            emit(&event_tx, SocketEvent::Message(text.to_string()));
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            crate::log_info!("WebSocket received close");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            // Pong is handled automatically by tungstenite
                            crate::log_debug!("Received ping: {:?}", data);
                        }
                        Some(Ok(_)) => {
                            // Ignore binary, pong, etc.
                        }
                        Some(Err(e)) => {
                            crate::log_error!("WebSocket read error: {}", e);
                            emit(&event_tx, SocketEvent::Error(e.to_string()));
                            break;
                        }
                    },
                    command = cmd_rx.next() => match command {
                        Some(SocketCommand::Text(json)) => {
                            if let Err(e) = write.send(Message::Text(json.into())).await {
                                crate::log_error!("Send failed: {}", e);
                                emit(&event_tx, SocketEvent::Error(e.to_string()));
                                break;
                            }
                        }
                        Some(SocketCommand::Close) | None => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    },
                }
            }

            emit(&event_tx, SocketEvent::Closed);
        });

        SocketLink {
            handle: WsHandle::new(cmd_tx),
            events: event_rx,
        }
    }
}
