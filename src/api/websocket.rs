//! Backend connection over a WebSocket.
//!
//! A writer task drains outgoing text frames; a reader task parses incoming
//! frames into [`Inbound`] messages for the TUI loop. Reconnection is not
//! attempted: when the socket closes the reader emits a single
//! `ConnectionClosed` event and exits.

use anyhow::{Context, Result, anyhow};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::protocol::{Inbound, Request};
use super::transport::{InboundSender, Transport};
use crate::auth::Session;
use crate::events::CONNECTION_CLOSED;

pub struct WebSocketTransport {
    outgoing: mpsc::UnboundedSender<String>,
}

impl WebSocketTransport {
    pub async fn connect(base_url: &str, session: &Session, inbound: InboundSender) -> Result<Self> {
        let url = session_url(base_url, &session.token);
        info!("Connecting to backend at {}", base_url);

        let (stream, _response) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", base_url))?;
        let (mut sink, mut source) = stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = outgoing_rx.recv().await {
                if let Err(err) = sink.send(Message::Text(text)).await {
                    warn!("Failed to write to backend socket: {}", err);
                    break;
                }
            }
            let _ = sink.close().await;
            debug!("Socket writer finished");
        });

        tokio::spawn(async move {
            while let Some(next) = source.next().await {
                let text = match next {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(err) => {
                        warn!("Backend socket read error: {}", err);
                        break;
                    }
                };

                match Inbound::parse(&text) {
                    Ok(message) => {
                        debug!("<- {}", message.event);
                        if inbound.send(message).is_err() {
                            // UI is gone
                            return;
                        }
                    }
                    Err(err) => warn!("Dropping unreadable frame: {:#}", err),
                }
            }
            info!("Backend connection closed");
            let _ = inbound.send(Inbound::new(CONNECTION_CLOSED, json!({})));
        });

        Ok(Self { outgoing })
    }
}

impl Transport for WebSocketTransport {
    fn send_object(&self, message: &Request) -> Result<()> {
        let text = message.to_json()?;
        self.outgoing
            .send(text)
            .map_err(|_| anyhow!("Connection to backend is closed"))?;
        debug!("-> {}", message.name());
        Ok(())
    }
}

/// Append the session token to the backend URL as a query parameter
fn session_url(base_url: &str, token: &str) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", base_url, separator, urlencoding::encode(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_url() {
        assert_eq!(session_url("ws://localhost:8080", "abc"), "ws://localhost:8080?token=abc");
        assert_eq!(
            session_url("ws://host/ws?stage=dev", "a b&c"),
            "ws://host/ws?stage=dev&token=a%20b%26c"
        );
    }
}
