//! Production connector — WebSocket client over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use attune_core::errors::TransportError;
use attune_core::events::WireFrame;

use crate::connector::{Connector, Link};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to the analysis backend's WebSocket endpoint.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn Link>, TransportError> {
        let (ws, _) = connect_async(&self.url)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        debug!(url = %self.url, "websocket established");
        Ok(Box::new(WsLink { ws }))
    }
}

struct WsLink {
    ws: WsStream,
}

#[async_trait]
impl Link for WsLink {
    async fn send(&mut self, frame: WireFrame) -> Result<(), TransportError> {
        let text = frame.encode()?;
        self.ws
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::ChannelClosed(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<WireFrame, TransportError>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return Some(WireFrame::decode(&text)),
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite on the next poll;
                // binary frames are not part of the protocol.
                Ok(_) => continue,
                Err(e) => return Some(Err(TransportError::ChannelClosed(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}
