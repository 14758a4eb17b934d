use crate::types::Result;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

/// Client WebSocket stream produced by the factory
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket factory for creating WebSocket connections
pub struct WebSocketFactory;

impl WebSocketFactory {
    /// Open a WebSocket connection (TCP, optional TLS, HTTP upgrade)
    pub async fn create(url: &Url) -> Result<WsStream> {
        tracing::debug!(
            "Creating WebSocket connection to {}://{}{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            url.path()
        );
        let (stream, response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        tracing::debug!("WebSocket handshake completed: {}", response.status());
        Ok(stream)
    }
}
