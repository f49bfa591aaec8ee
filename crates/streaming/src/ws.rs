use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use crate::error::TransportError;
use crate::transport::{BoxFuture, LiveChannel, LiveConnector};

/// [`LiveConnector`] for the `/live` WebSocket.
pub struct WsLiveConnector {
    url: String,
}

impl WsLiveConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl LiveConnector for WsLiveConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn LiveChannel>, TransportError>> {
        Box::pin(async move {
            let (stream, resp) = connect_async(self.url.as_str()).await?;
            info!(url = %self.url, status = %resp.status(), "live channel open");
            Ok(Box::new(WsLiveChannel { stream }) as Box<dyn LiveChannel>)
        })
    }
}

struct WsLiveChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl LiveChannel for WsLiveChannel {
    fn next_message(&mut self) -> BoxFuture<'_, Result<Option<String>, TransportError>> {
        Box::pin(async move {
            while let Some(msg) = self.stream.next().await {
                match msg? {
                    Message::Text(text) => return Ok(Some(text)),
                    Message::Binary(bytes) => {
                        return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
                    }
                    Message::Close(frame) => {
                        debug!(?frame, "peer closed live channel");
                        return Ok(None);
                    }
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                }
            }
            Ok(None)
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Err(e) = self.stream.close(None).await {
                debug!("live channel close: {e}");
            }
        })
    }
}
