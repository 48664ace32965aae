//! Socket transport seam.
//!
//! The connection manager talks to the wire through the `Transport` trait
//! so the connection lifecycle can be exercised against an in-memory
//! implementation. `WsTransport` is the production implementation on
//! tokio-tungstenite.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use amino_core::error::{AminoError, AminoResult};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A fully built connect request: signed URL plus auth headers.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// WebSocket URL including the signed query string.
    pub url: String,
    /// Headers to send with the upgrade request.
    pub headers: Vec<(String, String)>,
}

/// Write half of a socket connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame.
    async fn send(&mut self, text: String) -> AminoResult<()>;
    /// Send a close frame and shut the sink down.
    async fn close(&mut self) -> AminoResult<()>;
}

/// Read half of a socket connection. Yields text frames; `None` means the
/// server closed the connection.
#[async_trait]
pub trait FrameSource: Send {
    async fn next(&mut self) -> Option<AminoResult<String>>;
}

/// Connection factory.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection, performing the upgrade handshake.
    async fn connect(
        &self,
        request: &ConnectRequest,
    ) -> AminoResult<(Box<dyn FrameSink>, Box<dyn FrameSource>)>;
}

/// Production transport on tokio-tungstenite.
#[derive(Debug, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(
        &self,
        request: &ConnectRequest,
    ) -> AminoResult<(Box<dyn FrameSink>, Box<dyn FrameSource>)> {
        let mut req = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| AminoError::Socket(format!("invalid socket url: {e}")))?;

        for (key, value) in &request.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| AminoError::Socket(format!("invalid header {key}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| AminoError::Socket(format!("invalid header value for {key}: {e}")))?;
            req.headers_mut().insert(name, value);
        }

        let (stream, response) = connect_async(req).await.map_err(classify_ws_error)?;
        debug!("socket upgrade accepted: {}", response.status());

        let (sink, source) = stream.split();
        Ok((Box::new(WsSink { sink }), Box::new(WsSource { source })))
    }
}

struct WsSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, text: String) -> AminoResult<()> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| AminoError::Socket(format!("send failed: {e}")))
    }

    async fn close(&mut self) -> AminoResult<()> {
        self.sink
            .close()
            .await
            .map_err(|e| AminoError::Socket(format!("close failed: {e}")))
    }
}

struct WsSource {
    source: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next(&mut self) -> Option<AminoResult<String>> {
        loop {
            match self.source.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => {
                        debug!("skipping non-utf8 binary frame");
                        continue;
                    }
                },
                // Control frames refresh liveness upstream via the text
                // path only; skip them here.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Ok(Message::Close(_)) => return None,
                Err(e) => return Some(Err(AminoError::Socket(format!("read failed: {e}")))),
            }
        }
    }
}

/// Map an upgrade/stream error, distinguishing handshake rejections.
fn classify_ws_error(e: tungstenite::Error) -> AminoError {
    match e {
        tungstenite::Error::Http(response) => {
            let status = response.status();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                AminoError::AuthenticationFailed(format!("socket handshake rejected: {status}"))
            } else {
                AminoError::Socket(format!("handshake failed: {status}"))
            }
        }
        other => AminoError::Socket(other.to_string()),
    }
}
