//! WebSocket transport for channels.
//!
//! Thin wrapper around `tokio-tungstenite`: [`connect`] performs the
//! handshake for one sub-protocol and returns split writer/reader halves.
//! The reader yields channel [`Event`]s so a driver can feed them straight
//! into [`Channel::handle`](crate::channel::Channel::handle).

use crate::channel::{Event, Inbound};
use crate::errors::ProtocolError;
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Write half of a channel connection.
#[derive(Debug)]
pub struct WsWriter {
    sink: futures_util::stream::SplitSink<WsStream, tungstenite::Message>,
}

impl WsWriter {
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Text(text.to_string()))
            .await
            .context("WebSocket send_text failed")
    }

    pub async fn close(&mut self) -> Result<()> {
        self.sink.close().await.context("WebSocket close failed")
    }
}

/// Read half of a channel connection.
#[derive(Debug)]
pub struct WsReader {
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WsReader {
    /// Next channel event, or `None` once the stream has ended.
    ///
    /// Ping/pong and raw frames are handled by tungstenite and skipped here.
    pub async fn recv(&mut self) -> Option<Result<Event, ProtocolError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return Some(Ok(Event::Message(Inbound::Text(text.to_string()))));
                }
                Some(Ok(tungstenite::Message::Binary(data))) => {
                    return Some(Ok(Event::Message(Inbound::Binary(data.to_vec()))));
                }
                Some(Ok(tungstenite::Message::Close(close_frame))) => {
                    let reason = close_frame.map(|cf| format!("{} {}", u16::from(cf.code), cf.reason));
                    return Some(Ok(Event::Close { reason }));
                }
                Some(Ok(
                    tungstenite::Message::Ping(_)
                    | tungstenite::Message::Pong(_)
                    | tungstenite::Message::Frame(_),
                )) => continue,
                Some(Err(e)) => return Some(Err(read_error(e))),
                None => return None,
            }
        }
    }
}

fn read_error(e: tungstenite::Error) -> ProtocolError {
    ProtocolError::Transport(format!("WebSocket read error: {e}"))
}

/// Open a connection to `url` negotiating `protocol` as sub-protocol.
pub async fn connect(url: &str, protocol: &str) -> Result<(WsWriter, WsReader)> {
    use tungstenite::client::IntoClientRequest;

    let mut request = url
        .into_client_request()
        .with_context(|| format!("invalid WebSocket URL: {url}"))?;

    let header_value = tungstenite::http::HeaderValue::from_str(protocol)
        .with_context(|| format!("invalid sub-protocol: {protocol}"))?;
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", header_value);

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .with_context(|| format!("WebSocket connect failed for {protocol}"))?;

    let (sink, stream) = ws_stream.split();

    Ok((WsWriter { sink }, WsReader { stream }))
}

/// Socket URL for a page or server URL: same host, `ws` scheme matching
/// the page's encryption, and `path` appended.
///
/// `https://host:7681/index.html` becomes `wss://host:7681/<path>`.
pub fn channel_url(base: &str, path: &str) -> String {
    let (scheme, rest) = if let Some(rest) = base.strip_prefix("https://") {
        ("wss://", rest)
    } else if let Some(rest) = base.strip_prefix("wss://") {
        ("wss://", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        ("ws://", rest)
    } else if let Some(rest) = base.strip_prefix("ws://") {
        ("ws://", rest)
    } else {
        ("ws://", base)
    };

    let host = rest.split('/').next().unwrap_or_default();
    format!("{scheme}{host}/{path}")
}
