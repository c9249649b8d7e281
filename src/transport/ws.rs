/// WebSocket push channel for session progress, backed by `tungstenite`.
///
/// The socket gets a short read timeout so the reader thread wakes up
/// regularly and notices when the consumer has closed the channel.
use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;

use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use super::{ChannelFactory, Frame, ProgressSource};
use crate::error::{ClientError, Result};

/// How long a single read may block before yielding [`Frame::Idle`].
const READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Opens `<ws_base>/ws/coverage-progress/{sessionId}` channels.
#[derive(Debug, Clone)]
pub struct WsChannelFactory {
    ws_base: String,
}

impl WsChannelFactory {
    pub fn new(ws_base: impl Into<String>) -> Self {
        Self {
            ws_base: ws_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn channel_url(&self, session_id: &str) -> String {
        format!("{}/ws/coverage-progress/{session_id}", self.ws_base)
    }
}

impl ChannelFactory for WsChannelFactory {
    fn open(&self, session_id: &str) -> Result<Box<dyn ProgressSource>> {
        let url = self.channel_url(session_id);
        tracing::debug!(%url, "opening progress channel");

        let (socket, _response) =
            tungstenite::connect(url.as_str()).map_err(|e| ClientError::network(&url, e.to_string()))?;

        let tcp = match socket.get_ref() {
            MaybeTlsStream::Plain(stream) => stream,
            MaybeTlsStream::Rustls(stream) => stream.get_ref(),
            _ => return Err(ClientError::network(&url, "unsupported socket stream")),
        };
        set_read_timeout(tcp, &url)?;

        Ok(Box::new(WsProgressSource {
            url,
            socket,
            closed: false,
        }))
    }
}

fn set_read_timeout(stream: &TcpStream, url: &str) -> Result<()> {
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .map_err(|e| ClientError::network(url, format!("failed to set read timeout: {e}")))
}

struct WsProgressSource {
    url: String,
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl ProgressSource for WsProgressSource {
    fn next_frame(&mut self) -> Result<Frame> {
        if self.closed {
            return Ok(Frame::Closed);
        }
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Frame::Text(text)),
            Ok(Message::Close(_)) => {
                self.closed = true;
                Ok(Frame::Closed)
            }
            // Ping/pong are answered by tungstenite; binary frames aren't part
            // of the progress contract.
            Ok(_) => Ok(Frame::Idle),
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(Frame::Idle)
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                self.closed = true;
                Ok(Frame::Closed)
            }
            Err(err) => {
                self.closed = true;
                Err(ClientError::network(&self.url, err.to_string()))
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.socket.close(None) {
            tracing::debug!(url = %self.url, "close handshake failed: {err}");
        }
        let _ = self.socket.flush();
    }
}
