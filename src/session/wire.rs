//! Wire-level connection abstraction.
//!
//! The session talks to the service through the [`WireStream`] trait so the
//! protocol logic tests against scripted mock streams. [`WsConnector`] is the
//! real implementation over a TLS WebSocket.

use crate::defaults;
use crate::error::{Result, VoxlineError};
use std::net::TcpStream;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Error as WsError, Message, WebSocket};

/// One inbound event from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    Text(String),
    Binary(Vec<u8>),
    /// The peer closed the connection. Terminal.
    Closed,
}

/// A duplex message stream. Implementations are internally synchronized so
/// the node thread (sending) and the receive loop can share one handle.
pub trait WireStream: Send + Sync {
    fn send_text(&self, text: &str) -> Result<()>;
    fn send_binary(&self, data: &[u8]) -> Result<()>;
    /// Time-bounded poll for the next event. `Ok(None)` means nothing
    /// arrived yet; callers loop.
    fn recv(&self) -> Result<Option<WireEvent>>;
    fn close(&self);
}

impl std::fmt::Debug for dyn WireStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WireStream")
    }
}

/// Dials a URL and yields a connected stream.
pub trait Connector: Send + Sync {
    fn connect(&self, url: &str) -> Result<Arc<dyn WireStream>>;
}

/// Bounded exponential backoff for the initial connect.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempts: defaults::CONNECT_ATTEMPTS,
            base: defaults::CONNECT_BACKOFF,
            cap: defaults::CONNECT_BACKOFF_CAP,
        }
    }
}

impl Backoff {
    /// Delays between attempts: one fewer than the attempt count, doubling
    /// from `base` up to `cap`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.attempts.saturating_sub(1)).map(move |i| {
            let factor = 2u32.saturating_pow(i);
            self.base.saturating_mul(factor).min(self.cap)
        })
    }
}

/// Dials with retry, sleeping per the backoff schedule between failures.
/// The last error wins.
pub fn connect_with_retry(
    connector: &dyn Connector,
    url: &str,
    backoff: &Backoff,
) -> Result<Arc<dyn WireStream>> {
    let mut delays = backoff.delays();
    loop {
        match connector.connect(url) {
            Ok(stream) => return Ok(stream),
            Err(e) => match delays.next() {
                Some(delay) => {
                    eprintln!("voxline: connect failed ({e}), retrying in {delay:?}");
                    thread::sleep(delay);
                }
                None => return Err(e),
            },
        }
    }
}

/// WebSocket connector over TLS.
pub struct WsConnector {
    read_timeout: Duration,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self {
            read_timeout: defaults::READ_TIMEOUT,
        }
    }
}

impl WsConnector {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> Result<Arc<dyn WireStream>> {
        let (socket, _response) =
            tungstenite::connect(url).map_err(|e| VoxlineError::Connection {
                message: format!("websocket handshake failed: {e}"),
            })?;

        set_read_timeout(&socket, self.read_timeout)?;
        Ok(Arc::new(WsStream {
            socket: Mutex::new(socket),
        }))
    }
}

/// A read timeout on the underlying TCP stream turns blocking reads into
/// the time-bounded polls `recv` promises.
fn set_read_timeout(
    socket: &WebSocket<MaybeTlsStream<TcpStream>>,
    timeout: Duration,
) -> Result<()> {
    let tcp = match socket.get_ref() {
        MaybeTlsStream::Plain(tcp) => tcp,
        MaybeTlsStream::NativeTls(tls) => tls.get_ref(),
        _ => {
            return Err(VoxlineError::Connection {
                message: "unsupported transport stream".to_string(),
            });
        }
    };
    tcp.set_read_timeout(Some(timeout))?;
    Ok(())
}

struct WsStream {
    socket: Mutex<WebSocket<MaybeTlsStream<TcpStream>>>,
}

impl WsStream {
    fn lock(&self) -> MutexGuard<'_, WebSocket<MaybeTlsStream<TcpStream>>> {
        self.socket.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WireStream for WsStream {
    fn send_text(&self, text: &str) -> Result<()> {
        self.lock()
            .send(Message::text(text))
            .map_err(|e| VoxlineError::Connection {
                message: format!("send failed: {e}"),
            })
    }

    fn send_binary(&self, data: &[u8]) -> Result<()> {
        self.lock()
            .send(Message::binary(data.to_vec()))
            .map_err(|e| VoxlineError::Connection {
                message: format!("send failed: {e}"),
            })
    }

    fn recv(&self) -> Result<Option<WireEvent>> {
        match self.lock().read() {
            Ok(Message::Text(text)) => Ok(Some(WireEvent::Text(text.to_string()))),
            Ok(Message::Binary(data)) => Ok(Some(WireEvent::Binary(data.to_vec()))),
            Ok(Message::Close(_)) => Ok(Some(WireEvent::Closed)),
            // Control frames are answered internally by the socket.
            Ok(_) => Ok(None),
            Err(WsError::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                Ok(None)
            }
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {
                Ok(Some(WireEvent::Closed))
            }
            Err(e) => Err(VoxlineError::Connection {
                message: format!("read failed: {e}"),
            }),
        }
    }

    fn close(&self) {
        let mut socket = self.lock();
        let _ = socket.close(None);
        let _ = socket.flush();
    }
}
