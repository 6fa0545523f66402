//! Socket transport shipping length-prefixed MessagePack frames.

use std::{
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    path::PathBuf,
    time::Duration,
};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use log::{debug, warn};

use crate::item::Batch;

use super::{
    CallbackError, FatalItemError, Transport, TransportError,
    serialise::{frame_payload, serialise_batch},
};

/// Default connection timeout applied when establishing sockets.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default write timeout applied to socket writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Default maximum payload size (in bytes) accepted by the transport.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1 << 20; // 1 MiB

/// Where batches are shipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP host and port.
    Tcp { host: String, port: u16 },
    /// Unix domain socket path.
    Unix(PathBuf),
}

impl Endpoint {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }
}

/// Configuration for a [`SocketTransport`].
#[derive(Clone, Debug)]
pub struct SocketConfig {
    pub endpoint: Endpoint,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub max_frame_size: usize,
}

impl SocketConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}

/// Active socket connection state.
enum ActiveConnection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ActiveConnection {
    fn set_write_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        match self {
            ActiveConnection::Tcp(stream) => stream.set_write_timeout(Some(timeout)),
            #[cfg(unix)]
            ActiveConnection::Unix(stream) => stream.set_write_timeout(Some(timeout)),
        }
    }

    fn send_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        match self {
            ActiveConnection::Tcp(stream) => {
                stream.write_all(frame)?;
                stream.flush()
            }
            #[cfg(unix)]
            ActiveConnection::Unix(stream) => {
                stream.write_all(frame)?;
                stream.flush()
            }
        }
    }

    /// Whether the peer has already closed its end. Checked before every
    /// write so the frame is kept for redelivery instead of being written
    /// into a dead socket.
    fn peer_closed(&self) -> bool {
        match self {
            ActiveConnection::Tcp(stream) => match tcp_peer_closed(stream) {
                Ok(closed) => closed,
                Err(err) => {
                    debug!("logship: liveness check failed: {err}");
                    true
                }
            },
            #[cfg(unix)]
            ActiveConnection::Unix(_) => false,
        }
    }

    fn shutdown(&self) {
        let _ = match self {
            ActiveConnection::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            ActiveConnection::Unix(stream) => stream.shutdown(Shutdown::Both),
        };
    }
}

fn tcp_peer_closed(stream: &TcpStream) -> io::Result<bool> {
    let mut buf = [0u8; 1];
    stream.set_nonblocking(true)?;
    let peeked = stream.peek(&mut buf);
    stream.set_nonblocking(false)?;
    match peeked {
        Ok(0) => Ok(true),
        Ok(_) => Ok(false),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(err) => Err(err),
    }
}

fn socket_addrs(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    (host, port).to_socket_addrs().map(|iter| iter.collect())
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in socket_addrs(host, port)? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nonblocking(false)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses for {host}:{port}"),
        )
    }))
}

fn connect_endpoint(config: &SocketConfig) -> io::Result<ActiveConnection> {
    let mut connection = match &config.endpoint {
        Endpoint::Tcp { host, port } => {
            ActiveConnection::Tcp(connect_tcp(host, *port, config.connect_timeout)?)
        }
        Endpoint::Unix(path) => {
            #[cfg(unix)]
            {
                ActiveConnection::Unix(UnixStream::connect(path)?)
            }
            #[cfg(not(unix))]
            {
                let _ = path;
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "unix domain sockets are not supported on this platform",
                ));
            }
        }
    };
    connection.set_write_timeout(config.write_timeout)?;
    Ok(connection)
}

/// Transport writing each batch as one framed MessagePack message.
pub struct SocketTransport {
    config: SocketConfig,
    connection: Option<ActiveConnection>,
    interrupted: bool,
}

impl SocketTransport {
    /// Connect to the configured endpoint.
    pub fn connect(config: SocketConfig) -> Result<Self, TransportError> {
        let connection = connect_endpoint(&config)?;
        Ok(Self {
            config,
            connection: Some(connection),
            interrupted: false,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.config.endpoint
    }

    fn encode(&self, batch: &Batch) -> Result<Vec<u8>, CallbackError> {
        let payload = serialise_batch(batch)?;
        let size = payload.len();
        frame_payload(&payload, self.config.max_frame_size).ok_or_else(|| {
            FatalItemError::FrameTooLarge {
                size,
                max: self.config.max_frame_size,
            }
            .into()
        })
    }
}

impl Transport for SocketTransport {
    fn valid(&self) -> bool {
        !self.interrupted && self.connection.is_some()
    }

    fn callback(&mut self, batch: &Batch) -> Result<(), CallbackError> {
        let frame = self.encode(batch)?;
        let conn = self
            .connection
            .as_mut()
            .ok_or(TransportError::NotConnected)?;
        let sent = if conn.peer_closed() {
            Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "peer closed the connection",
            ))
        } else {
            conn.send_frame(&frame)
        };
        if let Err(err) = sent {
            self.connection = None;
            return Err(TransportError::Io(err).into());
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.shutdown();
        }
    }

    fn reconnect(&mut self) {
        if self.interrupted {
            return;
        }
        match connect_endpoint(&self.config) {
            Ok(conn) => {
                debug!("logship: reconnected to {:?}", self.config.endpoint);
                self.connection = Some(conn);
            }
            Err(err) => {
                warn!(
                    "logship: reconnect to {:?} failed: {err}",
                    self.config.endpoint
                );
            }
        }
    }

    fn interrupt(&mut self) {
        self.interrupted = true;
        self.invalidate();
    }
}

impl std::fmt::Debug for SocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketTransport")
            .field("endpoint", &self.config.endpoint)
            .field("connected", &self.connection.is_some())
            .field("interrupted", &self.interrupted)
            .finish()
    }
}
