use log::{debug, warn};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::time::timeout;

use crate::config::Config;
use crate::error::TransportError;

/// One connection to the server. Reads and writes are all-or-nothing and
/// bounded by the configured I/O timeout.
pub struct Session<S> {
    stream: S,
    io_timeout: Duration,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already connected stream.
    pub fn from_stream(stream: S, io_timeout: Duration) -> Self {
        Self { stream, io_timeout }
    }

    /// Reads exactly `n` bytes; anything less is an error, never a partial result.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let mut buffer = vec![0u8; n];
        match timeout(self.io_timeout, self.stream.read_exact(&mut buffer)).await {
            Ok(Ok(_)) => Ok(buffer),
            Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Err(TransportError::Closed),
            Ok(Err(e)) => Err(TransportError::Read(e)),
            Err(_) => Err(TransportError::Timeout(self.io_timeout)),
        }
    }

    /// Writes all of `bytes` and flushes.
    pub async fn write_exact(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let io_timeout = self.io_timeout;
        let stream = &mut self.stream;
        let write = async move {
            stream.write_all(bytes).await?;
            stream.flush().await
        };
        match timeout(io_timeout, write).await {
            Ok(result) => result.map_err(TransportError::Write),
            Err(_) => Err(TransportError::Timeout(io_timeout)),
        }
    }

    /// Shuts down the write side; errors are only logged since the session
    /// is being discarded anyway.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("Error while closing session: {}", e);
        }
    }
}

impl Session<TcpStream> {
    /// Resolves the server host and connects to the first address that
    /// accepts, binding the configured local address first if there is one.
    pub async fn connect(config: &Config) -> Result<Self, TransportError> {
        let host = config.server.host.as_str();
        let addrs: Vec<SocketAddr> = lookup_host((host, config.server.port))
            .await
            .map_err(|source| TransportError::Resolve { host: host.to_string(), source })?
            .collect();

        let local = config.local_addr();
        let mut last_error = None;
        for addr in addrs {
            if let Some(local) = local {
                if local.is_ipv4() != addr.is_ipv4() {
                    debug!("Skipping {}: address family differs from local {}", addr, local);
                    continue;
                }
            }

            match connect_addr(addr, local, config.connect_timeout()).await {
                Ok(stream) => {
                    debug!("Connected to {}", addr);
                    return Ok(Self::from_stream(stream, config.io_timeout()));
                }
                Err(e) => {
                    warn!("Connection attempt to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(TransportError::NoAddress { host: host.to_string() }))
    }
}

/// Creates a socket bound to `local_addr` that can be rebound right after
/// a previous session on the same address closes.
pub fn create_reusable_socket(local_addr: SocketAddr) -> io::Result<TcpSocket> {
    let socket = match local_addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    #[cfg(unix)]
    socket.set_reuseport(true)?;
    socket.bind(local_addr)?;

    Ok(socket)
}

async fn connect_addr(
    addr: SocketAddr,
    local: Option<SocketAddr>,
    connect_timeout: Duration,
) -> Result<TcpStream, TransportError> {
    let attempt = async {
        let stream = match local {
            Some(local) => {
                let socket = create_reusable_socket(local)
                    .map_err(|source| TransportError::Bind { addr: local, source })?;
                socket.connect(addr).await
            }
            None => TcpStream::connect(addr).await,
        };
        stream.map_err(|source| TransportError::Connect { addr, source })
    };

    match timeout(connect_timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(connect_timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_read_exact_returns_requested_bytes() {
        let (client, mut server) = duplex(64);
        server.write_all(b"hello world").await.unwrap();

        let mut session = Session::from_stream(client, TIMEOUT);
        assert_eq!(session.read_exact(5).await.unwrap(), b"hello");
        assert_eq!(session.read_exact(6).await.unwrap(), b" world");
    }

    #[tokio::test]
    async fn test_short_read_is_closed_error() {
        let (client, mut server) = duplex(64);
        server.write_all(b"abc").await.unwrap();
        drop(server);

        let mut session = Session::from_stream(client, TIMEOUT);
        assert!(matches!(session.read_exact(4).await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_read_times_out() {
        let (client, _server) = duplex(64);
        let mut session = Session::from_stream(client, Duration::from_millis(20));
        assert!(matches!(session.read_exact(1).await, Err(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_write_exact_delivers_everything() {
        let (client, mut server) = duplex(256);
        let mut session = Session::from_stream(client, TIMEOUT);
        session.write_exact(&[7u8; 180]).await.unwrap();

        let mut received = [0u8; 180];
        server.read_exact(&mut received).await.unwrap();
        assert!(received.iter().all(|&b| b == 7));
    }

    #[tokio::test]
    async fn test_zero_byte_read() {
        let (client, _server) = duplex(8);
        let mut session = Session::from_stream(client, TIMEOUT);
        assert!(session.read_exact(0).await.unwrap().is_empty());
    }
}
