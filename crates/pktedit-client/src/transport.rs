//! Strict request/reply transports to the packet service.
//!
//! A [`Transport`] carries one opaque request and returns exactly one reply.
//! It never pipelines: callers must not issue a second exchange before the
//! first returns, which [`crate::Session`] guarantees by taking `&mut self`.

use std::future::Future;
use std::io;
use std::pin::Pin;

use tracing::debug;
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

/// A boxed future that can be sent across threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A point-to-point request/reply channel.
///
/// # Implementation Notes
///
/// - `connect` replaces any previous connection
/// - `exchange` sends one request and waits for one reply; an empty reply is
///   an error, not an empty response
/// - `close` is idempotent
pub trait Transport: Send {
    /// Connects to `endpoint`.
    fn connect<'a>(&'a mut self, endpoint: &'a str) -> BoxFuture<'a, io::Result<()>>;

    /// Sends one request and waits for its reply.
    fn exchange<'a>(&'a mut self, request: &'a [u8]) -> BoxFuture<'a, io::Result<Vec<u8>>>;

    /// Releases the connection.
    fn close(&mut self);
}

/// ZeroMQ REQ socket transport, the packet service's native channel.
///
/// Endpoints use ZeroMQ syntax, e.g. `tcp://localhost:4507`.
#[derive(Default)]
pub struct ZmqTransport {
    socket: Option<ReqSocket>,
}

impl ZmqTransport {
    /// Creates an unconnected transport.
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for ZmqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZmqTransport")
            .field("connected", &self.socket.is_some())
            .finish()
    }
}

impl Transport for ZmqTransport {
    fn connect<'a>(&'a mut self, endpoint: &'a str) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            self.close();
            let mut socket = ReqSocket::new();
            socket
                .connect(endpoint)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string()))?;
            debug!(endpoint = %endpoint, "zmq socket connected");
            self.socket = Some(socket);
            Ok(())
        })
    }

    fn exchange<'a>(&'a mut self, request: &'a [u8]) -> BoxFuture<'a, io::Result<Vec<u8>>> {
        Box::pin(async move {
            let socket = self
                .socket
                .as_mut()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket not connected"))?;

            socket
                .send(ZmqMessage::from(request.to_vec()))
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e.to_string()))?;

            let reply = socket
                .recv()
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e.to_string()))?;

            let mut bytes = Vec::new();
            for frame in reply.into_vec() {
                bytes.extend_from_slice(&frame);
            }

            if bytes.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "empty reply from packet service",
                ));
            }
            Ok(bytes)
        })
    }

    fn close(&mut self) {
        // Dropping the socket tears down its background tasks.
        self.socket = None;
    }
}
