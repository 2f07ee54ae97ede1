//! Session with the packet service.
//!
//! A [`Session`] owns one transport, the request id counter and the
//! negotiated version handle. It moves through three states:
//!
//! ```text
//! Closed --open--> Connecting --negotiate--> Open
//!    ^                 |                       |
//!    +---- close / transport failure / timeout / protocol error
//! ```
//!
//! Handshake methods may be called while `Connecting`; every other method
//! requires `Open` and is sent with the version handle as its first
//! parameter.
//!
//! A request whose future is dropped mid-exchange leaves its reply
//! outstanding on the transport. The session notices on its next use and
//! closes, the same as after a timeout.

use std::time::Duration;

use pktedit_protocol::{Method, Reply, decode_reply, encode_request};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::transport::{Transport, ZmqTransport};

/// Default bound on a single exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No connection.
    Closed,
    /// Connected, version handshake not yet complete.
    Connecting,
    /// Handshake complete.
    Open {
        /// Version reported by the service.
        service_version: String,
        /// Opaque handle attached to every domain call.
        version_handle: String,
    },
}

/// A single logical connection to the packet service.
pub struct Session {
    transport: Box<dyn Transport>,
    state: SessionState,
    endpoint: Option<String>,
    last_id: u64,
    timeout: Duration,
    in_flight: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("endpoint", &self.endpoint)
            .field("last_id", &self.last_id)
            .field("timeout", &self.timeout)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a closed session over `transport`.
    pub fn new(transport: Box<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            state: SessionState::Closed,
            endpoint: None,
            last_id: 0,
            timeout,
            in_flight: false,
        }
    }

    /// Creates a closed session over a ZeroMQ REQ socket.
    pub fn zmq(timeout: Duration) -> Self {
        Self::new(Box::new(ZmqTransport::new()), timeout)
    }

    /// Returns the current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Returns true once the handshake has completed and no cancelled
    /// exchange is pending.
    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open { .. }) && !self.in_flight
    }

    /// Returns the negotiated version handle.
    pub fn version_handle(&self) -> Option<&str> {
        match &self.state {
            SessionState::Open { version_handle, .. } => Some(version_handle),
            _ => None,
        }
    }

    /// Returns the service version reported during the handshake.
    pub fn service_version(&self) -> Option<&str> {
        match &self.state {
            SessionState::Open {
                service_version, ..
            } => Some(service_version),
            _ => None,
        }
    }

    /// Returns the endpoint of the current or last connection.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Returns the exchange timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Tears down any previous connection and connects to `endpoint`.
    ///
    /// On success the session is `Connecting`; the caller must run the
    /// version handshake next.
    pub async fn open(&mut self, endpoint: &str) -> ClientResult<()> {
        self.close();
        self.endpoint = Some(endpoint.to_string());

        let connect = tokio::time::timeout(self.timeout, self.transport.connect(endpoint)).await;
        match connect {
            Ok(Ok(())) => {
                info!(endpoint = %endpoint, "connected to packet service");
                self.state = SessionState::Connecting;
                Ok(())
            }
            Ok(Err(e)) => {
                error!(endpoint = %endpoint, error = %e, "failed to connect");
                self.close();
                Err(ClientError::Connection(format!(
                    "failed to connect to {endpoint}: {e}"
                )))
            }
            Err(_) => {
                error!(endpoint = %endpoint, "connect timed out");
                self.close();
                Err(ClientError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    /// Closes the connection. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            info!(endpoint = ?self.endpoint, "closing packet service session");
        }
        self.transport.close();
        self.state = SessionState::Closed;
        self.in_flight = false;
    }

    /// Closes the session if an earlier exchange was cancelled before its
    /// reply arrived. Returns true if it did.
    pub fn discard_cancelled(&mut self) -> bool {
        if !self.in_flight {
            return false;
        }
        warn!(
            request_id = self.last_id,
            "previous exchange was cancelled, closing session"
        );
        self.close();
        true
    }

    /// Records the handshake outcome. Only valid while `Connecting`.
    pub(crate) fn mark_negotiated(
        &mut self,
        service_version: String,
        version_handle: String,
    ) -> ClientResult<()> {
        if self.state != SessionState::Connecting {
            return Err(ClientError::NotConnected("handshake outside of connect"));
        }
        self.state = SessionState::Open {
            service_version,
            version_handle,
        };
        Ok(())
    }

    /// Calls a handshake method.
    pub async fn call(&mut self, method: Method, params: Option<Value>) -> ClientResult<Value> {
        if method.is_versioned() {
            return Err(ClientError::NotConnected(
                "domain methods require the version handle",
            ));
        }
        if self.state == SessionState::Closed {
            return Err(ClientError::NotConnected("session is closed"));
        }
        self.request(method, params).await
    }

    /// Calls a domain method, prepending the version handle to `args`.
    pub async fn call_versioned(&mut self, method: Method, args: Vec<Value>) -> ClientResult<Value> {
        let handle = match &self.state {
            SessionState::Open { version_handle, .. } => version_handle.clone(),
            SessionState::Connecting => {
                return Err(ClientError::NotConnected("version handshake incomplete"));
            }
            SessionState::Closed => return Err(ClientError::NotConnected("session is closed")),
        };

        let mut params = Vec::with_capacity(args.len() + 1);
        params.push(Value::String(handle));
        params.extend(args);
        self.request(method, Some(Value::Array(params))).await
    }

    fn next_id(&mut self) -> String {
        self.last_id += 1;
        self.last_id.to_string()
    }

    /// One correlated round trip. Transport failures, timeouts and protocol
    /// errors close the session.
    async fn request(&mut self, method: Method, params: Option<Value>) -> ClientResult<Value> {
        if self.discard_cancelled() {
            return Err(ClientError::NotConnected("previous exchange was cancelled"));
        }
        let id = self.next_id();
        let bytes = encode_request(method.as_str(), params, &id)?;

        debug!(
            request_id = %id,
            method = %method,
            request = %String::from_utf8_lossy(&bytes),
            "sending"
        );

        let timeout = self.timeout;
        self.in_flight = true;
        let exchange = tokio::time::timeout(timeout, self.transport.exchange(&bytes)).await;
        self.in_flight = false;
        let reply = match exchange {
            Ok(Ok(reply)) if reply.is_empty() => {
                error!(request_id = %id, method = %method, "empty reply");
                self.close();
                return Err(ClientError::Connection(
                    "empty reply from packet service".to_string(),
                ));
            }
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                error!(request_id = %id, method = %method, error = %e, "exchange failed");
                self.close();
                return Err(ClientError::Connection(e.to_string()));
            }
            Err(_) => {
                error!(request_id = %id, method = %method, "exchange timed out");
                self.close();
                return Err(ClientError::Timeout(timeout.as_secs()));
            }
        };

        debug!(
            request_id = %id,
            reply = %String::from_utf8_lossy(&reply),
            "received"
        );

        match decode_reply(&reply, &id) {
            Ok(Reply::Success(result)) => Ok(result),
            Ok(Reply::Failure(err)) => {
                warn!(
                    request_id = %id,
                    method = %method,
                    code = err.code,
                    message = %err.message,
                    "service returned an error"
                );
                Err(ClientError::Remote {
                    code: err.code,
                    message: err.message,
                })
            }
            Err(e) => {
                error!(request_id = %id, method = %method, error = %e, "invalid reply");
                self.close();
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubTransport;
    use serde_json::json;

    fn session(stub: &StubTransport) -> Session {
        Session::new(Box::new(stub.clone()), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn open_moves_to_connecting() {
        let stub = StubTransport::new(|_| Some(json!(null)));
        let mut session = session(&stub);
        assert_eq!(session.state(), &SessionState::Closed);

        session.open("inproc://stub").await.unwrap();
        assert_eq!(session.state(), &SessionState::Connecting);
        assert_eq!(session.endpoint(), Some("inproc://stub"));
    }

    #[tokio::test]
    async fn open_failure_is_connection_error() {
        let stub = StubTransport::new(|_| Some(json!(null))).refuse_connections();
        let mut session = session(&stub);
        let err = session.open("tcp://nowhere:1").await.unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)));
        assert_eq!(session.state(), &SessionState::Closed);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let stub = StubTransport::new(|_| Some(json!(null)));
        let mut session = session(&stub);
        session.close();
        session.open("inproc://stub").await.unwrap();
        session.close();
        session.close();
        assert_eq!(session.state(), &SessionState::Closed);
    }

    #[tokio::test]
    async fn ids_increase_per_request() {
        let stub = StubTransport::new(|_| Some(json!({"version": "1.0"})));
        let mut session = session(&stub);
        session.open("inproc://stub").await.unwrap();
        session.call(Method::GetVersion, None).await.unwrap();
        session.call(Method::GetVersion, None).await.unwrap();

        let ids: Vec<String> = stub.requests().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn call_on_closed_session_is_rejected() {
        let stub = StubTransport::new(|_| Some(json!(null)));
        let mut session = session(&stub);
        let err = session.call(Method::GetVersion, None).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected(_)));
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn domain_call_before_handshake_is_rejected() {
        let stub = StubTransport::new(|_| Some(json!([])));
        let mut session = session(&stub);
        session.open("inproc://stub").await.unwrap();

        let err = session
            .call_versioned(Method::GetTree, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected(_)));

        let err = session.call(Method::BuildPkt, None).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected(_)));
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn versioned_call_prepends_handle() {
        let stub = StubTransport::new(|_| Some(json!({})));
        let mut session = session(&stub);
        session.open("inproc://stub").await.unwrap();
        session
            .mark_negotiated("1.0".to_string(), "H1".to_string())
            .unwrap();

        session
            .call_versioned(Method::ReadPcap, vec![json!("AAAA")])
            .await
            .unwrap();

        let request = stub.requests().pop().unwrap();
        assert_eq!(request.method, "read_pcap");
        assert_eq!(request.params, Some(json!(["H1", "AAAA"])));
    }

    #[tokio::test]
    async fn id_mismatch_is_protocol_error_and_closes() {
        let stub = StubTransport::raw(|request| {
            Some(json!({"jsonrpc": "2.0", "id": format!("{}0", request.id), "result": 1}))
        });
        let mut session = session(&stub);
        session.open("inproc://stub").await.unwrap();

        let err = session.call(Method::GetVersion, None).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(pktedit_protocol::ProtocolError::IdMismatch { .. })
        ));
        assert_eq!(session.state(), &SessionState::Closed);
    }

    #[tokio::test]
    async fn remote_error_keeps_session_open() {
        let stub = StubTransport::raw(|request| {
            Some(json!({
                "jsonrpc": "2.0",
                "id": request.id,
                "error": {"code": -32000, "message": "bad field"}
            }))
        });
        let mut session = session(&stub);
        session.open("inproc://stub").await.unwrap();
        session
            .mark_negotiated("1.0".to_string(), "H1".to_string())
            .unwrap();

        let err = session
            .call_versioned(Method::BuildPkt, vec![json!([])])
            .await
            .unwrap_err();
        match err {
            ClientError::Remote { code, message } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "bad field");
            }
            other => panic!("expected remote error, got {other:?}"),
        }
        assert!(session.is_open());
    }

    #[tokio::test]
    async fn non_string_error_message_is_remote_error() {
        let stub = StubTransport::raw(|request| {
            Some(json!({
                "jsonrpc": "2.0",
                "id": request.id,
                "error": {"code": 3, "message": 17}
            }))
        });
        let mut session = session(&stub);
        session.open("inproc://stub").await.unwrap();
        session
            .mark_negotiated("1.0".to_string(), "H1".to_string())
            .unwrap();

        let err = session
            .call_versioned(Method::GetTree, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Remote { code: 3, ref message } if message == "17"));
        assert!(session.is_open());
    }

    #[tokio::test]
    async fn timeout_closes_session() {
        let stub = StubTransport::new(|_| None);
        let mut session = Session::new(Box::new(stub.clone()), Duration::from_millis(50));
        session.open("inproc://stub").await.unwrap();

        let err = session.call(Method::GetVersion, None).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
        assert!(err.requires_reopen());
        assert_eq!(session.state(), &SessionState::Closed);
    }

    #[tokio::test]
    async fn empty_reply_is_connection_error() {
        let stub = StubTransport::new(|_| Some(json!(null))).with_empty_replies();
        let mut session = session(&stub);
        session.open("inproc://stub").await.unwrap();

        let err = session.call(Method::GetVersion, None).await.unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)));
        assert_eq!(session.state(), &SessionState::Closed);
    }

    #[tokio::test]
    async fn cancelled_exchange_closes_session() {
        let stub = StubTransport::new(|_| Some(json!({"version": "1.0"})))
            .with_delay(Duration::from_millis(200));
        let mut session = Session::new(Box::new(stub.clone()), Duration::from_secs(1));
        session.open("inproc://stub").await.unwrap();
        session
            .mark_negotiated("1.0".to_string(), "H1".to_string())
            .unwrap();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            session.call_versioned(Method::GetTree, Vec::new()),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(!session.is_open());

        let err = session
            .call_versioned(Method::GetTree, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected(_)));
        assert_eq!(session.state(), &SessionState::Closed);
        assert_eq!(stub.requests().len(), 1);

        session.open("inproc://stub").await.unwrap();
        session.call(Method::GetVersion, None).await.unwrap();
    }

    #[tokio::test]
    async fn reopen_resets_state() {
        let stub = StubTransport::new(|_| Some(json!(null)));
        let mut session = session(&stub);
        session.open("inproc://a").await.unwrap();
        session
            .mark_negotiated("1.0".to_string(), "H1".to_string())
            .unwrap();
        session.open("inproc://b").await.unwrap();

        assert_eq!(session.state(), &SessionState::Connecting);
        assert!(session.version_handle().is_none());
        assert_eq!(stub.connects(), vec!["inproc://a", "inproc://b"]);
    }
}
