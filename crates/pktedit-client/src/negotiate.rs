//! Version handshake.
//!
//! Right after connecting, the client asks the service for its version and
//! then trades a client/protocol version pair for a version handle. The
//! handle pins the schema revision for the rest of the session.

use pktedit_protocol::Method;
use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::error::{ClientError, ClientResult};
use crate::session::Session;

/// Client version sent to `get_version_handler`.
pub const CLIENT_VERSION: &str = "1";

/// Protocol revision sent to `get_version_handler`.
pub const PROTOCOL_REVISION: &str = "01";

/// Runs the handshake on a `Connecting` session.
///
/// On failure the session is closed. Returns the service version string.
pub async fn negotiate(session: &mut Session) -> ClientResult<String> {
    match handshake(session).await {
        Ok((service_version, handle)) => {
            info!(
                service_version = %service_version,
                version_handle = %handle,
                "version negotiated"
            );
            session.mark_negotiated(service_version.clone(), handle)?;
            Ok(service_version)
        }
        Err(e) => {
            error!(error = %e, "version negotiation failed");
            session.close();
            Err(e)
        }
    }
}

async fn handshake(session: &mut Session) -> ClientResult<(String, String)> {
    let version = session.call(Method::GetVersion, None).await?;
    let service_version = parse_version(&version)?;
    debug!(service_version = %service_version, "service version");

    let handle = session
        .call(
            Method::GetVersionHandler,
            Some(json!([CLIENT_VERSION, PROTOCOL_REVISION])),
        )
        .await?;
    let handle = parse_handle(&handle)?;
    Ok((service_version, handle))
}

fn parse_version(value: &Value) -> ClientResult<String> {
    let obj = value.as_object().ok_or_else(|| {
        ClientError::Negotiation(format!("get_version returned {value}, expected an object"))
    })?;
    match obj.get("version") {
        Some(Value::String(v)) => Ok(v.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ClientError::Negotiation(
            "get_version result has no version".to_string(),
        )),
    }
}

fn parse_handle(value: &Value) -> ClientResult<String> {
    match value {
        Value::String(handle) if !handle.is_empty() => Ok(handle.clone()),
        other => Err(ClientError::Negotiation(format!(
            "get_version_handler returned {other}, expected a non-empty string"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use crate::testing::StubTransport;
    use std::time::Duration;

    async fn connected(stub: &StubTransport) -> Session {
        let mut session = Session::new(Box::new(stub.clone()), Duration::from_millis(200));
        session.open("inproc://stub").await.unwrap();
        session
    }

    #[tokio::test]
    async fn successful_handshake() {
        let stub = StubTransport::service(|_, _| Ok(Value::Null));
        let mut session = connected(&stub).await;

        let version = negotiate(&mut session).await.unwrap();
        assert_eq!(version, "1.0");
        assert_eq!(
            session.state(),
            &SessionState::Open {
                service_version: "1.0".to_string(),
                version_handle: "H1".to_string(),
            }
        );

        let requests = stub.requests();
        assert_eq!(requests[0].method, "get_version");
        assert_eq!(requests[0].params, None);
        assert_eq!(requests[1].method, "get_version_handler");
        assert_eq!(requests[1].params, Some(json!(["1", "01"])));
    }

    #[tokio::test]
    async fn version_not_object_aborts() {
        let stub = StubTransport::new(|request| match request.method.as_str() {
            "get_version" => Some(json!("1.0")),
            _ => Some(json!("H1")),
        });
        let mut session = connected(&stub).await;

        let err = negotiate(&mut session).await.unwrap_err();
        assert!(matches!(err, ClientError::Negotiation(_)));
        assert_eq!(session.state(), &SessionState::Closed);
        assert_eq!(stub.requests().len(), 1);
    }

    #[tokio::test]
    async fn handle_not_string_aborts() {
        let stub = StubTransport::new(|request| match request.method.as_str() {
            "get_version" => Some(json!({"version": "1.0"})),
            _ => Some(json!({"handle": "H1"})),
        });
        let mut session = connected(&stub).await;

        let err = negotiate(&mut session).await.unwrap_err();
        assert!(matches!(err, ClientError::Negotiation(_)));
        assert!(session.version_handle().is_none());
    }

    #[tokio::test]
    async fn remote_error_aborts() {
        let stub = StubTransport::raw(|request| {
            Some(json!({
                "jsonrpc": "2.0",
                "id": request.id,
                "error": {"code": 1, "message": "unsupported client"}
            }))
        });
        let mut session = connected(&stub).await;

        let err = negotiate(&mut session).await.unwrap_err();
        assert!(matches!(err, ClientError::Remote { .. }));
        assert_eq!(session.state(), &SessionState::Closed);
    }

    #[tokio::test]
    async fn negotiate_on_closed_session_fails() {
        let stub = StubTransport::service(|_, _| Ok(Value::Null));
        let mut session = Session::new(Box::new(stub.clone()), Duration::from_millis(200));
        let err = negotiate(&mut session).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected(_)));
    }
}
