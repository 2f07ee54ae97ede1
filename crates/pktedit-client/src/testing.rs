//! In-memory packet service used by unit tests.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pktedit_protocol::Request;
use serde_json::{Value, json};

use crate::transport::{BoxFuture, Transport};

type Handler = dyn Fn(&Request) -> Option<Value> + Send + Sync;

#[derive(Default)]
struct Recorded {
    requests: Vec<Request>,
    connects: Vec<String>,
    active: usize,
    peak_active: usize,
}

/// Transport answering from a closure.
///
/// With [`StubTransport::new`] the closure returns the `result` payload; with
/// [`StubTransport::raw`] it returns the whole reply envelope. Returning
/// `None` never replies, which exercises timeouts.
///
/// Every exchange yields to the scheduler between receiving the request and
/// replying, so concurrent callers get a chance to interleave.
#[derive(Clone)]
pub(crate) struct StubTransport {
    handler: Arc<Handler>,
    recorded: Arc<Mutex<Recorded>>,
    raw: bool,
    refuse: bool,
    empty: bool,
    delay: Option<Duration>,
}

impl StubTransport {
    pub(crate) fn new(handler: impl Fn(&Request) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            recorded: Arc::default(),
            raw: false,
            refuse: false,
            empty: false,
            delay: None,
        }
    }

    pub(crate) fn raw(handler: impl Fn(&Request) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self {
            raw: true,
            ..Self::new(handler)
        }
    }

    /// A service that completes the handshake with handle `H1` and hands
    /// domain calls (minus the handle) to `domain`. `Err` becomes an error
    /// reply.
    pub(crate) fn service(
        domain: impl Fn(&str, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        Self::raw(move |request| {
            let outcome = match request.method.as_str() {
                "get_version" => Ok(json!({"version": "1.0"})),
                "get_version_handler" => Ok(json!("H1")),
                method => {
                    let params = request
                        .params
                        .as_ref()
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    if params.first() != Some(&json!("H1")) {
                        Err("missing version handle".to_string())
                    } else {
                        domain(method, &params[1..])
                    }
                }
            };
            Some(match outcome {
                Ok(result) => json!({"jsonrpc": "2.0", "id": request.id, "result": result}),
                Err(message) => json!({
                    "jsonrpc": "2.0",
                    "id": request.id,
                    "error": {"code": -32000, "message": message}
                }),
            })
        })
    }

    pub(crate) fn refuse_connections(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub(crate) fn with_empty_replies(mut self) -> Self {
        self.empty = true;
        self
    }

    /// Waits `delay` before every reply.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Highest number of exchanges that were running at the same time.
    pub(crate) fn peak_active(&self) -> usize {
        self.recorded.lock().unwrap().peak_active
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.recorded.lock().unwrap().requests.clone()
    }

    pub(crate) fn connects(&self) -> Vec<String> {
        self.recorded.lock().unwrap().connects.clone()
    }
}

impl Transport for StubTransport {
    fn connect<'a>(&'a mut self, endpoint: &'a str) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            if self.refuse {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            self.recorded
                .lock()
                .unwrap()
                .connects
                .push(endpoint.to_string());
            Ok(())
        })
    }

    fn exchange<'a>(&'a mut self, request: &'a [u8]) -> BoxFuture<'a, io::Result<Vec<u8>>> {
        Box::pin(async move {
            let request: Request = serde_json::from_slice(request)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            {
                let mut recorded = self.recorded.lock().unwrap();
                recorded.requests.push(request.clone());
                recorded.active += 1;
                recorded.peak_active = recorded.peak_active.max(recorded.active);
            }

            tokio::task::yield_now().await;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let reply = if self.empty {
                Some(Vec::new())
            } else {
                (self.handler)(&request).map(|payload| self.envelope(&request, payload))
            };
            self.recorded.lock().unwrap().active -= 1;
            match reply {
                Some(reply) => Ok(reply),
                None => std::future::pending().await,
            }
        })
    }

    fn close(&mut self) {}
}

impl StubTransport {
    fn envelope(&self, request: &Request, payload: Value) -> Vec<u8> {
        let reply = if self.raw {
            payload
        } else {
            json!({"jsonrpc": "2.0", "id": request.id, "result": payload})
        };
        serde_json::to_vec(&reply).unwrap()
    }
}
