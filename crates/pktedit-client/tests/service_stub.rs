//! End-to-end tests against an in-process packet service.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pktedit_client::{BoxFuture, ClientError, PacketEditorModel, ServiceClient, Transport};
use pktedit_core::{Field, FieldValue, TemplateStore};
use pktedit_protocol::Request;
use serde_json::{Value, json};

/// Answers like the real service: handshake first, then domain methods that
/// require handle `H1`. Every request is recorded.
#[derive(Clone, Default)]
struct FakeService {
    seen: Arc<Mutex<Vec<Request>>>,
    wrong_id: bool,
}

impl FakeService {
    fn answer(request: &Request) -> Value {
        let params = request
            .params
            .as_ref()
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let result = match request.method.as_str() {
            "get_version" => json!({"version": "1.0"}),
            "get_version_handler" => json!("H1"),
            _ if params.first() != Some(&json!("H1")) => {
                return json!({
                    "jsonrpc": "2.0",
                    "id": request.id,
                    "error": {"code": -32602, "message": "unknown version handle"}
                });
            }
            "build_pkt" => {
                let description = &params[1];
                if description.to_string().contains("bogus") {
                    return json!({
                        "jsonrpc": "2.0",
                        "id": request.id,
                        "error": {"code": -32000, "message": "bad field"}
                    });
                }
                json!({"data": description, "binary": "AAEC"})
            }
            "get_tree" => json!({"protocols": ["Ether", "IP"]}),
            other => json!(format!("unhandled {other}")),
        };
        json!({"jsonrpc": "2.0", "id": request.id, "result": result})
    }
}

impl Transport for FakeService {
    fn connect<'a>(&'a mut self, _endpoint: &'a str) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn exchange<'a>(&'a mut self, request: &'a [u8]) -> BoxFuture<'a, io::Result<Vec<u8>>> {
        Box::pin(async move {
            let request: Request = serde_json::from_slice(request)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.seen.lock().unwrap().push(request.clone());
            let mut reply = Self::answer(&request);
            if self.wrong_id && request.method == "get_tree" {
                reply["id"] = json!("999");
            }
            Ok(serde_json::to_vec(&reply).unwrap())
        })
    }

    fn close(&mut self) {}
}

async fn open(service: &FakeService) -> ServiceClient {
    let client = ServiceClient::with_transport(Box::new(service.clone()), Duration::from_secs(1));
    let version = client.open("tcp://service.test:4507").await.unwrap();
    assert_eq!(version, "1.0");
    client
}

#[tokio::test]
async fn build_returns_the_supplied_field() {
    let service = FakeService::default();
    let client = open(&service).await;
    assert_eq!(client.version_handle().await.as_deref(), Some("H1"));

    let description = json!([{"id": "IP", "fields": [{"id": "dst", "value": "192.168.0.1"}]}]);
    let data = client.build(&description).await.unwrap();

    assert_eq!(
        data.packet.protocols[0].fields,
        vec![Field::new("dst", "192.168.0.1")]
    );
    assert_eq!(data.bytes.as_deref(), Some(&[0u8, 1, 2][..]));

    let seen = service.seen.lock().unwrap();
    assert_eq!(seen[2].method, "build_pkt");
    assert_eq!(seen[2].params.as_ref().unwrap()[0], json!("H1"));
}

#[tokio::test]
async fn remote_error_message_is_surfaced() {
    let service = FakeService::default();
    let client = open(&service).await;

    let err = client
        .build(&json!([{"id": "bogus", "fields": []}]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("bad field"));
    assert!(!err.requires_reopen());
    assert!(client.is_open().await);
}

#[tokio::test]
async fn mismatched_reply_id_closes_session() {
    let service = FakeService {
        wrong_id: true,
        ..Default::default()
    };
    let client = open(&service).await;

    let err = client.fetch_metadata_tree().await.unwrap_err();
    assert!(matches!(err, ClientError::Protocol(_)));
    assert!(err.requires_reopen());
    assert!(!client.is_open().await);

    let err = client.fetch_metadata_tree().await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected(_)));
}

#[tokio::test]
async fn domain_calls_fail_before_open() {
    let service = FakeService::default();
    let client = ServiceClient::with_transport(Box::new(service.clone()), Duration::from_secs(1));

    assert!(matches!(
        client.fetch_metadata_tree().await,
        Err(ClientError::NotConnected(_))
    ));
    assert!(service.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn editor_edits_and_saves_templates() {
    let dir = tempfile::tempdir().unwrap();
    let service = FakeService::default();
    let client = Arc::new(open(&service).await);
    let mut editor = PacketEditorModel::new(client, TemplateStore::new(dir.path()));
    let mut changes = editor.subscribe_templates();

    editor
        .load_from_json(r#"[{"id": "IP", "fields": [{"id": "ttl", "value": 64}]}]"#)
        .await
        .unwrap();
    editor.save_as_template("lab/ip").unwrap();
    changes.changed().await.unwrap();
    assert_eq!(editor.template_names().unwrap(), vec!["lab/ip"]);

    editor.new_packet();
    assert!(editor.current_packet().is_none());

    let packet = editor.load_template("lab/ip").await.unwrap();
    assert_eq!(
        packet.protocols[0].field("ttl").unwrap().value,
        FieldValue::Int(64)
    );
}
