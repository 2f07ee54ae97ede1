//! Template commands.

use pktedit_core::{TemplateError, TemplateStore, to_wire};
use serde_json::json;

use crate::commands::print_json;
use crate::error::{ClientError, ClientResult};
use crate::service::ServiceClient;

/// Lists user templates and the service's predefined templates.
pub async fn list(store: &TemplateStore, client: &ServiceClient) -> ClientResult<()> {
    let user = store.list()?;
    let service = client.list_templates().await?;
    print_json(&json!({ "user": user, "service": service }))
}

/// Prints a template as a JSON description.
///
/// A user template with the same name shadows the service's.
pub async fn show(store: &TemplateStore, client: &ServiceClient, name: &str) -> ClientResult<()> {
    match store.load(name) {
        Ok(packet) => print_json(&to_wire(&packet)),
        Err(TemplateError::NotFound(_)) => {
            let description = client.fetch_template(name).await?;
            print_json(&description)
        }
        Err(e) => Err(ClientError::from(e)),
    }
}
