//! form_submit / form_sync tool implementations.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{CONTACT_FORM_SYNC, Error};

use crate::host::ServiceHost;

/// Parameters for the form_submit tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FormSubmitParams {
    /// Form fields, sent as a JSON body to the contact endpoint.
    pub payload: serde_json::Value,
}

/// Parameters for the form_sync tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FormSyncParams {
    /// Background-sync tag (default: "contact-form-sync").
    #[serde(default)]
    pub tag: Option<String>,
}

fn to_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Implementation of the form_submit tool.
pub async fn submit_impl(host: &ServiceHost, params: FormSubmitParams) -> Result<CallToolResult, McpError> {
    if !params.payload.is_object() {
        return Err(Error::InvalidInput("payload must be a JSON object".into()).into());
    }

    let submission = host.outbox().submit(&params.payload).await?;
    to_result(&submission)
}

/// Implementation of the form_sync tool.
pub async fn sync_impl(host: &ServiceHost, params: FormSyncParams) -> Result<CallToolResult, McpError> {
    let tag = params.tag.as_deref().unwrap_or(CONTACT_FORM_SYNC);
    let report = host.outbox().sync(tag).await?;
    to_result(&report)
}
