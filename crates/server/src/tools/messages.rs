//! cache_stats / cache_clear / skip_waiting tools.
//!
//! Each one posts the matching admin message and returns the reply as-is,
//! so the JSON matches what a page would receive.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use swcache_core::{Error, Message, messages};

use crate::host::ServiceHost;

/// Dispatch one admin message and serialize its reply.
pub async fn message_impl(host: &ServiceHost, message: Message) -> Result<CallToolResult, McpError> {
    let reply = {
        let mut registration = host.registration().lock().await;
        messages::dispatch(message, host.storage(), &mut registration).await?
    };

    let json = serde_json::to_string_pretty(&reply)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize reply: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
