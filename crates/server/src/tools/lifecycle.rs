//! sw_install / sw_activate tool implementations.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{Error, UpdateStatus};

use crate::host::ServiceHost;

/// Parameters for the sw_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwInstallParams {
    /// Cache version to install (default: the configured cache_version).
    #[serde(default)]
    pub version: Option<String>,
}

/// Registration state after a lifecycle call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LifecycleOutput {
    /// "activated" or "waiting".
    pub status: String,
    /// Version the call acted on.
    pub version: String,
    /// Partitions deleted during activation.
    pub deleted: Vec<String>,
    /// Version now serving requests, if any.
    pub active_version: Option<String>,
    /// Installed version waiting for a skip-waiting signal, if any.
    pub waiting_version: Option<String>,
}

async fn describe(host: &ServiceHost, status: UpdateStatus) -> Result<CallToolResult, McpError> {
    let (label, version, deleted) = match status {
        UpdateStatus::Activated { version, deleted } => ("activated", version, deleted),
        UpdateStatus::Waiting { version } => ("waiting", version, Vec::new()),
    };

    let registration = host.registration().lock().await;
    let output = LifecycleOutput {
        status: label.to_string(),
        version,
        deleted,
        active_version: registration.active().map(|w| w.version().to_string()),
        waiting_version: registration.waiting().map(|w| w.version().to_string()),
    };
    drop(registration);

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Implementation of the sw_install tool.
pub async fn install_impl(host: &ServiceHost, params: SwInstallParams) -> Result<CallToolResult, McpError> {
    if params.version.as_deref().is_some_and(|v| v.trim().is_empty()) {
        return Err(Error::InvalidInput("version cannot be empty".into()).into());
    }

    let status = host.install(params.version.as_deref()).await?;
    describe(host, status).await
}

/// Implementation of the sw_activate tool: promote the waiting worker.
pub async fn activate_impl(host: &ServiceHost) -> Result<CallToolResult, McpError> {
    let status = {
        let mut registration = host.registration().lock().await;
        registration.skip_waiting(host.storage()).await?
    };
    describe(host, status).await
}
