//! Browser endpoint discovery via the DevTools HTTP interface.

use serde::Deserialize;
use tracing::debug;

use crate::error::CdpError;

#[derive(Debug, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "Browser", default)]
    pub browser: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

pub fn version_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}/json/version")
}

/// Ask a browser started with `--remote-debugging-port` for its WebSocket endpoint.
pub async fn discover_endpoint(host: &str, port: u16) -> Result<String, CdpError> {
    let url = version_url(host, port);
    let info: VersionInfo = reqwest::get(&url)
        .await
        .map_err(|e| CdpError::Discovery(format!("{url}: {e}")))?
        .error_for_status()
        .map_err(|e| CdpError::Discovery(format!("{url}: {e}")))?
        .json()
        .await
        .map_err(|e| CdpError::Discovery(format!("{url}: {e}")))?;
    debug!(browser = %info.browser, endpoint = %info.web_socket_debugger_url, "Discovered browser");
    Ok(info.web_socket_debugger_url)
}
