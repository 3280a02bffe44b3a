//! JSON-RPC backend transport
//!
//! Each call is one POST of a JSON-RPC 2.0 envelope to `{base}{path}`. HTTP
//! failures carry their status; JSON-RPC error objects carry their code in
//! the message so callers can still classify them.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use portal_sso_core::{BackendTransport, TransportError};

use crate::http::PortalHttpClient;

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

/// Backend transport speaking JSON-RPC 2.0 over HTTP
#[derive(Debug)]
pub struct JsonRpcTransport {
    client: ReqwestClient,
    base_url: String,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    /// Transport for the backend at `base_url`
    pub fn new(client: ReqwestClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Transport sharing the portal client's cookie jar
    pub fn with_portal_client(http: &PortalHttpClient, base_url: impl Into<String>) -> Self {
        Self::new(http.client().clone(), base_url)
    }

    fn envelope(&self, method: &str, params: Value) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
    }
}

fn rpc_error_message(error: &RpcError) -> String {
    match error.code {
        Some(code) => format!("Error {code}: {}", error.message),
        None => error.message.clone(),
    }
}

#[async_trait]
impl BackendTransport for JsonRpcTransport {
    async fn send(
        &self,
        path: &str,
        method: &str,
        params: Value,
        access_token: Option<&str>,
    ) -> Result<Value, TransportError> {
        let url = format!("{}{path}", self.base_url);
        let mut request =
            self.client.post(&url).header(ACCEPT, "application/json").json(&self.envelope(method, params));
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }

        debug!(%url, %method, "Sending backend call");
        let response = request.send().await.map_err(|err| {
            warn!(%url, %method, error = %err, "Backend call failed");
            TransportError::new(err.status().map(|status| status.as_u16()), err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("unknown status");
            return Err(TransportError::new(
                Some(status.as_u16()),
                format!("HTTP {} {reason}", status.as_u16()),
            ));
        }

        let body = response.text().await.map_err(|err| TransportError::new(None, err.to_string()))?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        let envelope: RpcEnvelope = serde_json::from_str(&body)
            .map_err(|err| TransportError::new(None, format!("invalid JSON-RPC response: {err}")))?;

        match envelope.error {
            Some(error) => Err(TransportError::new(None, rpc_error_message(&error))),
            None => Ok(envelope.result.unwrap_or(Value::Null)),
        }
    }
}
