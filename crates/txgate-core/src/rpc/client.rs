use std::io::{BufReader, Write};

use serde_json::Value;
use tracing::{debug, trace};

use crate::auth::basic_auth_header;
use crate::error::{ExecutorError, RpcError};
use crate::http::{self, HttpResponse};
use crate::transport;

use super::protocol;
use super::RpcExecutor;

/// Statuses whose bodies must still reach JSON parsing: the node reports
/// method-level failures through these with a JSON-RPC error envelope.
const TOLERATED_STATUSES: [u16; 3] = [400, 404, 500];

/// RPC username/password pair for HTTP Basic auth.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

/// Blocking JSON-RPC client for one remote node endpoint.
///
/// Every [`call`](NodeClient::call) and [`fetch`](NodeClient::fetch) opens
/// its own connection and drops it afterwards; there is no pooling and no
/// shared mutable state, so one client may be used from many threads at
/// once.
pub struct NodeClient {
    host: String,
    port: u16,
    credentials: Option<Credentials>,
    use_tls: bool,
}

impl NodeClient {
    /// Create a client for `host:port`. `use_tls` follows deployment policy;
    /// disable it only for loopback endpoints.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        credentials: Option<Credentials>,
        use_tls: bool,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            credentials,
            use_tls,
        }
    }

    /// Perform one authenticated JSON-RPC call and return the reply envelope
    /// unmodified (the caller inspects `result`/`error` itself).
    pub fn call(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        let body = protocol::request_body(method, params)?;
        debug!(rpc.method = method, rpc.params = params.len(), "rpc call");
        trace!(rpc.method = method, body = %String::from_utf8_lossy(&body), "rpc request body");

        let auth_header = self
            .credentials
            .as_ref()
            .map(|c| basic_auth_header(&c.user, &c.pass));
        let mut extra_headers: Vec<(&str, &str)> = vec![
            ("Content-Type", "application/json"),
            ("Accept", "application/json"),
        ];
        if let Some(header) = auth_header.as_deref() {
            extra_headers.push(("Authorization", header));
        }

        let response = self.exchange("POST", "/", &extra_headers, &body)?;
        debug!(rpc.method = method, status = response.status, body_len = response.body.len(), "rpc response");
        classify_reply(response)
    }

    /// Perform one unauthenticated plain GET and return the body as text.
    /// Used for auxiliary lookups against a local peer.
    pub fn fetch(&self, path: &str) -> Result<String, RpcError> {
        debug!(path, "http fetch");
        let response = self.exchange("GET", path, &[], b"")?;
        debug!(path, status = response.status, body_len = response.body.len(), "fetch response");

        if response.status >= 400 && !TOLERATED_STATUSES.contains(&response.status) {
            return Err(RpcError::Server {
                status: response.status,
            });
        }
        if response.body.is_empty() {
            return Err(RpcError::EmptyReply);
        }
        Ok(String::from_utf8_lossy(&response.body).into_owned())
    }

    /// One request/response round trip on a fresh connection. The stream is
    /// dropped on every exit path once the response is read.
    fn exchange(
        &self,
        method: &str,
        path: &str,
        extra_headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, RpcError> {
        let mut stream = transport::connect(&self.host, self.port, self.use_tls)?;
        let request = http::build_request(method, path, extra_headers, body);
        stream.write_all(&request)?;
        stream.flush()?;

        let mut reader = BufReader::new(stream);
        http::read_response(&mut reader)
    }
}

/// Classify one HTTP response into the call-layer contract.
fn classify_reply(response: HttpResponse) -> Result<Value, RpcError> {
    if response.status == 401 {
        return Err(RpcError::Auth);
    }
    if response.status >= 400 && !TOLERATED_STATUSES.contains(&response.status) {
        return Err(RpcError::Server {
            status: response.status,
        });
    }
    if response.body.is_empty() {
        return Err(RpcError::EmptyReply);
    }

    let reply: Value = serde_json::from_slice(&response.body)
        .map_err(|e| RpcError::MalformedReply(format!("decode JSON-RPC reply: {e}")))?;
    protocol::validate_reply(reply)
}

/// Remote dispatch behind the same contract as an in-process dispatcher:
/// the reply envelope is split into `result` vs. structured `error`.
impl RpcExecutor for NodeClient {
    fn execute(&self, method: &str, params: &[Value]) -> Result<Value, ExecutorError> {
        let reply = self
            .call(method, params)
            .map_err(|e| ExecutorError::Other(e.to_string()))?;
        protocol::split_reply(reply)
    }
}
