use serde_json::Value;

use crate::error::{ExecutorError, RpcError};

/// JSON-RPC 1.0 request envelope. The id is fixed: every call runs on its
/// own connection, so correlation never spans more than one exchange.
#[derive(serde::Serialize)]
pub(crate) struct JsonRpcRequest<'a> {
    pub(crate) method: &'a str,
    pub(crate) params: &'a [Value],
    pub(crate) id: u64,
}

pub(crate) fn request_body(method: &str, params: &[Value]) -> Result<Vec<u8>, RpcError> {
    let request = JsonRpcRequest {
        method,
        params,
        id: 1,
    };
    serde_json::to_vec(&request)
        .map_err(|e| RpcError::Protocol(format!("encode JSON-RPC request: {e}")))
}

/// Validate the reply envelope shape: it must be a non-empty JSON object
/// (carrying at least one of `result`/`error`). The object is returned
/// unmodified for the caller to inspect.
pub(crate) fn validate_reply(reply: Value) -> Result<Value, RpcError> {
    match reply.as_object() {
        Some(obj) if !obj.is_empty() => Ok(reply),
        _ => Err(RpcError::MalformedReply(
            "expected reply to have result, error and id properties".to_owned(),
        )),
    }
}

/// Split a validated reply envelope into the executor contract: a non-null
/// `error` member wins over `result`.
///
/// A standard `{"code": <int>, "message": <string>}` error maps to
/// [`ExecutorError::Rpc`]; any other error shape degrades to
/// [`ExecutorError::Other`] carrying the raw JSON.
pub(crate) fn split_reply(reply: Value) -> Result<Value, ExecutorError> {
    #[derive(serde::Deserialize)]
    struct JsonRpcError {
        code: i64,
        message: String,
    }

    let mut reply = reply;
    let error = reply.get_mut("error").map(Value::take).unwrap_or(Value::Null);
    if !error.is_null() {
        return match serde_json::from_value::<JsonRpcError>(error.clone()) {
            Ok(parsed) => Err(ExecutorError::Rpc {
                code: parsed.code,
                message: parsed.message,
            }),
            Err(_) => Err(ExecutorError::Other(format!(
                "non-standard JSON-RPC error: {error}"
            ))),
        };
    }

    Ok(reply.get_mut("result").map(Value::take).unwrap_or(Value::Null))
}
