use std::io;

/// Transport, HTTP-framing, and reply-classification failures raised by the
/// JSON-RPC call layer. Surfaced to the immediate caller without retry.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("could not connect to {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("malformed HTTP response: {0}")]
    Protocol(String),

    #[error("incorrect RPC credentials (authorization failed)")]
    Auth,

    #[error("server returned HTTP error {status}")]
    Server { status: u16 },

    #[error("no response from server")]
    EmptyReply,

    #[error("malformed RPC reply: {0}")]
    MalformedReply(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failure reported by a collaborator RPC executor or wallet.
///
/// `Rpc` carries the structured `{code, message}` shape the node reports for
/// method-level failures; everything else collapses to `Other`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutorError {
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("{0}")]
    Other(String),
}

/// Discriminated failure of one transaction pipeline stage.
///
/// Structured collaborator errors keep their original code; everything else
/// is normalized to code `-1`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transaction stage failed (code {code}): {message}")]
pub struct StageError {
    pub code: i64,
    pub message: String,
}

impl StageError {
    /// A stage-local diagnostic with the fixed code `-1`.
    pub(crate) fn diagnostic(message: &str) -> Self {
        Self {
            code: -1,
            message: message.to_owned(),
        }
    }
}

impl From<ExecutorError> for StageError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Rpc { code, message } => Self { code, message },
            ExecutorError::Other(message) if message.is_empty() => Self {
                code: -1,
                message: "unknown error".to_owned(),
            },
            ExecutorError::Other(message) => Self { code: -1, message },
        }
    }
}
