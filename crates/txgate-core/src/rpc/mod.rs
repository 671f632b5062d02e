//! JSON-RPC dispatch abstraction.
//!
//! Defines the [`RpcExecutor`] trait, the seam between the transaction
//! pipeline and whatever actually runs RPC methods (an in-process dispatcher
//! or a remote node), and provides the remote HTTP(S) implementation
//! ([`NodeClient`]) plus a test mock (`mock::MockExecutor`).

mod client;
#[cfg(test)]
pub mod mock;
pub(crate) mod protocol;

pub use client::{Credentials, NodeClient};

use serde_json::Value;

use crate::error::ExecutorError;

/// Executes one RPC method with ordered JSON parameters.
///
/// The method set is open-ended: callers dispatch by name and inspect the
/// returned JSON themselves. Implementations block until the
/// call completes and report failures either as the node's structured
/// `{code, message}` shape or as an unstructured message.
pub trait RpcExecutor: Send + Sync {
    fn execute(&self, method: &str, params: &[Value]) -> Result<Value, ExecutorError>;
}
