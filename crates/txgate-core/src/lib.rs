//! Blocking JSON-RPC client core for driving a remote blockchain node.
//!
//! The crate frames JSON-RPC 1.0 exchanges in hand-built HTTP/1.x over a
//! plain or TLS TCP stream ([`rpc::NodeClient`]), and layers a serialized
//! transaction issuance pipeline ([`pipeline::TxPipeline`]) plus a
//! payment-channel script builder ([`channel`]) on top of the
//! [`rpc::RpcExecutor`] dispatch seam.

pub mod auth;
pub mod channel;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod rpc;
pub mod transport;

pub use error::{ExecutorError, RpcError, StageError};
pub use pipeline::TxPipeline;
pub use rpc::{Credentials, NodeClient, RpcExecutor};
