//! Transaction issuance pipeline: create → fund → sign → send.
//!
//! Stages run strictly in order against a collaborator [`RpcExecutor`]; the
//! first failure aborts the rest of the run. All stage sequences and all
//! sends are serialized through one process-wide lock, because the wallet
//! behind the executor cannot be safely mutated concurrently.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bitcoin::Amount;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::StageError;
use crate::rpc::RpcExecutor;

const CREATE_COMMAND: &str = "createrawtransaction";
const FUND_COMMAND: &str = "fundrawtransaction";
const SIGN_COMMAND: &str = "signrawtransaction";
const SEND_COMMAND: &str = "sendrawtransaction";

/// Serialized transaction issuance over a collaborator RPC executor.
///
/// Construct one pipeline at process start and share it by reference; the
/// lock inside it is what guarantees that two concurrent runs never
/// interleave their wallet operations.
pub struct TxPipeline {
    executor: Arc<dyn RpcExecutor>,
    store_lock: Mutex<()>,
}

impl TxPipeline {
    pub fn new(executor: Arc<dyn RpcExecutor>) -> Self {
        Self {
            executor,
            store_lock: Mutex::new(()),
        }
    }

    /// Run create → fund → sign under one lock acquisition and return the
    /// signed raw transaction hex.
    ///
    /// `params` is passed to `createrawtransaction` verbatim (inputs array
    /// and outputs array, in the collaborator's own convention).
    pub fn create_and_sign(&self, params: &[Value]) -> Result<String, StageError> {
        let _guard = self.lock();
        self.run_create_fund_sign(params).inspect_err(|err| {
            warn!(code = err.code, message = %err.message, "transaction build failed");
        })
    }

    /// Convenience wrapper: one spend of `amount` to `address`, inputs left
    /// for the fund stage to select.
    pub fn create_and_sign_to_address(
        &self,
        address: &str,
        amount: Amount,
    ) -> Result<String, StageError> {
        let inputs = json!([]);
        let outputs = json!([{ "address": address, "amount": amount.to_btc() }]);
        self.create_and_sign(&[inputs, outputs])
    }

    /// Broadcast a signed raw transaction and return the txid. Guarded by
    /// the same lock as the build stages, acquired independently.
    pub fn send(&self, raw_tx: &str) -> Result<String, StageError> {
        let _guard = self.lock();
        let result = self
            .executor
            .execute(SEND_COMMAND, &[Value::String(raw_tx.to_owned())])
            .map_err(StageError::from)
            .and_then(|result| {
                result
                    .as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| {
                        StageError::diagnostic("Send transaction command finished with error")
                    })
            });
        match &result {
            Ok(txid) => debug!(%txid, "transaction sent"),
            Err(err) => {
                warn!(code = err.code, message = %err.message, "transaction send failed");
            }
        }
        result
    }

    /// Build, sign, and broadcast one payment to `address`, returning the
    /// txid. Short-circuits after the first failing stage; `send` is never
    /// reached when the build fails.
    pub fn issue_and_send(&self, address: &str, amount: Amount) -> Result<String, StageError> {
        let raw_tx = self.create_and_sign_to_address(address, amount)?;
        self.send(&raw_tx)
    }

    fn run_create_fund_sign(&self, params: &[Value]) -> Result<String, StageError> {
        let result = self
            .executor
            .execute(CREATE_COMMAND, params)
            .map_err(StageError::from)?;
        let raw_tx = result
            .as_str()
            .ok_or_else(|| {
                StageError::diagnostic("Create transaction command finished with error")
            })?
            .to_owned();
        debug!(body_len = raw_tx.len(), "created raw transaction");

        let fund_params = [Value::String(raw_tx)];
        let result = self
            .executor
            .execute(FUND_COMMAND, &fund_params)
            .map_err(StageError::from)?;
        let funded = result
            .as_object()
            .ok_or_else(|| StageError::diagnostic("Fund transaction command finished with error"))?;
        let raw_tx = funded
            .get("hex")
            .and_then(Value::as_str)
            .ok_or_else(|| StageError::diagnostic("Fund transaction error or not completed"))?
            .to_owned();
        debug!(body_len = raw_tx.len(), "funded raw transaction");

        let sign_params = [Value::String(raw_tx)];
        let result = self
            .executor
            .execute(SIGN_COMMAND, &sign_params)
            .map_err(StageError::from)?;
        let signed = result
            .as_object()
            .ok_or_else(|| StageError::diagnostic("Sign transaction command finished with error"))?;
        let hex = signed.get("hex").and_then(Value::as_str);
        let complete = signed.get("complete").and_then(Value::as_bool);
        match (hex, complete) {
            (Some(hex), Some(true)) => {
                debug!(body_len = hex.len(), "signed raw transaction");
                Ok(hex.to_owned())
            }
            _ => Err(StageError::diagnostic(
                "Sign transaction error or not completed",
            )),
        }
    }

    // The guard protects no data, so a poisoned lock (a panicked holder)
    // is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.store_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
