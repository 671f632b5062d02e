//! Payment-channel redeem script construction and submission.
//!
//! The channel script has two spend branches: after the timelock the freshly
//! minted refund key can claim, before it the beneficiary can claim by
//! presenting a 33-byte preimage satisfying a hash check. The script is
//! submitted as a single transaction output through the issuance pipeline.

use bitcoin::absolute::LockTime;
use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_CHECKSIGVERIFY, OP_CLTV, OP_DROP, OP_DUP, OP_ELSE, OP_ENDIF, OP_EQUAL,
    OP_EQUALVERIFY, OP_HASH160, OP_IF, OP_SIZE,
};
use bitcoin::script::Builder;
use bitcoin::{Amount, PublicKey, ScriptBuf};
use serde_json::json;
use tracing::debug;

use crate::error::{ExecutorError, StageError};
use crate::pipeline::TxPipeline;

/// Collaborator wallet interface: mints the refund key embedded in each
/// channel script.
pub trait WalletKeys: Send + Sync {
    fn generate_new_key(&self) -> Result<PublicKey, ExecutorError>;
}

/// Compose the two-branch conditional redeem script.
///
/// Branch 1 (after `lock_time`): pay-to-pubkey-hash against the refund key.
/// Branch 2 (before `lock_time`): beneficiary signature plus a 33-byte
/// hash-locked value.
pub fn channel_redeem_script(
    refund_key: &PublicKey,
    beneficiary: &PublicKey,
    lock_time: LockTime,
) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_IF)
        .push_int(i64::from(lock_time.to_consensus_u32()))
        .push_opcode(OP_CLTV)
        .push_opcode(OP_DROP)
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(refund_key.pubkey_hash())
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ELSE)
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(beneficiary.pubkey_hash())
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIGVERIFY)
        .push_opcode(OP_SIZE)
        .push_int(33)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_HASH160)
        .push_opcode(OP_EQUAL)
        .push_opcode(OP_ENDIF)
        .into_script()
}

/// Open a channel holding `deposit` for `beneficiary` until `lock_time`:
/// mint the refund key, build the script, issue one `{script, amount}`
/// output through create/fund/sign, broadcast, and return the txid.
///
/// The deposit is bound to the output alongside the script; an output
/// carrying only the script would commit no funds to the channel.
pub fn open_channel(
    pipeline: &TxPipeline,
    wallet: &dyn WalletKeys,
    beneficiary: &PublicKey,
    deposit: Amount,
    lock_time: LockTime,
) -> Result<String, StageError> {
    let refund_key = wallet.generate_new_key().map_err(StageError::from)?;
    let script = channel_redeem_script(&refund_key, beneficiary, lock_time);
    debug!(script_len = script.len(), lock_time = %lock_time, "built channel script");

    let inputs = json!([]);
    let outputs = json!([{ "script": script.to_hex_string(), "amount": deposit.to_btc() }]);
    let raw_tx = pipeline.create_and_sign(&[inputs, outputs])?;
    pipeline.send(&raw_tx)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bitcoin::opcodes::Opcode;
    use bitcoin::script::Instruction;
    use serde_json::json;

    use crate::rpc::mock::MockExecutor;

    use super::*;

    // Two known-valid compressed secp256k1 points (the generator and its
    // double), so pubkey parsing never depends on key-generation machinery.
    const REFUND_KEY: &str =
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const BENEFICIARY_KEY: &str =
        "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";

    struct FixedWallet;

    impl WalletKeys for FixedWallet {
        fn generate_new_key(&self) -> Result<PublicKey, ExecutorError> {
            Ok(REFUND_KEY.parse().expect("static key must parse"))
        }
    }

    struct FailingWallet;

    impl WalletKeys for FailingWallet {
        fn generate_new_key(&self) -> Result<PublicKey, ExecutorError> {
            Err(ExecutorError::Other("keypool exhausted".to_owned()))
        }
    }

    fn keys() -> (PublicKey, PublicKey) {
        (
            REFUND_KEY.parse().expect("static key must parse"),
            BENEFICIARY_KEY.parse().expect("static key must parse"),
        )
    }

    fn channel_mock() -> MockExecutor {
        MockExecutor::builder()
            .with_reply("createrawtransaction", json!("raw1"))
            .with_reply("fundrawtransaction", json!({"hex": "raw2"}))
            .with_reply("signrawtransaction", json!({"hex": "raw3", "complete": true}))
            .with_reply("sendrawtransaction", json!("channel-txid"))
            .build()
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Tok {
        Op(Opcode),
        Push(usize),
    }

    #[test]
    fn redeem_script_has_the_expected_opcode_skeleton() {
        let (refund, beneficiary) = keys();
        let lock_time = LockTime::from_height(500_000).expect("static height");
        let script = channel_redeem_script(&refund, &beneficiary, lock_time);

        let tokens: Vec<Tok> = script
            .instructions()
            .map(|inst| match inst.expect("script must be well formed") {
                Instruction::Op(op) => Tok::Op(op),
                Instruction::PushBytes(bytes) => Tok::Push(bytes.len()),
            })
            .collect();

        assert_eq!(
            tokens,
            vec![
                Tok::Op(OP_IF),
                Tok::Push(3), // lock height 500_000, minimally encoded
                Tok::Op(OP_CLTV),
                Tok::Op(OP_DROP),
                Tok::Op(OP_DUP),
                Tok::Op(OP_HASH160),
                Tok::Push(20), // refund pubkey hash
                Tok::Op(OP_EQUALVERIFY),
                Tok::Op(OP_CHECKSIG),
                Tok::Op(OP_ELSE),
                Tok::Op(OP_DUP),
                Tok::Op(OP_HASH160),
                Tok::Push(20), // beneficiary pubkey hash
                Tok::Op(OP_EQUALVERIFY),
                Tok::Op(OP_CHECKSIGVERIFY),
                Tok::Op(OP_SIZE),
                Tok::Push(1), // 33, the compressed-key size check
                Tok::Op(OP_EQUALVERIFY),
                Tok::Op(OP_HASH160),
                Tok::Op(OP_EQUAL),
                Tok::Op(OP_ENDIF),
            ]
        );
    }

    #[test]
    fn redeem_script_embeds_both_key_hashes() {
        let (refund, beneficiary) = keys();
        let lock_time = LockTime::from_height(500_000).expect("static height");
        let script = channel_redeem_script(&refund, &beneficiary, lock_time);

        let hex = script.to_hex_string();
        assert!(hex.contains(&refund.pubkey_hash().to_string()));
        assert!(hex.contains(&beneficiary.pubkey_hash().to_string()));
    }

    #[test]
    fn open_channel_submits_and_returns_the_txid() {
        let (_, beneficiary) = keys();
        let mock = Arc::new(channel_mock());
        let pipeline = TxPipeline::new(mock.clone());

        let txid = open_channel(
            &pipeline,
            &FixedWallet,
            &beneficiary,
            Amount::from_btc(1.0).expect("static amount"),
            LockTime::from_height(500_000).expect("static height"),
        )
        .expect("channel open must succeed");
        assert_eq!(txid, "channel-txid");

        assert_eq!(
            mock.methods_called(),
            vec![
                "createrawtransaction",
                "fundrawtransaction",
                "signrawtransaction",
                "sendrawtransaction"
            ]
        );
    }

    // A script-only output would commit no funds to the channel; the deposit
    // has to ride along with the script.
    #[test]
    fn open_channel_binds_deposit_to_output() {
        let (refund, beneficiary) = keys();
        let mock = Arc::new(channel_mock());
        let pipeline = TxPipeline::new(mock.clone());
        let lock_time = LockTime::from_height(500_000).expect("static height");

        open_channel(
            &pipeline,
            &FixedWallet,
            &beneficiary,
            Amount::from_btc(0.75).expect("static amount"),
            lock_time,
        )
        .expect("channel open must succeed");

        let calls = mock.calls();
        let outputs = &calls[0].1[1];
        assert_eq!(outputs[0]["amount"], json!(0.75));
        assert_eq!(
            outputs[0]["script"],
            json!(channel_redeem_script(&refund, &beneficiary, lock_time).to_hex_string())
        );
    }

    #[test]
    fn wallet_failure_aborts_before_any_rpc_call() {
        let (_, beneficiary) = keys();
        let mock = Arc::new(channel_mock());
        let pipeline = TxPipeline::new(mock.clone());

        let err = open_channel(
            &pipeline,
            &FailingWallet,
            &beneficiary,
            Amount::from_sat(1_000),
            LockTime::from_height(500_000).expect("static height"),
        )
        .expect_err("wallet failure must abort");
        assert_eq!(err.code, -1);
        assert_eq!(err.message, "keypool exhausted");
        assert!(mock.calls().is_empty());
    }
}
