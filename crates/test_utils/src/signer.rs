//! Deterministic signers for building signed transactions.

use alloy_consensus::{SignableTransaction, TxEnvelope};
use alloy_eips::eip2718::Encodable2718 as _;
use alloy_signer::SignerSync as _;
use alloy_signer_local::PrivateKeySigner;
use alloy_primitives::{B256, Signature};
use retrace_transaction::Transaction;

/// Returns a signer whose secret key is derived from `index`.
pub fn test_signer(index: u8) -> PrivateKeySigner {
    let secret_key = B256::with_last_byte(index.max(1));
    PrivateKeySigner::from_bytes(&secret_key)
        .unwrap_or_else(|error| panic!("invalid test secret key: {error}"))
}

/// Signs `transaction` and decodes it back, as if read from the chain data.
pub fn sign<TransactionT>(signer: &PrivateKeySigner, transaction: TransactionT) -> Transaction
where
    TransactionT: SignableTransaction<Signature>,
    TxEnvelope: From<alloy_consensus::Signed<TransactionT>>,
{
    let signature = signer
        .sign_hash_sync(&transaction.signature_hash())
        .unwrap_or_else(|error| panic!("signing failed: {error}"));
    let envelope = TxEnvelope::from(transaction.into_signed(signature));

    Transaction::decode(&envelope.encoded_2718())
        .unwrap_or_else(|error| panic!("signed transaction does not decode: {error}"))
}
