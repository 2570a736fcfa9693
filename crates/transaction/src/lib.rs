//! Ethereum transactions as replayed by the trace engine.
//!
//! Transactions are decoded from their EIP-2718 encoding, either as stored in
//! the chain data or as submitted over RPC. Ad-hoc calls are converted into
//! unsigned transactions through [`Call::to_transaction`].

mod call;

use alloy_consensus::{
    Transaction as _, TxEnvelope, transaction::SignerRecoverable as _,
};
use alloy_eips::{Typed2718 as _, eip2718::Decodable2718 as _};
pub use alloy_eips::{
    eip2718::Eip2718Error,
    eip2930::{AccessList, AccessListItem},
    eip7702::SignedAuthorization,
};
use retrace_primitives::{Address, B256, Bytes, TxKind, U256};

pub use self::call::{Call, DEFAULT_CALL_GAS_LIMIT};

/// Errors that can occur while decoding or recovering a transaction.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The encoding is not a valid EIP-2718 transaction
    #[error("rlp: {0}")]
    Decoding(#[from] Eip2718Error),
    /// Bytes remain after the transaction's encoding
    #[error("rlp: {0} trailing bytes after transaction")]
    TrailingBytes(usize),
    /// The transaction carries no signature to recover the sender from
    #[error("transaction is not signed")]
    Unsigned,
    /// The signature does not yield a sender
    #[error("cannot recover sender")]
    InvalidSignature,
}

/// EIP-2718 transaction type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum TransactionType {
    /// Pre-EIP-2718 transaction
    #[default]
    Legacy,
    /// EIP-2930 transaction
    AccessList,
    /// EIP-1559 transaction
    DynamicFee,
    /// EIP-4844 transaction
    Blob,
    /// EIP-7702 transaction
    SetCode,
}

impl TransactionType {
    /// Returns the type matching the EIP-2718 type byte.
    pub fn from_type_byte(ty: u8) -> Option<Self> {
        match ty {
            0 => Some(Self::Legacy),
            1 => Some(Self::AccessList),
            2 => Some(Self::DynamicFee),
            3 => Some(Self::Blob),
            4 => Some(Self::SetCode),
            _ => None,
        }
    }

    /// Returns the EIP-2718 type byte.
    pub fn type_byte(self) -> u8 {
        match self {
            Self::Legacy => 0,
            Self::AccessList => 1,
            Self::DynamicFee => 2,
            Self::Blob => 3,
            Self::SetCode => 4,
        }
    }
}

/// A transaction, signed or ad-hoc.
///
/// For legacy and access-list transactions both fee fields hold the gas price.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction type
    pub transaction_type: TransactionType,
    /// Chain the transaction is bound to; `None` for unprotected legacy
    /// transactions
    pub chain_id: Option<u64>,
    /// Sender nonce
    pub nonce: u64,
    /// Maximum tip per gas
    pub max_priority_fee_per_gas: u128,
    /// Maximum total fee per gas
    pub max_fee_per_gas: u128,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient; `None` for contract creation
    pub to: Option<Address>,
    /// Transferred value
    pub value: U256,
    /// Call data or init code
    pub input: Bytes,
    /// EIP-2930 access list
    pub access_list: AccessList,
    /// Maximum fee per blob gas
    pub max_fee_per_blob_gas: u128,
    /// Versioned hashes of the carried blobs
    pub blob_versioned_hashes: Vec<B256>,
    /// EIP-7702 authorizations
    pub authorization_list: Vec<SignedAuthorization>,
    /// Sender, if known
    pub from: Option<Address>,
    /// Transaction hash; zero for ad-hoc calls
    pub hash: B256,
    signed: Option<TxEnvelope>,
}

impl Transaction {
    /// Decodes an EIP-2718 encoded transaction. The sender is not recovered.
    pub fn decode(raw: &[u8]) -> Result<Self, TransactionError> {
        let mut buffer = raw;
        let envelope = TxEnvelope::decode_2718(&mut buffer)?;
        if !buffer.is_empty() {
            return Err(TransactionError::TrailingBytes(buffer.len()));
        }

        Ok(Self::from(envelope))
    }

    /// Recovers the sender from the signature, unless it is already known.
    pub fn recover_sender(&mut self) -> Result<Address, TransactionError> {
        if let Some(from) = self.from {
            return Ok(from);
        }

        let envelope = self.signed.as_ref().ok_or(TransactionError::Unsigned)?;
        let from = envelope
            .recover_signer()
            .map_err(|_error| TransactionError::InvalidSignature)?;

        self.from = Some(from);
        Ok(from)
    }

    /// The signed envelope the transaction was decoded from.
    pub fn envelope(&self) -> Option<&TxEnvelope> {
        self.signed.as_ref()
    }

    /// Whether the transaction deploys a contract.
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// Transaction kind, as understood by the EVM.
    pub fn kind(&self) -> TxKind {
        self.to.map_or(TxKind::Create, TxKind::Call)
    }

    /// Whether the signature commits to a chain, as required by EIP-155.
    pub fn is_replay_protected(&self) -> bool {
        self.transaction_type != TransactionType::Legacy || self.chain_id.is_some()
    }

    /// Price per gas paid by the sender given the block's base fee.
    pub fn effective_gas_price(&self, base_fee: Option<u64>) -> u128 {
        match base_fee {
            Some(base_fee) => self.max_fee_per_gas.min(
                u128::from(base_fee).saturating_add(self.max_priority_fee_per_gas),
            ),
            None => self.max_fee_per_gas,
        }
    }
}

impl From<TxEnvelope> for Transaction {
    fn from(envelope: TxEnvelope) -> Self {
        let transaction_type =
            TransactionType::from_type_byte(envelope.ty()).unwrap_or_default();

        let max_fee_per_gas = envelope.max_fee_per_gas();
        let max_priority_fee_per_gas = envelope
            .max_priority_fee_per_gas()
            .unwrap_or(max_fee_per_gas);

        Self {
            transaction_type,
            chain_id: envelope.chain_id(),
            nonce: envelope.nonce(),
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit: envelope.gas_limit(),
            to: envelope.to(),
            value: envelope.value(),
            input: envelope.input().clone(),
            access_list: envelope.access_list().cloned().unwrap_or_default(),
            max_fee_per_blob_gas: envelope.max_fee_per_blob_gas().unwrap_or_default(),
            blob_versioned_hashes: envelope
                .blob_versioned_hashes()
                .map(<[B256]>::to_vec)
                .unwrap_or_default(),
            authorization_list: envelope
                .authorization_list()
                .map(<[SignedAuthorization]>::to_vec)
                .unwrap_or_default(),
            from: None,
            hash: *envelope.tx_hash(),
            signed: Some(envelope),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_consensus::{SignableTransaction as _, TxEip1559, TxLegacy};
    use alloy_eips::eip2718::Encodable2718 as _;
    use alloy_signer::SignerSync as _;
    use alloy_signer_local::PrivateKeySigner;
    use retrace_primitives::{address, b256};

    use super::*;

    fn test_signer() -> anyhow::Result<PrivateKeySigner> {
        Ok(PrivateKeySigner::from_bytes(&b256!(
            "0x45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8"
        ))?)
    }

    const GOERLI_TRANSACTION: &str = "f8ac8301942e8477359400834c4b40945f62669ba0c6cf41cc162d8157ed71a0b9d6dbaf80b844f2f0387700000000000000000000000000000000000000000000000000000000000158b09f0270fc889c577c1c64db7c819f921d1b6e8c7e5d3f2ff34f162cf4b324cc052ea0d5494ad16e2233197daa9d54cbbcb1ee534cf9f675fa587c264a4ce01e7d3d23a01421bcf57f4b39eb84a35042dc4675ae167f3e2f50e808252afa23e62e692355";

    #[test]
    fn decode_legacy() -> anyhow::Result<()> {
        let raw = hex::decode(GOERLI_TRANSACTION)?;
        let transaction = Transaction::decode(&raw)?;

        assert_eq!(transaction.transaction_type, TransactionType::Legacy);
        assert_eq!(transaction.chain_id, Some(5));
        assert_eq!(transaction.nonce, 0x01942e);
        assert_eq!(transaction.max_fee_per_gas, 2_000_000_000);
        assert_eq!(transaction.max_priority_fee_per_gas, 2_000_000_000);
        assert_eq!(transaction.gas_limit, 5_000_000);
        assert_eq!(
            transaction.to,
            Some(address!("0x5f62669ba0c6cf41cc162d8157ed71a0b9d6dbaf"))
        );
        assert_eq!(transaction.input.len(), 68);
        assert_eq!(
            transaction.hash,
            b256!("0x3ff7b8917f1941784c709d6e54db18500fddc2b4c1a90b5cdec675cd0f9fc042")
        );
        assert!(transaction.is_replay_protected());
        assert_eq!(transaction.from, None);
        Ok(())
    }

    #[test]
    fn recover_legacy_sender() -> anyhow::Result<()> {
        let raw = hex::decode(GOERLI_TRANSACTION)?;
        let mut transaction = Transaction::decode(&raw)?;

        let sender = transaction.recover_sender()?;
        assert_eq!(sender, address!("0xa2b827acf6073f5d9e2350cbf0646ba2535a5b0c"));
        assert_eq!(transaction.from, Some(sender));
        Ok(())
    }

    #[test]
    fn decode_dynamic_fee_and_recover() -> anyhow::Result<()> {
        let signer = test_signer()?;
        let unsigned = TxEip1559 {
            chain_id: 1,
            nonce: 3,
            gas_limit: 60_000,
            max_fee_per_gas: 30,
            max_priority_fee_per_gas: 2,
            to: TxKind::Create,
            value: U256::from(10),
            access_list: AccessList(vec![AccessListItem {
                address: Address::repeat_byte(0xaa),
                storage_keys: vec![B256::with_last_byte(1)],
            }]),
            input: Bytes::from_static(&[0x60, 0x00]),
        };
        let signature = signer.sign_hash_sync(&unsigned.signature_hash())?;
        let envelope = TxEnvelope::from(unsigned.into_signed(signature));

        let mut transaction = Transaction::decode(&envelope.encoded_2718())?;
        assert_eq!(transaction.transaction_type, TransactionType::DynamicFee);
        assert!(transaction.is_create());
        assert_eq!(transaction.access_list.0.len(), 1);
        assert_eq!(transaction.effective_gas_price(Some(7)), 9);
        assert_eq!(transaction.effective_gas_price(Some(29)), 30);
        assert_eq!(transaction.recover_sender()?, signer.address());
        Ok(())
    }

    #[test]
    fn unprotected_legacy() -> anyhow::Result<()> {
        let signer = test_signer()?;
        let unsigned = TxLegacy {
            chain_id: None,
            nonce: 0,
            gas_price: 1,
            gas_limit: 21_000,
            to: TxKind::Call(Address::ZERO),
            value: U256::ZERO,
            input: Bytes::new(),
        };
        let signature = signer.sign_hash_sync(&unsigned.signature_hash())?;
        let envelope = TxEnvelope::from(unsigned.into_signed(signature));

        let transaction = Transaction::decode(&envelope.encoded_2718())?;
        assert!(!transaction.is_replay_protected());
        Ok(())
    }

    #[test]
    fn trailing_bytes_are_rejected() -> anyhow::Result<()> {
        let mut raw = hex::decode(GOERLI_TRANSACTION)?;
        raw.push(0x00);

        let result = Transaction::decode(&raw);
        assert!(matches!(result, Err(TransactionError::TrailingBytes(1))));
        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        let result = Transaction::decode(&[0x05, 0x01]);
        assert!(matches!(result, Err(TransactionError::Decoding(_))));
    }

    #[test]
    fn unsigned_sender_recovery() {
        let mut transaction = Transaction::default();
        assert!(matches!(
            transaction.recover_sender(),
            Err(TransactionError::Unsigned)
        ));
    }
}
