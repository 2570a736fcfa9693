//! Accounts as encoded in the plain state and change set tables.

use retrace_kv::keys::decode_u64;
use retrace_primitives::{B256, KECCAK_EMPTY, U256};
use revm_state::AccountInfo;

use crate::StateError;

const NONCE_FIELD: u8 = 1;
const BALANCE_FIELD: u8 = 2;
const INCARNATION_FIELD: u8 = 4;
const CODE_HASH_FIELD: u8 = 8;

/// An account as stored by the node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoredAccount {
    /// Nonce
    pub nonce: u64,
    /// Balance, in wei
    pub balance: U256,
    /// Deployment counter keying the account's storage
    pub incarnation: u64,
    /// Hash of the account's code
    pub code_hash: B256,
}

impl Default for StoredAccount {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::ZERO,
            incarnation: 0,
            code_hash: KECCAK_EMPTY,
        }
    }
}

impl StoredAccount {
    /// Decodes a storage-encoded account. An empty encoding denotes an account
    /// that does not exist.
    pub fn decode_for_storage(encoded: &[u8]) -> Result<Option<Self>, StateError> {
        let Some((&fieldset, mut rest)) = encoded.split_first() else {
            return Ok(None);
        };

        let mut account = Self::default();
        if fieldset & NONCE_FIELD != 0 {
            let bytes = take_field(&mut rest)?;
            account.nonce = decode_u64(bytes).ok_or(StateError::InvalidAccount("nonce too long"))?;
        }
        if fieldset & BALANCE_FIELD != 0 {
            let bytes = take_field(&mut rest)?;
            account.balance = U256::try_from_be_slice(bytes)
                .ok_or(StateError::InvalidAccount("balance too long"))?;
        }
        if fieldset & INCARNATION_FIELD != 0 {
            let bytes = take_field(&mut rest)?;
            account.incarnation =
                decode_u64(bytes).ok_or(StateError::InvalidAccount("incarnation too long"))?;
        }
        if fieldset & CODE_HASH_FIELD != 0 {
            let bytes = take_field(&mut rest)?;
            account.code_hash = B256::try_from(bytes)
                .map_err(|_error| StateError::InvalidAccount("code hash must be 32 bytes"))?;
        }

        Ok(Some(account))
    }

    /// Encodes the account the way the node stores it.
    pub fn encode_for_storage(&self) -> Vec<u8> {
        let mut fieldset = 0u8;
        let mut fields = Vec::new();

        if self.nonce != 0 {
            fieldset |= NONCE_FIELD;
            push_field(&mut fields, &self.nonce.to_be_bytes());
        }
        if self.balance != U256::ZERO {
            fieldset |= BALANCE_FIELD;
            push_field(&mut fields, &self.balance.to_be_bytes::<32>());
        }
        if self.incarnation != 0 {
            fieldset |= INCARNATION_FIELD;
            push_field(&mut fields, &self.incarnation.to_be_bytes());
        }
        if self.code_hash != KECCAK_EMPTY {
            fieldset |= CODE_HASH_FIELD;
            fields.push(32);
            fields.extend_from_slice(self.code_hash.as_slice());
        }

        let mut encoded = Vec::with_capacity(fields.len() + 1);
        encoded.push(fieldset);
        encoded.extend(fields);
        encoded
    }

    /// Account information without code, as used by the EVM.
    pub fn info(&self) -> AccountInfo {
        AccountInfo {
            balance: self.balance,
            nonce: self.nonce,
            code_hash: self.code_hash,
            code: None,
            ..AccountInfo::default()
        }
    }
}

fn take_field<'a>(rest: &mut &'a [u8]) -> Result<&'a [u8], StateError> {
    let (&length, tail) = rest
        .split_first()
        .ok_or(StateError::InvalidAccount("missing field length"))?;

    let length = usize::from(length);
    if tail.len() < length {
        return Err(StateError::InvalidAccount("field exceeds encoding"));
    }

    let (field, tail) = tail.split_at(length);
    *rest = tail;
    Ok(field)
}

fn push_field(encoded: &mut Vec<u8>, be_bytes: &[u8]) {
    let first_non_zero = be_bytes
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(be_bytes.len());
    let significant = be_bytes.get(first_non_zero..).unwrap_or_default();

    // Fields are at most 32 bytes long.
    encoded.push(significant.len() as u8);
    encoded.extend_from_slice(significant);
}

#[cfg(test)]
mod tests {
    use retrace_primitives::{hex, keccak256};

    use super::*;

    #[test]
    fn empty_encoding_is_absent() -> anyhow::Result<()> {
        assert_eq!(StoredAccount::decode_for_storage(&[])?, None);
        Ok(())
    }

    #[test]
    fn decode_all_fields() -> anyhow::Result<()> {
        let code_hash = keccak256([0x60, 0x00]);
        let mut encoded = hex::decode("0f01020203e8010120")?;
        encoded.extend_from_slice(code_hash.as_slice());

        let account = StoredAccount::decode_for_storage(&encoded)?.expect("account exists");
        assert_eq!(account.nonce, 2);
        assert_eq!(account.balance, U256::from(1000));
        assert_eq!(account.incarnation, 1);
        assert_eq!(account.code_hash, code_hash);
        assert_eq!(account.encode_for_storage(), encoded);
        Ok(())
    }

    #[test]
    fn missing_code_hash_is_empty_code() -> anyhow::Result<()> {
        let account = StoredAccount::decode_for_storage(&hex::decode("0201ff")?)?
            .expect("account exists");

        assert_eq!(account.nonce, 0);
        assert_eq!(account.balance, U256::from(0xff));
        assert_eq!(account.code_hash, KECCAK_EMPTY);
        Ok(())
    }

    #[test]
    fn reject_short_code_hash() -> anyhow::Result<()> {
        let result = StoredAccount::decode_for_storage(&hex::decode("0802abcd")?);
        assert_eq!(
            result,
            Err(StateError::InvalidAccount("code hash must be 32 bytes"))
        );
        Ok(())
    }

    #[test]
    fn reject_truncated_field() -> anyhow::Result<()> {
        let result = StoredAccount::decode_for_storage(&hex::decode("0104ff")?);
        assert_eq!(
            result,
            Err(StateError::InvalidAccount("field exceeds encoding"))
        );
        Ok(())
    }

    #[test]
    fn encode_empty_account() {
        assert_eq!(StoredAccount::default().encode_for_storage(), vec![0u8]);
    }
}
