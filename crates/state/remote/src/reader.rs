use std::sync::Arc;

use retrace_kv::{
    Transaction as KvTransaction,
    keys::{block_key, decode_u64, storage_change_set_key, storage_key},
    tables,
};
use retrace_primitives::{Address, B256, Bytes, KECCAK_EMPTY, U256};
use retrace_rawdb::RawDbError;
use retrace_state_api::{StateError, account::StoredAccount};

/// Reads state as it was before a block executed.
///
/// Values changed by block `block_number` or later are resolved through the
/// history indices and change sets; everything else is read from the plain
/// state.
#[derive(Clone)]
pub struct StateReader {
    transaction: Arc<dyn KvTransaction>,
    block_number: u64,
}

impl std::fmt::Debug for StateReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateReader")
            .field("block_number", &self.block_number)
            .finish_non_exhaustive()
    }
}

impl StateReader {
    /// Constructs a reader for the state at the start of `block_number`.
    pub fn new(transaction: Arc<dyn KvTransaction>, block_number: u64) -> Self {
        Self {
            transaction,
            block_number,
        }
    }

    /// The block whose pre-state is read.
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Reads an account. `None` if it did not exist.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    pub async fn read_account(&self, address: &Address) -> Result<Option<StoredAccount>, StateError> {
        let encoded = match self
            .first_change(tables::ACCOUNT_HISTORY, address.as_slice())
            .await?
        {
            Some(changed_at) => self.previous_account(address, changed_at).await?,
            None => {
                self.transaction
                    .get_one(tables::PLAIN_STATE, address.as_slice())
                    .await?
            }
        };

        StoredAccount::decode_for_storage(&encoded)
    }

    /// Reads a storage slot of the given account incarnation.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    pub async fn read_storage(
        &self,
        address: &Address,
        incarnation: u64,
        location: &B256,
    ) -> Result<U256, StateError> {
        let mut history_prefix = address.to_vec();
        history_prefix.extend_from_slice(location.as_slice());

        let encoded = match self
            .first_change(tables::STORAGE_HISTORY, &history_prefix)
            .await?
        {
            Some(changed_at) => {
                self.previous_storage(address, incarnation, location, changed_at)
                    .await?
            }
            None => {
                self.transaction
                    .get_one(
                        tables::PLAIN_STATE,
                        &storage_key(address, incarnation, location),
                    )
                    .await?
            }
        };

        U256::try_from_be_slice(&encoded)
            .ok_or_else(|| StateError::Other(format!("storage value of {} bytes", encoded.len())))
    }

    /// Reads bytecode by its hash.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    pub async fn read_code(&self, code_hash: &B256) -> Result<Bytes, StateError> {
        if *code_hash == KECCAK_EMPTY {
            return Ok(Bytes::new());
        }

        let code = self
            .transaction
            .get_one(tables::CODE, code_hash.as_slice())
            .await?;
        if code.is_empty() {
            return Err(StateError::InvalidCodeHash(*code_hash));
        }

        Ok(code)
    }

    /// Reads the hash of a canonical block.
    pub async fn read_block_hash(&self, number: u64) -> Result<B256, StateError> {
        retrace_rawdb::read_canonical_block_hash(self.transaction.as_ref(), number)
            .await
            .map_err(|error| match error {
                RawDbError::MissingCanonicalHash => StateError::MissingBlockHash(number),
                RawDbError::Kv(error) => StateError::Remote(error),
                error => StateError::Other(error.to_string()),
            })
    }

    /// Returns the first block at or after the reader's block in which the key
    /// with the provided prefix changed.
    async fn first_change(&self, table: &str, prefix: &[u8]) -> Result<Option<u64>, StateError> {
        let mut seek_key = prefix.to_vec();
        seek_key.extend_from_slice(&block_key(self.block_number));

        let Some(entry) = self.transaction.get(table, &seek_key).await? else {
            return Ok(None);
        };
        if entry.key.len() != seek_key.len() || !entry.key.starts_with(prefix) {
            return Ok(None);
        }

        Ok(entry
            .value
            .chunks_exact(8)
            .filter_map(decode_u64)
            .find(|block_number| *block_number >= self.block_number))
    }

    async fn previous_account(
        &self,
        address: &Address,
        changed_at: u64,
    ) -> Result<Bytes, StateError> {
        let change = self
            .transaction
            .get_both_range(
                tables::ACCOUNT_CHANGE_SET,
                &block_key(changed_at),
                address.as_slice(),
            )
            .await?
            .filter(|change| change.starts_with(address.as_slice()))
            .ok_or(StateError::MissingChangeSet {
                address: *address,
                block_number: changed_at,
            })?;

        Ok(change.slice(Address::len_bytes()..).into())
    }

    async fn previous_storage(
        &self,
        address: &Address,
        incarnation: u64,
        location: &B256,
        changed_at: u64,
    ) -> Result<Bytes, StateError> {
        let change = self
            .transaction
            .get_both_range(
                tables::STORAGE_CHANGE_SET,
                &storage_change_set_key(changed_at, address, incarnation),
                location.as_slice(),
            )
            .await?
            .filter(|change| change.starts_with(location.as_slice()))
            .ok_or(StateError::MissingChangeSet {
                address: *address,
                block_number: changed_at,
            })?;

        Ok(change.slice(B256::len_bytes()..).into())
    }
}
