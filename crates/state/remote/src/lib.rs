//! Historical state served by the remote key-value store.
//!
//! [`StateReader`] resolves accounts, storage and code as they were before a
//! given block. [`RemoteState`] exposes it through the synchronous [`State`]
//! interface the EVM consumes and [`CachedRemoteState`] memoizes the results
//! for the duration of a replay.
mod cached;
mod reader;

use retrace_primitives::{Address, B256, Bytecode, KECCAK_EMPTY, U256};
use retrace_state_api::{AccountInfo, State, StateError, account::StoredAccount};
use tokio::runtime;

pub use self::{cached::CachedRemoteState, reader::StateReader};

/// A synchronous view of the historical state at a block.
///
/// Every read blocks the calling thread on the provided runtime, so it must
/// be used from a blocking task or a multi-threaded runtime worker.
#[derive(Clone, Debug)]
pub struct RemoteState {
    reader: StateReader,
    runtime: runtime::Handle,
}

impl RemoteState {
    /// Constructs a new instance that drives the reader's requests on
    /// `runtime`.
    pub fn new(runtime: runtime::Handle, reader: StateReader) -> Self {
        Self { reader, runtime }
    }

    /// Retrieves the block whose pre-state is read.
    pub fn block_number(&self) -> u64 {
        self.reader.block_number()
    }

    /// Retrieves an account including its incarnation.
    pub fn account(&self, address: &Address) -> Result<Option<StoredAccount>, StateError> {
        tokio::task::block_in_place(|| self.runtime.block_on(self.reader.read_account(address)))
    }

    /// Retrieves a storage slot of a specific account incarnation.
    pub fn storage_at(
        &self,
        address: &Address,
        incarnation: u64,
        index: U256,
    ) -> Result<U256, StateError> {
        let location = B256::from(index);
        tokio::task::block_in_place(|| {
            self.runtime
                .block_on(self.reader.read_storage(address, incarnation, &location))
        })
    }
}

impl State for RemoteState {
    type Error = StateError;

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    fn basic(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        Ok(self.account(&address)?.map(|account| account.info()))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    fn code_by_hash(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        if code_hash == KECCAK_EMPTY {
            return Ok(Bytecode::default());
        }

        let code = tokio::task::block_in_place(|| {
            self.runtime.block_on(self.reader.read_code(&code_hash))
        })?;

        Bytecode::new_raw_checked(code).map_err(|error| {
            StateError::Other(format!("invalid bytecode {code_hash}: {error:?}"))
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    fn storage(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        match self.account(&address)? {
            Some(account) => self.storage_at(&address, account.incarnation, index),
            None => Ok(U256::ZERO),
        }
    }

    fn block_hash(&self, number: u64) -> Result<B256, Self::Error> {
        tokio::task::block_in_place(|| self.runtime.block_on(self.reader.read_block_hash(number)))
    }
}
