use parking_lot::Mutex;
use retrace_primitives::{Address, B256, Bytecode, HashMap, U256};
use retrace_state_api::{AccountInfo, State, StateError, account::StoredAccount};
use revm_database_interface::DatabaseRef;

use super::RemoteState;

/// A memoizing version of [`RemoteState`].
///
/// Entries never expire. The state at a block is immutable, so an instance
/// can be reused for as long as its block number doesn't change.
#[derive(Debug)]
pub struct CachedRemoteState {
    remote: RemoteState,
    accounts: Mutex<HashMap<Address, Option<StoredAccount>>>,
    storage: Mutex<HashMap<(Address, U256), U256>>,
    code: Mutex<HashMap<B256, Bytecode>>,
    block_hashes: Mutex<HashMap<u64, B256>>,
}

impl CachedRemoteState {
    /// Constructs a new [`CachedRemoteState`].
    pub fn new(remote: RemoteState) -> Self {
        Self {
            remote,
            accounts: Mutex::default(),
            storage: Mutex::default(),
            code: Mutex::default(),
            block_hashes: Mutex::default(),
        }
    }

    /// Retrieves the block whose pre-state is read.
    pub fn block_number(&self) -> u64 {
        self.remote.block_number()
    }

    fn account(&self, address: Address) -> Result<Option<StoredAccount>, StateError> {
        if let Some(account) = self.accounts.lock().get(&address) {
            return Ok(*account);
        }

        let account = self.remote.account(&address)?;
        self.accounts.lock().insert(address, account);

        Ok(account)
    }
}

impl State for CachedRemoteState {
    type Error = StateError;

    fn basic(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        Ok(self.account(address)?.map(|account| account.info()))
    }

    fn code_by_hash(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        if let Some(code) = self.code.lock().get(&code_hash) {
            return Ok(code.clone());
        }

        let code = self.remote.code_by_hash(code_hash)?;
        self.code.lock().insert(code_hash, code.clone());

        Ok(code)
    }

    fn storage(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        if let Some(value) = self.storage.lock().get(&(address, index)) {
            return Ok(*value);
        }

        let value = match self.account(address)? {
            Some(account) => self.remote.storage_at(&address, account.incarnation, index)?,
            None => U256::ZERO,
        };
        self.storage.lock().insert((address, index), value);

        Ok(value)
    }

    fn block_hash(&self, number: u64) -> Result<B256, Self::Error> {
        if let Some(hash) = self.block_hashes.lock().get(&number) {
            return Ok(*hash);
        }

        let hash = self.remote.block_hash(number)?;
        self.block_hashes.lock().insert(number, hash);

        Ok(hash)
    }
}

impl DatabaseRef for CachedRemoteState {
    type Error = StateError;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        State::basic(self, address)
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        State::code_by_hash(self, code_hash)
    }

    fn storage_ref(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        State::storage(self, address, index)
    }

    fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error> {
        State::block_hash(self, number)
    }
}
