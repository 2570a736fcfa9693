//! Types for reading historical Ethereum state

pub mod account;
mod error;

use auto_impl::auto_impl;
use retrace_primitives::{Address, B256, Bytecode, U256};
pub use revm_state::{AccountInfo, EvmState, EvmStorageSlot};

pub use self::error::StateError;

/// Trait for reading state information.
#[auto_impl(&, Box, Arc)]
pub trait State {
    /// Combinatorial state error.
    type Error;

    /// Get basic account information.
    fn basic(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error>;

    /// Get account code by its hash
    fn code_by_hash(&self, code_hash: B256) -> Result<Bytecode, Self::Error>;

    /// Get storage value of address at index.
    fn storage(&self, address: Address, index: U256) -> Result<U256, Self::Error>;

    /// Get the hash of the canonical block with the provided number.
    fn block_hash(&self, number: u64) -> Result<B256, Self::Error>;
}
