use retrace_kv::KvError;
use retrace_primitives::{Address, B256};

/// Combinatorial error for the state API
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Contract with specified code hash does not exist
    #[error("Contract with code hash `{0}` does not exist.")]
    InvalidCodeHash(B256),
    /// A stored account could not be decoded
    #[error("invalid encoded account: {0}")]
    InvalidAccount(&'static str),
    /// The history index points to a block whose change set lacks the entry
    #[error("missing change set entry for {address} at block {block_number}")]
    MissingChangeSet {
        /// Account whose history was searched
        address: Address,
        /// Block the history index pointed to
        block_number: u64,
    },
    /// The requested block hash is not stored
    #[error("block hash not found for block {0}")]
    MissingBlockHash(u64),
    /// Error from the remote key-value store
    #[error(transparent)]
    Remote(#[from] KvError),
    /// Error that doesn't fit the other categories
    #[error("{0}")]
    Other(String),
}

impl revm_database_interface::DBErrorMarker for StateError {}
