use retrace_block::BlockNumberOrHash;
use retrace_evm::ExecutorError;
use retrace_kv::KvError;
use retrace_primitives::B256;
use retrace_rawdb::RawDbError;
use retrace_transaction::TransactionError;

use crate::stream::StreamError;

/// Errors that abort a trace request.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// The requested block doesn't exist
    #[error("block {0} not found")]
    BlockNotFound(BlockNumberOrHash),
    /// The requested transaction doesn't exist
    #[error("transaction {0} not found")]
    TransactionNotFound(B256),
    /// The traced transaction was rejected before execution
    #[error("{0}")]
    PreCheck(String),
    /// `fromBlock` lies after `toBlock`
    #[error("invalid block range: {from} > {to}")]
    InvalidBlockRange {
        /// First block of the range
        from: u64,
        /// Last block of the range
        to: u64,
    },
    /// The block range exceeds the configured limit
    #[error("block range too large: {requested} blocks, at most {limit} allowed")]
    BlockRangeTooLarge {
        /// Number of blocks in the range
        requested: u64,
        /// Configured limit
        limit: u64,
    },
    /// Reading chain data failed
    #[error(transparent)]
    RawDb(#[from] RawDbError),
    /// Executing a transaction failed
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    /// A transaction is malformed
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    /// The remote key-value store failed
    #[error(transparent)]
    Kv(#[from] KvError),
    /// Writing to the output stream failed
    #[error(transparent)]
    Stream(#[from] StreamError),
}
