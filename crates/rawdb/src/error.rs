use retrace_chain_config::ChainConfigError;
use retrace_kv::KvError;
use retrace_primitives::B256;

/// Errors that can occur while reading chain data.
#[derive(Debug, thiserror::Error)]
pub enum RawDbError {
    /// No block number is stored for a block hash
    #[error("empty block number value in read_header_number")]
    MissingHeaderNumber,
    /// No block number is stored for a transaction hash
    #[error("empty block number value in read_block_by_transaction_hash")]
    MissingTransactionLookup,
    /// No execution progress is stored
    #[error("empty execution stage progress in read_latest_block_number")]
    MissingLatestBlock,
    /// A stored block number does not fit in 64 bits
    #[error("invalid block number: {0} bytes")]
    InvalidBlockNumber(usize),
    /// No canonical hash is stored for a block number
    #[error("empty block hash value in read_canonical_block_hash")]
    MissingCanonicalHash,
    /// No header is stored for a block
    #[error("empty block header RLP in read_header")]
    MissingHeader,
    /// The stored header cannot be decoded
    #[error("invalid RLP decoding for block header")]
    InvalidHeader(#[source] alloy_rlp::Error),
    /// The stored header hashes to a different value than its key
    #[error("block hash mismatch: expected {expected}, computed {computed}")]
    HeaderHashMismatch {
        /// Hash the header was looked up by
        expected: B256,
        /// Hash of the stored header
        computed: B256,
    },
    /// No body is stored for a block
    #[error("empty block body RLP in read_body")]
    MissingBody,
    /// The stored body descriptor cannot be decoded
    #[error("invalid RLP decoding for block body")]
    InvalidBody(#[source] alloy_rlp::Error),
    /// A stored transaction cannot be decoded
    #[error("invalid stored transaction {id}: {message}")]
    InvalidTransaction {
        /// Storage id of the transaction
        id: u64,
        /// Decoding failure
        message: String,
    },
    /// A stored issuance counter does not fit in 256 bits
    #[error("invalid issuance value: {0} bytes")]
    InvalidIssuance(usize),
    /// No total difficulty is stored for a block
    #[error("empty total difficulty RLP in read_total_difficulty")]
    MissingTotalDifficulty,
    /// The stored total difficulty cannot be decoded
    #[error("invalid RLP decoding for total difficulty")]
    InvalidTotalDifficulty(#[source] alloy_rlp::Error),
    /// No chain configuration is stored for the genesis block
    #[error("empty chain config data in read_chain_config")]
    MissingChainConfig,
    /// The stored chain configuration is invalid
    #[error(transparent)]
    ChainConfig(#[from] ChainConfigError),
    /// Stored receipts cannot be decoded
    #[error("invalid receipts of block {block_number}: {message}")]
    InvalidReceipts {
        /// Block the receipts belong to
        block_number: u64,
        /// Decoding failure
        message: String,
    },
    /// Stored logs cannot be decoded
    #[error("invalid logs of block {block_number}: {message}")]
    InvalidLogs {
        /// Block the logs belong to
        block_number: u64,
        /// Decoding failure
        message: String,
    },
    /// The number of receipts differs from the number of transactions
    #[error("#transactions and #receipts do not match in read_receipts")]
    ReceiptCountMismatch,
    /// Error from the remote key-value store
    #[error(transparent)]
    Kv(#[from] KvError),
}
