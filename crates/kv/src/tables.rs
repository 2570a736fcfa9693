//! Names of the tables stored in the remote key-value store.

/// Block hash to block number.
pub const HEADER_NUMBERS: &str = "HeaderNumber";
/// Block number and hash to RLP-encoded header.
pub const HEADERS: &str = "Header";
/// Block number and hash to RLP-encoded body descriptor.
pub const BLOCK_BODIES: &str = "BlockBody";
/// Transaction id to EIP-2718 encoded transaction.
pub const BLOCK_TRANSACTIONS: &str = "BlockTransaction";
/// Block number and hash to concatenated transaction senders.
pub const SENDERS: &str = "TxSender";
/// Block number to canonical block hash.
pub const CANONICAL_HASHES: &str = "CanonicalHeader";
/// Block number and hash to RLP-encoded total difficulty.
pub const HEADERS_TOTAL_DIFFICULTY: &str = "HeadersTotalDifficulty";
/// Transaction hash to block number.
pub const TRANSACTION_LOOKUP: &str = "BlockTransactionLookup";
/// Block number to CBOR-encoded receipts.
pub const RECEIPTS: &str = "Receipt";
/// Block number and transaction index to CBOR-encoded logs.
pub const LOGS: &str = "TransactionLog";
/// Genesis hash to chain configuration JSON.
pub const CONFIG: &str = "Config";
/// Issuance counters per block.
pub const ISSUANCE: &str = "Issuance";
/// Stage name to the last block processed by that stage.
pub const SYNC_STAGE_PROGRESS: &str = "SyncStage";
/// Current accounts and storage.
pub const PLAIN_STATE: &str = "PlainState";
/// Blocks at which an account changed.
pub const ACCOUNT_HISTORY: &str = "AccountHistory";
/// Blocks at which a storage slot changed.
pub const STORAGE_HISTORY: &str = "StorageHistory";
/// Previous account values per block.
pub const ACCOUNT_CHANGE_SET: &str = "AccountChangeSet";
/// Previous storage values per block.
pub const STORAGE_CHANGE_SET: &str = "StorageChangeSet";
/// Code hash to bytecode.
pub const CODE: &str = "Code";

/// Key prefix of the total issued amount in [`ISSUANCE`].
pub const TOTAL_ISSUED_PREFIX: &[u8] = b"totalIssued";
/// Key prefix of the total burnt amount in [`ISSUANCE`].
pub const TOTAL_BURNT_PREFIX: &[u8] = b"totalBurnt";
/// Stage whose progress marks the latest executed block.
pub const EXECUTION_STAGE: &[u8] = b"Execution";

/// Whether the table stores several sorted values per key.
pub fn is_dup_sort(table: &str) -> bool {
    matches!(table, ACCOUNT_CHANGE_SET | STORAGE_CHANGE_SET)
}
