//! Readers for the chain data stored in the remote key-value store.
//!
//! All readers operate on an open [`retrace_kv::Transaction`] and never cache;
//! caching is left to the callers.

mod chain;
mod error;
mod receipts;

pub use self::{
    chain::{
        read_block, read_block_by_hash, read_block_by_number, read_block_by_transaction_hash,
        read_block_number_by_transaction_hash, read_body, read_body_rlp,
        read_canonical_block_hash, read_chain_config, read_chain_id, read_header,
        read_header_by_hash, read_header_by_number, read_header_number, read_header_rlp,
        read_latest_block_number, read_senders, read_total_burnt, read_total_difficulty,
        read_total_issued,
    },
    error::RawDbError,
    receipts::{read_raw_receipts, read_receipts},
};
