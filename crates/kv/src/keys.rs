//! Key layouts of the chain and state tables.

use retrace_primitives::{Address, B256};

/// Length of an encoded block number.
pub const BLOCK_NUMBER_LENGTH: usize = 8;
/// Length of an encoded incarnation.
pub const INCARNATION_LENGTH: usize = 8;

/// Big-endian block number, as used by block-keyed tables.
pub fn block_key(number: u64) -> [u8; BLOCK_NUMBER_LENGTH] {
    number.to_be_bytes()
}

/// Block number followed by block hash.
pub fn header_key(number: u64, hash: &B256) -> Vec<u8> {
    let mut key = Vec::with_capacity(BLOCK_NUMBER_LENGTH + 32);
    key.extend_from_slice(&block_key(number));
    key.extend_from_slice(hash.as_slice());
    key
}

/// Block number followed by the index of a transaction inside the block.
pub fn log_key(number: u64, transaction_index: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(BLOCK_NUMBER_LENGTH + 4);
    key.extend_from_slice(&block_key(number));
    key.extend_from_slice(&transaction_index.to_be_bytes());
    key
}

/// Address followed by incarnation, the prefix of an account's storage.
pub fn storage_prefix(address: &Address, incarnation: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(20 + INCARNATION_LENGTH + 32);
    key.extend_from_slice(address.as_slice());
    key.extend_from_slice(&incarnation.to_be_bytes());
    key
}

/// Address, incarnation and storage location.
pub fn storage_key(address: &Address, incarnation: u64, location: &B256) -> Vec<u8> {
    let mut key = storage_prefix(address, incarnation);
    key.extend_from_slice(location.as_slice());
    key
}

/// Address followed by the block number bounding the history shard.
pub fn account_history_key(address: &Address, block_number: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(20 + BLOCK_NUMBER_LENGTH);
    key.extend_from_slice(address.as_slice());
    key.extend_from_slice(&block_key(block_number));
    key
}

/// Address and storage location followed by the block number bounding the
/// history shard.
pub fn storage_history_key(address: &Address, location: &B256, block_number: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(20 + 32 + BLOCK_NUMBER_LENGTH);
    key.extend_from_slice(address.as_slice());
    key.extend_from_slice(location.as_slice());
    key.extend_from_slice(&block_key(block_number));
    key
}

/// Block number, address and incarnation keying a storage change set.
pub fn storage_change_set_key(block_number: u64, address: &Address, incarnation: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(BLOCK_NUMBER_LENGTH + 20 + INCARNATION_LENGTH);
    key.extend_from_slice(&block_key(block_number));
    key.extend_from_slice(address.as_slice());
    key.extend_from_slice(&incarnation.to_be_bytes());
    key
}

/// Decodes a big-endian number of at most eight bytes.
pub fn decode_u64(bytes: &[u8]) -> Option<u64> {
    if bytes.len() > 8 {
        return None;
    }

    let mut buffer = [0u8; 8];
    buffer.get_mut(8 - bytes.len()..)?.copy_from_slice(bytes);
    Some(u64::from_be_bytes(buffer))
}
