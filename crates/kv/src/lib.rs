//! Read-only access to the remote key-value store holding chain data.
//!
//! A [`Database`] hands out [`Transaction`]s that are driven through the
//! cursor protocol in [`remote`]. Every request that opens a transaction must
//! close it again, which [`with_transaction`] and [`ScopedTransaction`]
//! guarantee on every exit path.

mod error;
pub mod keys;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod remote;
mod scoped;
pub mod tables;

use std::sync::Arc;

use async_trait::async_trait;
use retrace_primitives::Bytes;

pub use self::{
    error::KvError,
    scoped::{ScopedTransaction, with_transaction},
};

/// A key and its associated value, as returned by a cursor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyValue {
    /// The key
    pub key: Bytes,
    /// The value
    pub value: Bytes,
}

/// Visitor invoked by [`Transaction::walk`] for every matching entry. Returning
/// `false` stops the walk.
pub type Walker<'walker> = dyn FnMut(&[u8], &[u8]) -> bool + Send + 'walker;

/// A read transaction against the remote key-value store.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Returns the first entry whose key is greater than or equal to `key`.
    async fn get(&self, table: &str, key: &[u8]) -> Result<Option<KeyValue>, KvError>;

    /// Returns the value stored under exactly `key`. An empty value signals
    /// that the key is absent.
    async fn get_one(&self, table: &str, key: &[u8]) -> Result<Bytes, KvError>;

    /// Returns the first duplicate value of `key` that is greater than or equal
    /// to `subkey`.
    async fn get_both_range(
        &self,
        table: &str,
        key: &[u8],
        subkey: &[u8],
    ) -> Result<Option<Bytes>, KvError>;

    /// Visits entries in key order, starting at `start_key`, for as long as the
    /// first `fixed_bits` bits of the key match those of `start_key`.
    async fn walk(
        &self,
        table: &str,
        start_key: &[u8],
        fixed_bits: u32,
        walker: &mut Walker<'_>,
    ) -> Result<(), KvError>;

    /// Visits every entry whose key starts with `prefix`.
    async fn for_prefix(
        &self,
        table: &str,
        prefix: &[u8],
        walker: &mut Walker<'_>,
    ) -> Result<(), KvError> {
        let fixed_bits = u32::try_from(prefix.len() * 8).unwrap_or(u32::MAX);
        self.walk(table, prefix, fixed_bits, walker).await
    }

    /// Releases the transaction on the remote side. Any subsequent request
    /// fails.
    async fn close(&self) -> Result<(), KvError>;
}

/// A remote key-value store that read transactions can be opened on.
#[async_trait]
pub trait Database: Send + Sync {
    /// Opens a new read transaction.
    async fn begin(&self) -> Result<Arc<dyn Transaction>, KvError>;
}

/// Whether the first `fixed_bits` bits of `key` and `start_key` are equal.
///
/// A `start_key` shorter than the fixed prefix never matches.
pub fn fixed_bits_match(key: &[u8], start_key: &[u8], fixed_bits: u32) -> bool {
    if fixed_bits == 0 {
        return true;
    }

    let fixed_bytes = fixed_bits.div_ceil(8) as usize;
    let shift = (8 - fixed_bits % 8) % 8;
    let mask = 0xffu8 << shift;

    let key = key.get(..fixed_bytes).and_then(<[u8]>::split_last);
    let start_key = start_key.get(..fixed_bytes).and_then(<[u8]>::split_last);
    match (key, start_key) {
        (Some((key_last, key_head)), Some((start_last, start_head))) => {
            key_head == start_head && (key_last & mask) == (start_last & mask)
        }
        _ => false,
    }
}
