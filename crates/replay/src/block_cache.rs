use std::{num::NonZeroUsize, sync::Arc};

use lru::LruCache;
use parking_lot::Mutex;
use retrace_block::{BlockNumberOrHash, BlockTag, BlockWithHash};
use retrace_kv::Transaction as KvTransaction;
use retrace_primitives::B256;
use retrace_rawdb::RawDbError;
use retrace_transaction::Transaction;

use crate::ReplayError;

/// Recently read blocks, keyed by hash and shared across requests.
#[derive(Debug)]
pub struct BlockCache {
    blocks: Mutex<LruCache<B256, Arc<BlockWithHash>>>,
}

impl BlockCache {
    /// Constructs a cache holding at most `capacity` blocks.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            blocks: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached block with `hash`.
    pub fn get(&self, hash: &B256) -> Option<Arc<BlockWithHash>> {
        self.blocks.lock().get(hash).cloned()
    }

    /// Caches `block`.
    pub fn insert(&self, block: Arc<BlockWithHash>) {
        self.blocks.lock().put(block.hash, block);
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }

    /// Whether no block is cached.
    pub fn is_empty(&self) -> bool {
        self.blocks.lock().is_empty()
    }

    /// Reads the block with `hash`, through the cache.
    pub async fn read_block_by_hash(
        &self,
        tx: &dyn KvTransaction,
        hash: &B256,
    ) -> Result<Arc<BlockWithHash>, ReplayError> {
        if let Some(block) = self.get(hash) {
            return Ok(block);
        }

        let block = retrace_rawdb::read_block_by_hash(tx, hash)
            .await
            .map_err(|error| not_found(error, BlockNumberOrHash::Hash(*hash)))?;
        let block = Arc::new(block);
        self.insert(Arc::clone(&block));
        Ok(block)
    }

    /// Reads the canonical block with `number`, through the cache.
    pub async fn read_block_by_number(
        &self,
        tx: &dyn KvTransaction,
        number: u64,
    ) -> Result<Arc<BlockWithHash>, ReplayError> {
        let hash = retrace_rawdb::read_canonical_block_hash(tx, number)
            .await
            .map_err(|error| not_found(error, BlockNumberOrHash::Number(number)))?;

        if let Some(block) = self.get(&hash) {
            return Ok(block);
        }

        let block = retrace_rawdb::read_block(tx, &hash, number)
            .await
            .map_err(|error| not_found(error, BlockNumberOrHash::Number(number)))?;
        let block = Arc::new(block);
        self.insert(Arc::clone(&block));
        Ok(block)
    }

    /// Resolves a block identifier and reads the block, through the cache.
    pub async fn read_block(
        &self,
        tx: &dyn KvTransaction,
        id: BlockNumberOrHash,
    ) -> Result<Arc<BlockWithHash>, ReplayError> {
        match id {
            BlockNumberOrHash::Hash(hash) => self.read_block_by_hash(tx, &hash).await,
            id => {
                let number = resolve_block_number(tx, id).await?;
                self.read_block_by_number(tx, number).await
            }
        }
    }
}

/// A canonical transaction and the block containing it.
#[derive(Clone, Debug)]
pub struct TransactionWithBlock {
    /// The containing block
    pub block: Arc<BlockWithHash>,
    /// The transaction
    pub transaction: Transaction,
    /// Position of the transaction within the block
    pub index: usize,
}

impl BlockCache {
    /// Locates a canonical transaction by hash. Returns `None` if no block
    /// contains it.
    pub async fn read_transaction_by_hash(
        &self,
        tx: &dyn KvTransaction,
        hash: &B256,
    ) -> Result<Option<TransactionWithBlock>, ReplayError> {
        let number = match retrace_rawdb::read_block_number_by_transaction_hash(tx, hash).await {
            Ok(number) => number,
            Err(RawDbError::MissingTransactionLookup) => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let block = self.read_block_by_number(tx, number).await?;
        let found = block
            .block
            .transactions()
            .iter()
            .enumerate()
            .find(|(_, transaction)| transaction.hash == *hash)
            .map(|(index, transaction)| (index, transaction.clone()));

        Ok(found.map(|(index, transaction)| TransactionWithBlock {
            block: Arc::clone(&block),
            transaction,
            index,
        }))
    }
}

/// Resolves a block identifier to a block number.
pub async fn resolve_block_number(
    tx: &dyn KvTransaction,
    id: BlockNumberOrHash,
) -> Result<u64, ReplayError> {
    match id {
        BlockNumberOrHash::Number(number) => Ok(number),
        BlockNumberOrHash::Tag(BlockTag::Earliest) => Ok(0),
        BlockNumberOrHash::Tag(BlockTag::Latest | BlockTag::Pending) => {
            Ok(retrace_rawdb::read_latest_block_number(tx).await?)
        }
        BlockNumberOrHash::Hash(hash) => retrace_rawdb::read_header_number(tx, &hash)
            .await
            .map_err(|error| not_found(error, id)),
    }
}

fn not_found(error: RawDbError, id: BlockNumberOrHash) -> ReplayError {
    match error {
        RawDbError::MissingHeaderNumber
        | RawDbError::MissingCanonicalHash
        | RawDbError::MissingHeader
        | RawDbError::MissingBody => ReplayError::BlockNotFound(id),
        error => error.into(),
    }
}
