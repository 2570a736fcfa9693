//! Plain-state cache for requests that target the head block.
//!
//! Values read from the plain state and code tables are only valid for the
//! head they were read at. [`HeadStateCache`] keeps one snapshot per head,
//! identified by number and hash, and replaces it wholesale once a request
//! observes a newer head or a different block at the same height.

use std::{num::NonZeroUsize, sync::Arc};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use retrace_kv::{KeyValue, KvError, Transaction, Walker, tables};
use retrace_primitives::{B256, Bytes};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum CacheKey {
    PlainState(Vec<u8>),
    Code(Vec<u8>),
}

impl CacheKey {
    fn new(table: &str, key: &[u8]) -> Option<Self> {
        match table {
            tables::PLAIN_STATE => Some(Self::PlainState(key.to_vec())),
            tables::CODE => Some(Self::Code(key.to_vec())),
            _ => None,
        }
    }
}

/// Values observed at one head block.
#[derive(Debug)]
pub struct HeadSnapshot {
    head: u64,
    hash: B256,
    entries: Mutex<LruCache<CacheKey, Bytes>>,
}

impl HeadSnapshot {
    fn new(head: u64, hash: B256, capacity: NonZeroUsize) -> Self {
        Self {
            head,
            hash,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The head block the snapshot was seeded for.
    pub fn head(&self) -> u64 {
        self.head
    }

    /// Hash of the head block the snapshot was seeded for.
    pub fn hash(&self) -> B256 {
        self.hash
    }

    fn is_for(&self, head: u64, hash: &B256) -> bool {
        self.head == head && self.hash == *hash
    }

    /// Number of cached values.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no value has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Shared cache of plain-state reads at the current head.
#[derive(Debug)]
pub struct HeadStateCache {
    capacity: NonZeroUsize,
    current: RwLock<Arc<HeadSnapshot>>,
}

impl HeadStateCache {
    /// Constructs a cache holding at most `capacity` values.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            capacity,
            current: RwLock::new(Arc::new(HeadSnapshot::new(0, B256::ZERO, capacity))),
        }
    }

    /// The snapshot currently shared by head requests.
    pub fn current(&self) -> Arc<HeadSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Returns the snapshot for the head block `head` with hash `hash`.
    ///
    /// The shared snapshot is replaced when the head moves forward or when a
    /// different block is seen at the current height. A request for an older
    /// head gets a private snapshot and leaves the shared one in place.
    pub fn snapshot(&self, head: u64, hash: B256) -> Arc<HeadSnapshot> {
        {
            let current = self.current.read();
            if current.is_for(head, &hash) {
                return Arc::clone(&current);
            }
        }

        let mut current = self.current.write();
        if current.is_for(head, &hash) {
            return Arc::clone(&current);
        }

        if head < current.head {
            log::debug!(
                "head state cache at block {} ignores older head {head}",
                current.head
            );
            return Arc::new(HeadSnapshot::new(head, hash, self.capacity));
        }

        if head == current.head {
            log::debug!(
                "head state cache drops block {} {} for {hash}",
                current.head,
                current.hash
            );
        } else {
            log::debug!("head state cache moves from block {} to {head}", current.head);
        }
        *current = Arc::new(HeadSnapshot::new(head, hash, self.capacity));
        Arc::clone(&current)
    }

    /// Wraps a read transaction so that plain-state and code lookups at the
    /// head block `head` with hash `hash` go through the cache.
    pub fn wrap(
        &self,
        transaction: Arc<dyn Transaction>,
        head: u64,
        hash: B256,
    ) -> Arc<dyn Transaction> {
        Arc::new(CachedTransaction {
            inner: transaction,
            snapshot: self.snapshot(head, hash),
        })
    }
}

/// A read transaction consulting a [`HeadSnapshot`] before the store.
pub struct CachedTransaction {
    inner: Arc<dyn Transaction>,
    snapshot: Arc<HeadSnapshot>,
}

impl std::fmt::Debug for CachedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedTransaction")
            .field("head", &self.snapshot.head)
            .field("hash", &self.snapshot.hash)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transaction for CachedTransaction {
    async fn get(&self, table: &str, key: &[u8]) -> Result<Option<KeyValue>, KvError> {
        self.inner.get(table, key).await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    async fn get_one(&self, table: &str, key: &[u8]) -> Result<Bytes, KvError> {
        let Some(cache_key) = CacheKey::new(table, key) else {
            return self.inner.get_one(table, key).await;
        };

        if let Some(value) = self.snapshot.entries.lock().get(&cache_key) {
            return Ok(value.clone());
        }

        let value = self.inner.get_one(table, key).await?;
        self.snapshot.entries.lock().put(cache_key, value.clone());

        Ok(value)
    }

    async fn get_both_range(
        &self,
        table: &str,
        key: &[u8],
        subkey: &[u8],
    ) -> Result<Option<Bytes>, KvError> {
        self.inner.get_both_range(table, key, subkey).await
    }

    async fn walk(
        &self,
        table: &str,
        start_key: &[u8],
        fixed_bits: u32,
        walker: &mut Walker<'_>,
    ) -> Result<(), KvError> {
        self.inner.walk(table, start_key, fixed_bits, walker).await
    }

    async fn close(&self) -> Result<(), KvError> {
        self.inner.close().await
    }
}
