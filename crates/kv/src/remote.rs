//! Client side of the cursor protocol spoken with the remote store.
//!
//! Each read transaction owns one request/response stream. Cursors are opened
//! lazily, one per table, and reused for the lifetime of the transaction.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use retrace_primitives::Bytes;
use tokio::sync::{Mutex, MutexGuard};

use crate::{Database, KeyValue, KvError, Transaction, Walker, fixed_bits_match};

/// Operation requested from the remote store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorOp {
    /// Opens a cursor on a table
    Open,
    /// Positions the cursor on the first key greater than or equal to the
    /// given one
    Seek,
    /// Positions the cursor on exactly the given key
    SeekExact,
    /// Positions the cursor on the first duplicate of the given key that is
    /// greater than or equal to the given value
    SeekBoth,
    /// Advances the cursor
    Next,
    /// Closes the cursor
    Close,
    /// Closes the whole transaction
    CloseTransaction,
}

/// A single request sent over a [`CursorStream`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorRequest {
    /// The operation
    pub op: CursorOp,
    /// Table name, only set for [`CursorOp::Open`]
    pub table: String,
    /// Cursor the operation applies to
    pub cursor: u32,
    /// Key argument
    pub key: Bytes,
    /// Value argument, only set for [`CursorOp::SeekBoth`]
    pub value: Bytes,
}

impl CursorRequest {
    fn new(op: CursorOp, cursor: u32) -> Self {
        Self {
            op,
            table: String::new(),
            cursor,
            key: Bytes::new(),
            value: Bytes::new(),
        }
    }

    fn open(table: &str) -> Self {
        Self {
            table: table.to_owned(),
            ..Self::new(CursorOp::Open, 0)
        }
    }

    fn with_key(op: CursorOp, cursor: u32, key: &[u8]) -> Self {
        Self {
            key: Bytes::copy_from_slice(key),
            ..Self::new(op, cursor)
        }
    }
}

/// Reply to a [`CursorRequest`]. An empty key means no entry was found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pair {
    /// Key of the entry under the cursor
    pub key: Bytes,
    /// Value of the entry under the cursor
    pub value: Bytes,
    /// Identifier of a newly opened cursor
    pub cursor_id: u32,
}

/// Bidirectional request/response channel backing one read transaction.
#[async_trait]
pub trait CursorStream: Send {
    /// Sends a request and waits for its reply.
    async fn send(&mut self, request: CursorRequest) -> Result<Pair, KvError>;
}

/// Connection factory for the remote store.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Stream type of a single transaction.
    type Stream: CursorStream + 'static;

    /// Opens a stream for a new read transaction and returns the transaction's
    /// identifier alongside it.
    async fn connect(&self) -> Result<(u64, Self::Stream), KvError>;
}

/// A [`Database`] reached through a [`KvBackend`].
#[derive(Debug)]
pub struct RemoteDatabase<BackendT> {
    backend: BackendT,
}

impl<BackendT> RemoteDatabase<BackendT> {
    /// Constructs a new instance.
    pub fn new(backend: BackendT) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &BackendT {
        &self.backend
    }
}

#[async_trait]
impl<BackendT: KvBackend> Database for RemoteDatabase<BackendT> {
    async fn begin(&self) -> Result<Arc<dyn Transaction>, KvError> {
        let (id, stream) = self.backend.connect().await?;
        log::trace!("opened remote transaction {id}");

        Ok(Arc::new(RemoteTransaction::new(id, stream)))
    }
}

struct Inner<StreamT> {
    stream: StreamT,
    cursors: HashMap<String, u32>,
    closed: bool,
}

impl<StreamT: CursorStream> Inner<StreamT> {
    async fn cursor(&mut self, table: &str) -> Result<u32, KvError> {
        if let Some(cursor) = self.cursors.get(table) {
            return Ok(*cursor);
        }

        let reply = self.stream.send(CursorRequest::open(table)).await?;
        self.cursors.insert(table.to_owned(), reply.cursor_id);
        Ok(reply.cursor_id)
    }

    async fn request(&mut self, op: CursorOp, table: &str, key: &[u8]) -> Result<Pair, KvError> {
        let cursor = self.cursor(table).await?;
        self.stream
            .send(CursorRequest::with_key(op, cursor, key))
            .await
    }
}

/// A read transaction driven over a [`CursorStream`].
pub struct RemoteTransaction<StreamT> {
    id: u64,
    inner: Mutex<Inner<StreamT>>,
}

impl<StreamT: CursorStream> RemoteTransaction<StreamT> {
    /// Constructs a new instance.
    pub fn new(id: u64, stream: StreamT) -> Self {
        Self {
            id,
            inner: Mutex::new(Inner {
                stream,
                cursors: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Identifier assigned by the remote store.
    pub fn id(&self) -> u64 {
        self.id
    }

    async fn lock(&self) -> Result<MutexGuard<'_, Inner<StreamT>>, KvError> {
        let inner = self.inner.lock().await;
        if inner.closed {
            return Err(KvError::TransactionClosed(self.id));
        }
        Ok(inner)
    }
}

#[async_trait]
impl<StreamT: CursorStream> Transaction for RemoteTransaction<StreamT> {
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    async fn get(&self, table: &str, key: &[u8]) -> Result<Option<KeyValue>, KvError> {
        let pair = self.lock().await?.request(CursorOp::Seek, table, key).await?;

        Ok((!pair.key.is_empty()).then(|| KeyValue {
            key: pair.key,
            value: pair.value,
        }))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    async fn get_one(&self, table: &str, key: &[u8]) -> Result<Bytes, KvError> {
        let pair = self
            .lock()
            .await?
            .request(CursorOp::SeekExact, table, key)
            .await?;

        Ok(pair.value)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    async fn get_both_range(
        &self,
        table: &str,
        key: &[u8],
        subkey: &[u8],
    ) -> Result<Option<Bytes>, KvError> {
        let mut inner = self.lock().await?;
        let cursor = inner.cursor(table).await?;

        let request = CursorRequest {
            value: Bytes::copy_from_slice(subkey),
            ..CursorRequest::with_key(CursorOp::SeekBoth, cursor, key)
        };
        let pair = inner.stream.send(request).await?;

        Ok((!pair.value.is_empty()).then_some(pair.value))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self, walker)))]
    async fn walk(
        &self,
        table: &str,
        start_key: &[u8],
        fixed_bits: u32,
        walker: &mut Walker<'_>,
    ) -> Result<(), KvError> {
        let mut inner = self.lock().await?;
        let cursor = inner.cursor(table).await?;

        let mut pair = inner
            .stream
            .send(CursorRequest::with_key(CursorOp::Seek, cursor, start_key))
            .await?;

        while !pair.key.is_empty() && fixed_bits_match(&pair.key, start_key, fixed_bits) {
            if !walker(&pair.key, &pair.value) {
                break;
            }

            pair = inner
                .stream
                .send(CursorRequest::new(CursorOp::Next, cursor))
                .await?;
        }

        Ok(())
    }

    async fn close(&self) -> Result<(), KvError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;

        let cursors: Vec<u32> = inner.cursors.drain().map(|(_, cursor)| cursor).collect();
        for cursor in cursors {
            inner
                .stream
                .send(CursorRequest::new(CursorOp::Close, cursor))
                .await?;
        }

        inner
            .stream
            .send(CursorRequest::new(CursorOp::CloseTransaction, 0))
            .await?;

        log::trace!("closed remote transaction {}", self.id);
        Ok(())
    }
}
