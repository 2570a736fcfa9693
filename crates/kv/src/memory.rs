//! An in-memory store speaking the cursor protocol, for tests.

use std::{
    collections::{BTreeSet, HashMap},
    ops::Bound,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::RwLock;
use retrace_primitives::Bytes;

use crate::{
    Database, KvError, Transaction,
    remote::{CursorOp, CursorRequest, CursorStream, KvBackend, Pair, RemoteTransaction},
    tables,
};

type Entry = (Vec<u8>, Vec<u8>);
type Table = BTreeSet<Entry>;

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<HashMap<String, Table>>,
    disconnected: AtomicBool,
    open_transactions: AtomicUsize,
    next_transaction_id: AtomicU64,
}

/// An in-memory key-value store. Clones share the same data.
#[derive(Clone, Debug, Default)]
pub struct MemoryDatabase {
    shared: Arc<Shared>,
}

impl MemoryDatabase {
    /// Stores `value` under `key`. Duplicate-sorted tables keep every value;
    /// other tables replace the previous one.
    pub fn put(&self, table: &str, key: &[u8], value: &[u8]) {
        let mut tables = self.shared.tables.write();
        let entries = tables.entry(table.to_owned()).or_default();

        if !tables::is_dup_sort(table) {
            remove_key(entries, key);
        }
        entries.insert((key.to_vec(), value.to_vec()));
    }

    /// Removes every value stored under `key`.
    pub fn delete(&self, table: &str, key: &[u8]) {
        if let Some(entries) = self.shared.tables.write().get_mut(table) {
            remove_key(entries, key);
        }
    }

    /// Simulates loss of the connection: every pending and future request
    /// fails.
    pub fn disconnect(&self) {
        self.shared.disconnected.store(true, Ordering::SeqCst);
    }

    /// Number of transactions that were opened but not yet closed.
    pub fn open_transactions(&self) -> usize {
        self.shared.open_transactions.load(Ordering::SeqCst)
    }
}

fn remove_key(entries: &mut Table, key: &[u8]) {
    let stale: Vec<Entry> = entries
        .range((key.to_vec(), Vec::new())..)
        .take_while(|(entry_key, _)| entry_key == key)
        .cloned()
        .collect();

    for entry in stale {
        entries.remove(&entry);
    }
}

#[async_trait]
impl KvBackend for MemoryDatabase {
    type Stream = MemoryStream;

    async fn connect(&self) -> Result<(u64, Self::Stream), KvError> {
        if self.shared.disconnected.load(Ordering::SeqCst) {
            return Err(KvError::ConnectionClosed);
        }

        let id = self.shared.next_transaction_id.fetch_add(1, Ordering::SeqCst);
        self.shared.open_transactions.fetch_add(1, Ordering::SeqCst);

        let stream = MemoryStream {
            shared: Arc::clone(&self.shared),
            cursors: HashMap::new(),
            next_cursor: 1,
        };
        Ok((id, stream))
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn begin(&self) -> Result<Arc<dyn Transaction>, KvError> {
        let (id, stream) = self.connect().await?;
        Ok(Arc::new(RemoteTransaction::new(id, stream)))
    }
}

#[derive(Debug)]
struct Cursor {
    table: String,
    position: Option<Entry>,
}

/// Server side of a single transaction on a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryStream {
    shared: Arc<Shared>,
    cursors: HashMap<u32, Cursor>,
    next_cursor: u32,
}

impl MemoryStream {
    fn serve(&mut self, request: CursorRequest) -> Result<Pair, KvError> {
        match request.op {
            CursorOp::Open => {
                let cursor_id = self.next_cursor;
                self.next_cursor += 1;
                self.cursors.insert(
                    cursor_id,
                    Cursor {
                        table: request.table,
                        position: None,
                    },
                );

                Ok(Pair {
                    cursor_id,
                    ..Pair::default()
                })
            }
            CursorOp::Close => {
                self.cursors.remove(&request.cursor);
                Ok(Pair::default())
            }
            CursorOp::CloseTransaction => {
                self.shared.open_transactions.fetch_sub(1, Ordering::SeqCst);
                Ok(Pair::default())
            }
            CursorOp::Seek | CursorOp::SeekExact | CursorOp::SeekBoth | CursorOp::Next => {
                let tables = self.shared.tables.read();
                let cursor = self.cursors.get_mut(&request.cursor).ok_or_else(|| {
                    KvError::MalformedResponse(format!("unknown cursor {}", request.cursor))
                })?;

                let empty = Table::new();
                let entries = tables.get(&cursor.table).unwrap_or(&empty);

                let key = request.key.to_vec();
                let found = match request.op {
                    CursorOp::Seek => entries.range((key, Vec::new())..).next(),
                    CursorOp::SeekExact => entries
                        .range((key.clone(), Vec::new())..)
                        .next()
                        .filter(|(entry_key, _)| *entry_key == key),
                    CursorOp::SeekBoth => entries
                        .range((key.clone(), request.value.to_vec())..)
                        .next()
                        .filter(|(entry_key, _)| *entry_key == key),
                    _ => match &cursor.position {
                        Some(position) => entries
                            .range((Bound::Excluded(position.clone()), Bound::Unbounded))
                            .next(),
                        None => None,
                    },
                };

                cursor.position = found.cloned();
                Ok(found.map_or_else(Pair::default, |(key, value)| Pair {
                    key: Bytes::copy_from_slice(key),
                    value: Bytes::copy_from_slice(value),
                    cursor_id: request.cursor,
                }))
            }
        }
    }
}

#[async_trait]
impl CursorStream for MemoryStream {
    async fn send(&mut self, request: CursorRequest) -> Result<Pair, KvError> {
        if self.shared.disconnected.load(Ordering::SeqCst) {
            return Err(KvError::ConnectionClosed);
        }

        self.serve(request)
    }
}
