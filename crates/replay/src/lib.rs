//! Replay of historical transactions and the typed `trace` namespace built on
//! top of it.
//!
//! A [`TraceCallExecutor`] rebuilds the state at a block boundary, replays
//! transactions through the EVM and collects the output of the requested
//! tracers. [`TraceRpcApi`] scopes every request to a read transaction,
//! shares the block and head-state caches across requests and maps failures
//! to JSON-RPC error objects.
#![warn(missing_docs)]

mod api;
mod block_cache;
/// Configuration
pub mod config;
mod error;
mod executor;
/// Incremental output
pub mod stream;
/// Parameters and results
pub mod types;

pub use self::{
    api::{INTERNAL_ERROR_CODE, INVALID_PARAMS_CODE, JsonRpcError, SERVER_ERROR_CODE, TraceRpcApi},
    block_cache::{BlockCache, TransactionWithBlock, resolve_block_number},
    config::Config,
    error::ReplayError,
    executor::TraceCallExecutor,
    stream::{JsonArrayWriter, Stream, StreamError, VecStream},
};
