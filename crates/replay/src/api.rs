use std::sync::Arc;

use retrace_block::{BlockNumberOrHash, BlockWithHash};
use retrace_kv::{Database, Transaction as KvTransaction, with_transaction};
use retrace_primitives::{B256, U256};
use retrace_state_cache::HeadStateCache;
use retrace_transaction::{Call, Transaction};
use tokio::runtime;

use crate::{
    BlockCache, Config, ReplayError, TraceCallExecutor,
    stream::Stream,
    types::{
        LocalizedTrace, TraceCall, TraceCallResultWithHash, TraceCallTraces, TraceConfig,
        TraceFilter,
    },
};

/// Code of errors that aren't the caller's fault.
pub const INTERNAL_ERROR_CODE: i64 = 100;
/// Code of transactions that cannot be traced.
pub const SERVER_ERROR_CODE: i64 = -32000;
/// Code of parameters that cannot be decoded.
pub const INVALID_PARAMS_CODE: i64 = -32602;

/// A JSON-RPC error object.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, thiserror::Error)]
#[error("{message} ({code})")]
pub struct JsonRpcError {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
}

impl JsonRpcError {
    /// Constructs an error with the provided code.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn internal(error: &ReplayError) -> Self {
        log::error!("exception processing request: {error}");
        Self::new(INTERNAL_ERROR_CODE, error.to_string())
    }

    fn server(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("{message}");
        Self::new(SERVER_ERROR_CODE, message)
    }
}

/// Typed entry points of the `trace` namespace.
///
/// Every method runs inside its own read transaction, which is closed before
/// the method returns.
pub struct TraceRpcApi {
    runtime: runtime::Handle,
    database: Arc<dyn Database>,
    block_cache: Arc<BlockCache>,
    state_cache: Arc<HeadStateCache>,
    config: Config,
}

impl std::fmt::Debug for TraceRpcApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceRpcApi")
            .field("block_cache", &self.block_cache)
            .field("state_cache", &self.state_cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TraceRpcApi {
    /// Constructs an API serving `database`. EVM execution drives remote reads
    /// on `runtime`, which must be multi-threaded.
    pub fn new(runtime: runtime::Handle, database: Arc<dyn Database>, config: Config) -> Self {
        Self {
            runtime,
            database,
            block_cache: Arc::new(BlockCache::new(config.block_cache_capacity)),
            state_cache: Arc::new(HeadStateCache::new(config.state_cache_capacity)),
            config,
        }
    }

    /// Cache of recently read blocks.
    pub fn block_cache(&self) -> &BlockCache {
        &self.block_cache
    }

    /// Cache of plain-state values at the head block.
    pub fn state_cache(&self) -> &HeadStateCache {
        &self.state_cache
    }

    /// `trace_call`: traces a call on top of the state after `block`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_call(
        &self,
        call: Call,
        config: TraceConfig,
        block: BlockNumberOrHash,
    ) -> Result<TraceCallTraces, JsonRpcError> {
        log::info!("trace_call block_number_or_hash: {block} config: {config:?}");

        let result = with_transaction(self.database.as_ref(), |tx| async move {
            let (executor, block) = self.executor_at(tx, block).await?;
            executor.trace_call(&block, &call, &config).await
        })
        .await
        .map_err(|error| JsonRpcError::internal(&error))?;

        match result.pre_check_error {
            Some(error) => Err(JsonRpcError::server(error)),
            None => Ok(result.traces),
        }
    }

    /// `trace_callMany`: traces a sequence of calls on top of the state after
    /// `block`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_call_many(
        &self,
        calls: Vec<TraceCall>,
        block: BlockNumberOrHash,
    ) -> Result<Vec<TraceCallTraces>, JsonRpcError> {
        log::info!(
            "trace_callMany #trace_calls: {} block_number_or_hash: {block}",
            calls.len()
        );

        let result = with_transaction(self.database.as_ref(), |tx| async move {
            let (executor, block) = self.executor_at(tx, block).await?;
            executor.trace_calls(&block, &calls).await
        })
        .await
        .map_err(|error| JsonRpcError::internal(&error))?;

        match result.pre_check_error {
            Some(error) => Err(JsonRpcError::server(error)),
            None => Ok(result.traces),
        }
    }

    /// `trace_rawTransaction`: traces a signed transaction on top of the
    /// state after the latest block.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_raw_transaction(
        &self,
        encoded: &str,
        config: TraceConfig,
    ) -> Result<TraceCallTraces, JsonRpcError> {
        let transaction = self.decode_raw_transaction(encoded)?;
        log::info!("trace_rawTransaction transaction: {} config: {config:?}", transaction.hash);

        let result = with_transaction(self.database.as_ref(), |tx| async move {
            let latest = retrace_rawdb::read_latest_block_number(tx.as_ref()).await?;
            let block = self
                .block_cache
                .read_block_by_number(tx.as_ref(), latest)
                .await?;

            self.executor(tx)
                .await?
                .trace_transaction_with_config(&block, &transaction, &config)
                .await
        })
        .await
        .map_err(|error| JsonRpcError::internal(&error))?;

        match result.pre_check_error {
            Some(error) => Err(JsonRpcError::server(error)),
            None => Ok(result.traces),
        }
    }

    /// `trace_replayBlockTransactions`: traces every transaction of `block`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_replay_block_transactions(
        &self,
        block: BlockNumberOrHash,
        config: TraceConfig,
    ) -> Result<Vec<TraceCallResultWithHash>, JsonRpcError> {
        log::info!("trace_replayBlockTransactions block_number_or_hash: {block} config: {config:?}");

        with_transaction(self.database.as_ref(), |tx| async move {
            let block = self.block_cache.read_block(tx.as_ref(), block).await?;
            self.executor(tx)
                .await?
                .trace_block_transactions(&block, &config)
                .await
        })
        .await
        .map_err(|error| JsonRpcError::internal(&error))
    }

    /// `trace_replayTransaction`: traces a canonical transaction after
    /// replaying its predecessors within the block.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_replay_transaction(
        &self,
        transaction_hash: B256,
        config: TraceConfig,
    ) -> Result<TraceCallTraces, JsonRpcError> {
        log::info!("trace_replayTransaction transaction_hash: {transaction_hash} config: {config:?}");

        let result = with_transaction(self.database.as_ref(), |tx| async move {
            let found = self
                .block_cache
                .read_transaction_by_hash(tx.as_ref(), &transaction_hash)
                .await?
                .ok_or(ReplayError::TransactionNotFound(transaction_hash))?;

            self.executor(tx)
                .await?
                .trace_transaction_with_config(&found.block, &found.transaction, &config)
                .await
        })
        .await;

        match result {
            Ok(result) => match result.pre_check_error {
                Some(error) => Err(JsonRpcError::server(error)),
                None => Ok(result.traces),
            },
            Err(error @ ReplayError::TransactionNotFound(_)) => {
                Err(JsonRpcError::server(error.to_string()))
            }
            Err(error) => Err(JsonRpcError::internal(&error)),
        }
    }

    /// `trace_block`: returns the call traces of all transactions of `block`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_block(
        &self,
        block: BlockNumberOrHash,
    ) -> Result<Vec<LocalizedTrace>, JsonRpcError> {
        log::info!("trace_block block_number_or_hash: {block}");

        with_transaction(self.database.as_ref(), |tx| async move {
            let block = self.block_cache.read_block(tx.as_ref(), block).await?;
            self.executor(tx).await?.trace_block(&block).await
        })
        .await
        .map_err(|error| JsonRpcError::internal(&error))
    }

    /// `trace_filter`: writes the traces matching `filter` to `stream`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_filter(
        &self,
        filter: TraceFilter,
        stream: &mut dyn Stream,
    ) -> Result<(), JsonRpcError> {
        log::info!("trace_filter {filter}");

        with_transaction(self.database.as_ref(), |tx| async move {
            self.executor(tx)
                .await?
                .with_block_range_limit(self.config.trace_filter_block_range)
                .trace_filter(&filter, stream)
                .await
        })
        .await
        .map_err(|error| JsonRpcError::internal(&error))
    }

    /// `trace_get`: returns the trace at a position of a transaction's call
    /// tree.
    ///
    /// Only a single hex-encoded index is supported; anything else, as well as
    /// any failure, yields `None`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_get(
        &self,
        transaction_hash: B256,
        indices: &[String],
    ) -> Result<Option<LocalizedTrace>, JsonRpcError> {
        log::info!("trace_get transaction_hash: {transaction_hash} #indices: {}", indices.len());

        let [index] = indices else {
            return Ok(None);
        };
        let Ok(index) = usize::from_str_radix(index.trim_start_matches("0x"), 16) else {
            return Ok(None);
        };

        let traces = self.localized_traces(transaction_hash).await;
        Ok(traces.and_then(|traces| traces.into_iter().nth(index.saturating_add(1))))
    }

    /// `trace_transaction`: returns the call traces of a canonical
    /// transaction, or `None` if it cannot be traced.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_transaction(
        &self,
        transaction_hash: B256,
    ) -> Result<Option<Vec<LocalizedTrace>>, JsonRpcError> {
        log::info!("trace_transaction transaction_hash: {transaction_hash}");

        Ok(self.localized_traces(transaction_hash).await)
    }

    async fn localized_traces(&self, transaction_hash: B256) -> Option<Vec<LocalizedTrace>> {
        let result = with_transaction(self.database.as_ref(), |tx| async move {
            let Some(found) = self
                .block_cache
                .read_transaction_by_hash(tx.as_ref(), &transaction_hash)
                .await?
            else {
                return Ok(None);
            };

            self.executor(tx)
                .await?
                .trace_transaction(&found.block, &found.transaction)
                .await
                .map(Some)
        })
        .await;

        result.unwrap_or_else(|error| {
            log::debug!("cannot trace transaction {transaction_hash}: {error}");
            None
        })
    }

    fn decode_raw_transaction(&self, encoded: &str) -> Result<Transaction, JsonRpcError> {
        let raw = hex::decode(encoded).map_err(|_error| {
            let message = format!("invalid trace_rawTransaction encoded tx: {encoded}");
            log::error!("{message}");
            JsonRpcError::new(INVALID_PARAMS_CODE, message)
        })?;

        let mut transaction =
            Transaction::decode(&raw).map_err(|error| JsonRpcError::server(error.to_string()))?;

        let fee = U256::from(transaction.gas_limit)
            .saturating_mul(U256::from(transaction.max_fee_per_gas));
        if fee > U256::from(self.config.raw_transaction_fee_cap) {
            return Err(JsonRpcError::server("tx fee exceeds the configured cap"));
        }

        if !transaction.is_replay_protected() {
            return Err(JsonRpcError::server(
                "only replay-protected (EIP-155) transactions allowed over RPC",
            ));
        }

        transaction
            .recover_sender()
            .map_err(|_error| JsonRpcError::server("cannot recover sender"))?;

        Ok(transaction)
    }

    /// Resolves `block` and prepares an executor for it. Requests targeting
    /// the head block read state through the head-block cache.
    async fn executor_at(
        &self,
        tx: Arc<dyn KvTransaction>,
        block: BlockNumberOrHash,
    ) -> Result<(TraceCallExecutor<'_>, Arc<BlockWithHash>), ReplayError> {
        let block = self.block_cache.read_block(tx.as_ref(), block).await?;

        let latest = retrace_rawdb::read_latest_block_number(tx.as_ref()).await?;
        let tx = if block.number() == latest {
            self.state_cache.wrap(tx, latest, block.hash)
        } else {
            tx
        };

        Ok((self.executor(tx).await?, block))
    }

    async fn executor(
        &self,
        tx: Arc<dyn KvTransaction>,
    ) -> Result<TraceCallExecutor<'_>, ReplayError> {
        let chain_config = retrace_rawdb::read_chain_config(tx.as_ref()).await?;
        Ok(TraceCallExecutor::new(
            self.runtime.clone(),
            tx,
            &self.block_cache,
            Arc::new(chain_config),
        ))
    }
}
