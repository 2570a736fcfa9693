use std::sync::Arc;

use parking_lot::Mutex;
use retrace_block::{BlockWithHash, Header};
use retrace_chain_config::ChainConfig;
use retrace_evm::{EvmExecutor, ExecutionResult, SharedTracer};
use retrace_kv::Transaction as KvTransaction;
use retrace_primitives::B256;
use retrace_state_remote::{CachedRemoteState, RemoteState, StateReader};
use retrace_tracing::{CallTracer, StateDiffTracer, Trace};
use retrace_transaction::{Call, Transaction};
use tokio::runtime;

use crate::{
    BlockCache, ReplayError,
    block_cache::resolve_block_number,
    stream::{Stream, StreamError},
    types::{
        LocalizedTrace, TraceCall, TraceCallResult, TraceCallResultWithHash, TraceCallTraces,
        TraceConfig, TraceFilter, TraceManyCallResult,
    },
};

type StateExecutor = EvmExecutor<Arc<CachedRemoteState>>;

/// The tracers requested by a [`TraceConfig`].
struct Tracers {
    call: Option<Arc<Mutex<CallTracer>>>,
    state_diff: Option<Arc<Mutex<StateDiffTracer>>>,
}

impl Tracers {
    fn new(config: &TraceConfig) -> Self {
        Self {
            call: config
                .trace
                .then(|| Arc::new(Mutex::new(CallTracer::default()))),
            state_diff: config
                .state_diff
                .then(|| Arc::new(Mutex::new(StateDiffTracer::default()))),
        }
    }

    fn shared(&self) -> Vec<SharedTracer> {
        let mut tracers = Vec::with_capacity(2);
        if let Some(call) = &self.call {
            let tracer: SharedTracer = call.clone();
            tracers.push(tracer);
        }
        if let Some(state_diff) = &self.state_diff {
            let tracer: SharedTracer = state_diff.clone();
            tracers.push(tracer);
        }
        tracers
    }

    fn collect(self, result: &ExecutionResult) -> TraceCallTraces {
        TraceCallTraces {
            output: result.output(),
            state_diff: self
                .state_diff
                .map(|tracer| tracer.lock().take_state_diff()),
            trace: self
                .call
                .map(|tracer| tracer.lock().take_traces())
                .unwrap_or_default(),
            vm_trace: None,
        }
    }

    fn into_result(self, result: ExecutionResult) -> TraceCallResult {
        match result {
            ExecutionResult::PreCheckFailed(error) => TraceCallResult {
                traces: TraceCallTraces::default(),
                pre_check_error: Some(error.to_string()),
            },
            result => TraceCallResult {
                traces: self.collect(&result),
                pre_check_error: None,
            },
        }
    }
}

/// Replays calls, transactions and blocks inside one read transaction.
///
/// State is always read as of a block boundary: transactions of a block are
/// replayed on top of the state before the block, while calls run on top of
/// the state after it.
pub struct TraceCallExecutor<'cache> {
    tx: Arc<dyn KvTransaction>,
    block_cache: &'cache BlockCache,
    chain_config: Arc<ChainConfig>,
    runtime: runtime::Handle,
    block_range_limit: u64,
}

impl<'cache> TraceCallExecutor<'cache> {
    /// Constructs an executor reading chain data and state through `tx`.
    ///
    /// State reads block on `runtime`, which must be multi-threaded.
    pub fn new(
        runtime: runtime::Handle,
        tx: Arc<dyn KvTransaction>,
        block_cache: &'cache BlockCache,
        chain_config: Arc<ChainConfig>,
    ) -> Self {
        Self {
            tx,
            block_cache,
            chain_config,
            runtime,
            block_range_limit: u64::MAX,
        }
    }

    /// Limits the number of blocks a single [`Self::trace_filter`] may span.
    pub fn with_block_range_limit(mut self, limit: u64) -> Self {
        self.block_range_limit = limit;
        self
    }

    /// Traces an ad-hoc call on top of the state after `block`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_call(
        &self,
        block: &BlockWithHash,
        call: &Call,
        config: &TraceConfig,
    ) -> Result<TraceCallResult, ReplayError> {
        log::debug!("trace_call block: {} config: {config:?}", block.number());

        let mut executor = self.state_executor(block.number().saturating_add(1));
        let tracers = Tracers::new(config);
        let result = executor
            .call(
                &block.block.header,
                &call.to_transaction(),
                &tracers.shared(),
                true,
                true,
            )
            .await?;

        Ok(tracers.into_result(result))
    }

    /// Traces a sequence of calls on top of the state after `block`. Every
    /// call observes the changes of the preceding ones unless they are
    /// isolated.
    ///
    /// Stops at the first call that fails its pre-check.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_calls(
        &self,
        block: &BlockWithHash,
        calls: &[TraceCall],
    ) -> Result<TraceManyCallResult, ReplayError> {
        log::debug!("trace_calls block: {} #calls: {}", block.number(), calls.len());

        let mut executor = self.state_executor(block.number().saturating_add(1));
        let mut traces = Vec::with_capacity(calls.len());
        for (index, call) in calls.iter().enumerate() {
            let tracers = Tracers::new(&call.config);
            let result = executor
                .call(
                    &block.block.header,
                    &call.call.to_transaction(),
                    &tracers.shared(),
                    true,
                    true,
                )
                .await?;

            if let ExecutionResult::PreCheckFailed(error) = &result {
                return Ok(TraceManyCallResult {
                    traces: Vec::new(),
                    pre_check_error: Some(format!("first run for txIndex {index} error: {error}")),
                });
            }

            if !call.isolated {
                executor.commit();
            }
            traces.push(tracers.collect(&result));
        }

        Ok(TraceManyCallResult {
            traces,
            pre_check_error: None,
        })
    }

    /// Traces `transaction` in the context of `block`.
    ///
    /// A transaction of the block is replayed after the transactions preceding
    /// it; any other transaction runs on top of the state after the block.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_transaction_with_config(
        &self,
        block: &BlockWithHash,
        transaction: &Transaction,
        config: &TraceConfig,
    ) -> Result<TraceCallResult, ReplayError> {
        let transaction = with_sender(transaction)?;
        let header = &block.block.header;
        let transactions = block.block.transactions();

        let mut executor = match position(transactions, &transaction.hash) {
            Some(index) => {
                let mut executor = self.state_executor(block.number());
                let preceding = transactions.get(..index).unwrap_or_default();
                replay(&mut executor, header, preceding).await?;
                executor
            }
            None => self.state_executor(block.number().saturating_add(1)),
        };

        let tracers = Tracers::new(config);
        let result = executor
            .call(header, &transaction, &tracers.shared(), true, false)
            .await?;

        Ok(tracers.into_result(result))
    }

    /// Traces every transaction of `block`, each on top of the changes of the
    /// preceding ones.
    ///
    /// A transaction failing its pre-check yields a result carrying the
    /// failure; its siblings are traced regardless.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_block_transactions(
        &self,
        block: &BlockWithHash,
        config: &TraceConfig,
    ) -> Result<Vec<TraceCallResultWithHash>, ReplayError> {
        let header = &block.block.header;
        let transactions = block.block.transactions();
        log::debug!(
            "trace_block_transactions block: {} #txns: {} config: {config:?}",
            block.number(),
            transactions.len()
        );

        let mut executor = self.state_executor(block.number());
        let mut results = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            let transaction = with_sender(transaction)?;
            let tracers = Tracers::new(config);
            let result = executor
                .call(header, &transaction, &tracers.shared(), true, false)
                .await?;

            let result = match result {
                ExecutionResult::PreCheckFailed(error) => TraceCallResultWithHash {
                    traces: TraceCallTraces::default(),
                    transaction_hash: transaction.hash,
                    pre_check_error: Some(error.to_string()),
                },
                result => {
                    executor.commit();
                    TraceCallResultWithHash {
                        traces: tracers.collect(&result),
                        transaction_hash: transaction.hash,
                        pre_check_error: None,
                    }
                }
            };
            results.push(result);
        }

        Ok(results)
    }

    /// Returns the call traces of a transaction of `block`, positioned within
    /// the chain.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_transaction(
        &self,
        block: &BlockWithHash,
        transaction: &Transaction,
    ) -> Result<Vec<LocalizedTrace>, ReplayError> {
        let position = position(block.block.transactions(), &transaction.hash)
            .ok_or(ReplayError::TransactionNotFound(transaction.hash))?;

        let result = self
            .trace_transaction_with_config(block, transaction, &TraceConfig::trace_only())
            .await?;
        if let Some(error) = result.pre_check_error {
            return Err(ReplayError::PreCheck(error));
        }

        Ok(localize(block, transaction.hash, position, result.traces.trace))
    }

    /// Returns the call traces of all transactions of `block`, positioned
    /// within the chain. Transactions failing their pre-check contribute no
    /// traces.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_block(
        &self,
        block: &BlockWithHash,
    ) -> Result<Vec<LocalizedTrace>, ReplayError> {
        let results = self
            .trace_block_transactions(block, &TraceConfig::trace_only())
            .await?;

        let mut traces = Vec::new();
        for (position, result) in results.into_iter().enumerate() {
            if let Some(error) = result.pre_check_error {
                log::debug!(
                    "no traces for transaction {} of block {}: {error}",
                    result.transaction_hash,
                    block.number()
                );
                continue;
            }

            traces.extend(localize(
                block,
                result.transaction_hash,
                position,
                result.traces.trace,
            ));
        }

        Ok(traces)
    }

    /// Writes the traces of a block range matching `filter` to `stream`, in
    /// chain order.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn trace_filter(
        &self,
        filter: &TraceFilter,
        stream: &mut dyn Stream,
    ) -> Result<(), ReplayError> {
        log::debug!("trace_filter {filter}");

        let from = match filter.from_block {
            Some(id) => resolve_block_number(self.tx.as_ref(), id).await?,
            None => 0,
        };
        let to = match filter.to_block {
            Some(id) => resolve_block_number(self.tx.as_ref(), id).await?,
            None => retrace_rawdb::read_latest_block_number(self.tx.as_ref()).await?,
        };

        if from > to {
            return Err(ReplayError::InvalidBlockRange { from, to });
        }
        let requested = (to - from).saturating_add(1);
        if requested > self.block_range_limit {
            return Err(ReplayError::BlockRangeTooLarge {
                requested,
                limit: self.block_range_limit,
            });
        }

        let mut skip = filter.after.unwrap_or(0);
        let mut remaining = filter.count.unwrap_or(u64::MAX);
        for number in from..=to {
            if remaining == 0 {
                break;
            }

            let block = self
                .block_cache
                .read_block_by_number(self.tx.as_ref(), number)
                .await?;
            if block.block.transactions().is_empty() {
                continue;
            }

            for trace in self.trace_block(&block).await? {
                if !filter.matches(&trace.trace) {
                    continue;
                }
                if skip > 0 {
                    skip -= 1;
                    continue;
                }

                let value = serde_json::to_value(&trace).map_err(StreamError::from)?;
                stream.write_json(&value)?;

                remaining -= 1;
                if remaining == 0 {
                    break;
                }
            }
        }

        stream.flush()?;
        Ok(())
    }

    fn state_executor(&self, block_number: u64) -> StateExecutor {
        let reader = StateReader::new(Arc::clone(&self.tx), block_number);
        let state = CachedRemoteState::new(RemoteState::new(self.runtime.clone(), reader));
        EvmExecutor::new(Arc::clone(&self.chain_config), Arc::new(state))
    }
}

impl std::fmt::Debug for TraceCallExecutor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceCallExecutor")
            .field("chain_id", &self.chain_config.chain_id)
            .field("block_range_limit", &self.block_range_limit)
            .finish_non_exhaustive()
    }
}

/// Executes `transactions` without tracers, committing their changes.
async fn replay(
    executor: &mut StateExecutor,
    header: &Header,
    transactions: &[Transaction],
) -> Result<(), ReplayError> {
    for transaction in transactions {
        let transaction = with_sender(transaction)?;
        match executor.call(header, &transaction, &[], true, false).await? {
            ExecutionResult::PreCheckFailed(error) => {
                log::warn!(
                    "replayed transaction {} of block {} rejected: {error}",
                    transaction.hash,
                    header.number
                );
            }
            _ => executor.commit(),
        }
    }
    Ok(())
}

fn position(transactions: &[Transaction], hash: &B256) -> Option<usize> {
    transactions
        .iter()
        .position(|transaction| transaction.hash == *hash)
}

fn with_sender(transaction: &Transaction) -> Result<Transaction, ReplayError> {
    let mut transaction = transaction.clone();
    transaction.recover_sender()?;
    Ok(transaction)
}

fn localize(
    block: &BlockWithHash,
    transaction_hash: B256,
    transaction_position: usize,
    traces: Vec<Trace>,
) -> Vec<LocalizedTrace> {
    traces
        .into_iter()
        .map(|trace| LocalizedTrace {
            trace,
            block_hash: block.hash,
            block_number: block.number(),
            transaction_hash,
            transaction_position,
        })
        .collect()
}
