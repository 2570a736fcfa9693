use std::sync::Arc;

use retrace_block::Header;
use retrace_chain_config::ChainConfig;
use retrace_primitives::{Address, Bytes, Log, SpecId};
use retrace_state_api::{EvmState, StateError};
use retrace_transaction::Transaction;
use revm::{
    Context, Database as _, DatabaseCommit as _, InspectEvm as _, MainBuilder as _,
    MainContext as _,
    context::{
        BlockEnv, CfgEnv, TxEnv,
        result::{EVMError, ExecutionResult as EvmExecutionResult, Output},
    },
    database::CacheDB,
};
use revm_database_interface::DatabaseRef;

use crate::{
    StatusCode, env, get_error_message,
    precheck::{PreCheckError, pre_check},
    tracer::{SharedTracer, TracerHost},
};

/// Errors that abort an execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Reading state failed
    #[error(transparent)]
    State(#[from] StateError),
    /// The EVM failed for a reason unrelated to the transaction
    #[error("{0}")]
    Evm(String),
    /// The blocking task running the EVM didn't complete
    #[error("execution task failed: {0}")]
    Join(String),
    /// A previous execution was lost; the executor must be reset
    #[error("executor state is unavailable")]
    StateUnavailable,
}

/// Result of executing a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The transaction succeeded
    Success {
        /// Gas used
        gas_used: u64,
        /// Return data, or the deployed code of a creation
        output: Bytes,
        /// Emitted logs
        logs: Vec<Log>,
        /// Address of the created contract
        created_address: Option<Address>,
    },
    /// The transaction was rejected without being executed
    PreCheckFailed(PreCheckError),
    /// The transaction reverted or halted
    Failed {
        /// Status of the execution
        status: StatusCode,
        /// Gas used
        gas_used: u64,
        /// Revert data
        output: Bytes,
        /// Error message, including a decoded revert reason
        message: String,
    },
}

impl ExecutionResult {
    /// Whether the transaction executed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Gas used; zero when the transaction wasn't executed.
    pub fn gas_used(&self) -> u64 {
        match self {
            Self::Success { gas_used, .. } | Self::Failed { gas_used, .. } => *gas_used,
            Self::PreCheckFailed(_) => 0,
        }
    }

    /// Return or revert data.
    pub fn output(&self) -> Bytes {
        match self {
            Self::Success { output, .. } | Self::Failed { output, .. } => output.clone(),
            Self::PreCheckFailed(_) => Bytes::new(),
        }
    }
}

/// Executes transactions on top of a historical state, layering the changes
/// of committed transactions.
pub struct EvmExecutor<StateT: DatabaseRef> {
    chain_config: Arc<ChainConfig>,
    state: StateT,
    database: Option<CacheDB<StateT>>,
    pending: Option<EvmState>,
}

impl<StateT> EvmExecutor<StateT>
where
    StateT: DatabaseRef<Error = StateError> + Clone + Send + Sync + 'static,
{
    /// Constructs an executor reading `state`.
    pub fn new(chain_config: Arc<ChainConfig>, state: StateT) -> Self {
        Self {
            chain_config,
            database: Some(CacheDB::new(state.clone())),
            state,
            pending: None,
        }
    }

    /// Chain configuration used to pick revisions.
    pub fn chain_config(&self) -> &ChainConfig {
        &self.chain_config
    }

    /// Executes `transaction` in the context of the block with `header`,
    /// notifying `tracers`.
    ///
    /// The resulting state changes are kept aside until [`Self::commit`] is
    /// called; the next call discards them otherwise. With `refund` unset the
    /// reported gas excludes the refund. With `gas_bailout` set the sender's
    /// balance isn't checked.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn call(
        &mut self,
        header: &Header,
        transaction: &Transaction,
        tracers: &[SharedTracer],
        refund: bool,
        gas_bailout: bool,
    ) -> Result<ExecutionResult, ExecutorError> {
        let revision = self.chain_config.revision(header.number, header.timestamp);
        let execution = Execution {
            block: env::block_env(header, revision),
            cfg: env::cfg_env(&self.chain_config, revision, gas_bailout),
            tx: env::tx_env(transaction, self.chain_config.chain_id)?,
            transaction: transaction.clone(),
            base_fee: header.base_fee_per_gas,
            revision,
            tracers: tracers.to_vec(),
            refund,
            gas_bailout,
        };

        self.pending = None;
        let mut database = self.database.take().ok_or(ExecutorError::StateUnavailable)?;

        let (database, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = execution.run(&mut database);
            (database, outcome)
        })
        .await
        .map_err(|error| ExecutorError::Join(error.to_string()))?;

        self.database = Some(database);

        let (result, state) = outcome?;
        self.pending = state;
        Ok(result)
    }

    /// Applies the state changes of the last call to subsequent calls.
    pub fn commit(&mut self) {
        if let (Some(database), Some(state)) = (self.database.as_mut(), self.pending.take()) {
            database.commit(state);
        }
    }

    /// Discards all committed changes.
    pub fn reset(&mut self) {
        self.database = Some(CacheDB::new(self.state.clone()));
        self.pending = None;
    }
}

impl<StateT: DatabaseRef> std::fmt::Debug for EvmExecutor<StateT> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmExecutor")
            .field("chain_id", &self.chain_config.chain_id)
            .field("pending", &self.pending.is_some())
            .finish_non_exhaustive()
    }
}

struct Execution {
    block: BlockEnv,
    cfg: CfgEnv,
    tx: TxEnv,
    transaction: Transaction,
    base_fee: Option<u64>,
    revision: SpecId,
    tracers: Vec<SharedTracer>,
    refund: bool,
    gas_bailout: bool,
}

impl Execution {
    fn run<StateT>(
        self,
        database: &mut CacheDB<StateT>,
    ) -> Result<(ExecutionResult, Option<EvmState>), ExecutorError>
    where
        StateT: DatabaseRef<Error = StateError>,
    {
        let balance = if self.gas_bailout {
            None
        } else {
            let sender = self.transaction.from.unwrap_or_default();
            Some(
                database
                    .basic(sender)?
                    .map(|account| account.balance)
                    .unwrap_or_default(),
            )
        };

        if let Err(error) = pre_check(&self.transaction, self.base_fee, self.revision, balance) {
            log::debug!("transaction {} failed pre-check: {error}", self.transaction.hash);
            return Ok((ExecutionResult::PreCheckFailed(error), None));
        }

        let mut host = TracerHost::new(self.tracers, self.revision);
        let outcome = Context::mainnet()
            .with_db(&mut *database)
            .with_block(self.block)
            .with_cfg(self.cfg)
            .build_mainnet_with_inspector(&mut host)
            .inspect_tx(self.tx);

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(EVMError::Database(error)) => return Err(error.into()),
            Err(EVMError::Transaction(error)) => {
                let error = PreCheckError::Rejected(error.to_string());
                return Ok((ExecutionResult::PreCheckFailed(error), None));
            }
            Err(EVMError::Header(error)) => {
                let error = PreCheckError::Rejected(error.to_string());
                return Ok((ExecutionResult::PreCheckFailed(error), None));
            }
            Err(error) => return Err(ExecutorError::Evm(error.to_string())),
        };

        host.finish(&outcome.state, &*database)?;

        let result = match outcome.result {
            EvmExecutionResult::Success {
                gas_used,
                gas_refunded,
                logs,
                output,
                ..
            } => {
                let (output, created_address) = match output {
                    Output::Call(output) => (output, None),
                    Output::Create(output, address) => (output, address),
                };
                ExecutionResult::Success {
                    gas_used: if self.refund {
                        gas_used
                    } else {
                        gas_used.saturating_add(gas_refunded)
                    },
                    output,
                    logs,
                    created_address,
                }
            }
            EvmExecutionResult::Revert { gas_used, output } => ExecutionResult::Failed {
                status: StatusCode::Revert,
                gas_used,
                message: get_error_message(StatusCode::Revert, &output, true),
                output,
            },
            EvmExecutionResult::Halt { reason, gas_used } => {
                let status = StatusCode::from(&reason);
                ExecutionResult::Failed {
                    status,
                    gas_used,
                    output: Bytes::new(),
                    message: get_error_message(status, &[], true),
                }
            }
        };

        Ok((result, Some(outcome.state)))
    }
}
