//! Execution of transactions against historical state.
//!
//! An [`EvmExecutor`] runs one transaction at a time on the blocking worker
//! pool. Transactions are validated by [`precheck::pre_check`] before they
//! reach the EVM, and every execution can be observed by a set of
//! [`Tracer`]s.
#![warn(missing_docs)]

mod env;
mod executor;
/// Validation of transactions before execution
pub mod precheck;
mod status;
/// Instrumentation hooks
pub mod tracer;

pub use self::{
    env::{block_env, cfg_env, tx_env},
    executor::{EvmExecutor, ExecutionResult, ExecutorError},
    precheck::{PRE_CHECK_ERROR_CODE, PreCheckError},
    status::{StatusCode, decode_revert_reason, get_error_message},
    tracer::{Message, MessageKind, MessageResult, SharedTracer, Step, Tracer, TracerHost},
};
