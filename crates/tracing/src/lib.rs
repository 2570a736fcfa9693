//! Tracers recording access lists, call trees and state changes of replayed
//! transactions.
#![warn(missing_docs)]

mod access_list;
mod call;
/// Opcode classification
pub mod opcodes;
mod state_diff;
/// Call trace types
pub mod trace;

pub use self::{
    access_list::{AccessListTracer, compare},
    call::CallTracer,
    state_diff::{AccountDiff, Delta, StateDiff, StateDiffTracer},
    trace::{Action, Trace, TraceOutput, TraceType},
};
