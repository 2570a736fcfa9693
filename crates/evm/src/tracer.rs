//! Instrumentation hooks observing EVM execution.

use std::sync::Arc;

use parking_lot::Mutex;
use retrace_primitives::{Address, Bytes, SpecId, U256};
use retrace_state_api::{EvmState, StateError};
use revm::{
    Inspector,
    context_interface::{ContextTr, CreateScheme},
    interpreter::{
        CallInputs, CallOutcome, CallScheme, CreateInputs, CreateOutcome, Interpreter,
        InterpreterResult,
        interpreter_types::{InputsTr as _, Jumps as _},
    },
};
use revm_database_interface::DatabaseRef;

use crate::StatusCode;

/// Kind of an EVM message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// CALL or a transaction's message call
    Call,
    /// CALLCODE
    CallCode,
    /// DELEGATECALL
    DelegateCall,
    /// STATICCALL
    StaticCall,
    /// CREATE or a contract creation transaction
    Create,
    /// CREATE2
    Create2,
}

impl MessageKind {
    /// Whether the message deploys a contract.
    pub fn is_create(self) -> bool {
        matches!(self, Self::Create | Self::Create2)
    }
}

/// A message passed to a new execution frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Kind of message
    pub kind: MessageKind,
    /// Depth of the frame; zero for the transaction's message
    pub depth: usize,
    /// Sender of the message
    pub caller: Address,
    /// Account whose storage the frame operates on. Zero for creations,
    /// whose address is only known once they finish.
    pub recipient: Address,
    /// Account whose code is executed
    pub code_address: Address,
    /// Transferred or apparent value
    pub value: U256,
    /// Call data or init code
    pub input: Bytes,
    /// Gas available to the frame
    pub gas: u64,
}

/// Result of an execution frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageResult {
    /// Status of the frame
    pub status: StatusCode,
    /// Gas consumed by the frame
    pub gas_used: u64,
    /// Return data, revert data or deployed code
    pub output: Bytes,
    /// Address of the created contract
    pub created_address: Option<Address>,
}

impl MessageResult {
    fn new(result: &InterpreterResult, created_address: Option<Address>) -> Self {
        Self {
            status: StatusCode::from(result.result),
            gas_used: result.gas.spent(),
            output: result.output.clone(),
            created_address,
        }
    }
}

/// The interpreter state before an instruction executes.
#[derive(Debug)]
pub struct Step<'stack> {
    /// Program counter
    pub pc: usize,
    /// Opcode about to execute
    pub opcode: u8,
    /// Stack, with its top as the last element
    pub stack: &'stack [U256],
    /// Depth of the executing frame
    pub depth: usize,
    /// Account whose storage the frame operates on
    pub recipient: Address,
}

impl Step<'_> {
    /// Returns the stack item `index` positions below the top.
    pub fn peek(&self, index: usize) -> Option<&U256> {
        let position = self.stack.len().checked_sub(index.checked_add(1)?)?;
        self.stack.get(position)
    }
}

/// Observer of EVM execution.
///
/// Every hook has an empty default so tracers only implement what they need.
pub trait Tracer: Send {
    /// A new frame starts executing `message`.
    fn on_execution_start(&mut self, _revision: SpecId, _message: &Message) {}

    /// An instruction is about to execute.
    fn on_instruction_start(&mut self, _step: &Step<'_>) {}

    /// The innermost running frame finished.
    fn on_execution_end(&mut self, _result: &MessageResult) {}

    /// A contract self-destructed, sending its balance to `beneficiary`.
    fn on_self_destruct(&mut self, _address: Address, _beneficiary: Address, _value: U256) {}

    /// The transaction finished. `pre_state` reads the state before the
    /// transaction; `post_state` holds every account it touched.
    ///
    /// A failed read of `pre_state` aborts the execution.
    fn on_transaction_end(
        &mut self,
        _post_state: &EvmState,
        _pre_state: &dyn DatabaseRef<Error = StateError>,
    ) -> Result<(), StateError> {
        Ok(())
    }

    /// Discards everything recorded so far.
    fn reset(&mut self) {}
}

/// A tracer shared between the replay and the execution.
pub type SharedTracer = Arc<Mutex<dyn Tracer>>;

/// Inspector forwarding revm events to a set of [`Tracer`]s.
pub struct TracerHost {
    tracers: Vec<SharedTracer>,
    revision: SpecId,
    depth: usize,
}

impl TracerHost {
    /// Constructs a host notifying `tracers`.
    pub fn new(tracers: Vec<SharedTracer>, revision: SpecId) -> Self {
        Self {
            tracers,
            revision,
            depth: 0,
        }
    }

    /// Notifies every tracer that the transaction finished, stopping at the
    /// first one that fails.
    pub fn finish(
        &self,
        post_state: &EvmState,
        pre_state: &dyn DatabaseRef<Error = StateError>,
    ) -> Result<(), StateError> {
        for tracer in &self.tracers {
            tracer.lock().on_transaction_end(post_state, pre_state)?;
        }
        Ok(())
    }

    fn start(&mut self, message: Message) {
        for tracer in &self.tracers {
            tracer.lock().on_execution_start(self.revision, &message);
        }
        self.depth += 1;
    }

    fn end(&mut self, result: MessageResult) {
        self.depth = self.depth.saturating_sub(1);
        for tracer in &self.tracers {
            tracer.lock().on_execution_end(&result);
        }
    }
}

impl std::fmt::Debug for TracerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracerHost")
            .field("tracers", &self.tracers.len())
            .field("revision", &self.revision)
            .field("depth", &self.depth)
            .finish()
    }
}

impl<ContextT: ContextTr> Inspector<ContextT> for TracerHost {
    fn step(&mut self, interp: &mut Interpreter, _context: &mut ContextT) {
        if self.tracers.is_empty() {
            return;
        }

        let step = Step {
            pc: interp.bytecode.pc(),
            opcode: interp.bytecode.opcode(),
            stack: interp.stack.data(),
            depth: self.depth.saturating_sub(1),
            recipient: interp.input.target_address(),
        };

        for tracer in &self.tracers {
            tracer.lock().on_instruction_start(&step);
        }
    }

    fn call(&mut self, context: &mut ContextT, inputs: &mut CallInputs) -> Option<CallOutcome> {
        let kind = match inputs.scheme {
            CallScheme::CallCode => MessageKind::CallCode,
            CallScheme::DelegateCall => MessageKind::DelegateCall,
            CallScheme::StaticCall => MessageKind::StaticCall,
            _ => MessageKind::Call,
        };

        self.start(Message {
            kind,
            depth: self.depth,
            caller: inputs.caller,
            recipient: inputs.target_address,
            code_address: inputs.bytecode_address,
            value: inputs.value.get(),
            input: inputs.input.bytes(context),
            gas: inputs.gas_limit,
        });

        None
    }

    fn call_end(&mut self, _context: &mut ContextT, _inputs: &CallInputs, outcome: &mut CallOutcome) {
        self.end(MessageResult::new(&outcome.result, None));
    }

    fn create(
        &mut self,
        _context: &mut ContextT,
        inputs: &mut CreateInputs,
    ) -> Option<CreateOutcome> {
        let kind = match inputs.scheme {
            CreateScheme::Create2 { .. } => MessageKind::Create2,
            _ => MessageKind::Create,
        };

        self.start(Message {
            kind,
            depth: self.depth,
            caller: inputs.caller,
            recipient: Address::ZERO,
            code_address: Address::ZERO,
            value: inputs.value,
            input: inputs.init_code.clone(),
            gas: inputs.gas_limit,
        });

        None
    }

    fn create_end(
        &mut self,
        _context: &mut ContextT,
        _inputs: &CreateInputs,
        outcome: &mut CreateOutcome,
    ) {
        self.end(MessageResult::new(&outcome.result, outcome.address));
    }

    fn selfdestruct(&mut self, contract: Address, target: Address, value: U256) {
        for tracer in &self.tracers {
            tracer.lock().on_self_destruct(contract, target, value);
        }
    }
}
