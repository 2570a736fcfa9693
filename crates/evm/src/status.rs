use revm::{context::result::HaltReason, interpreter::InstructionResult};
use retrace_primitives::U256;

/// Outcome of an EVM message, following the EVMC status code numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusCode {
    /// Execution finished with success
    Success,
    /// Generic execution failure
    Failure,
    /// Execution terminated with the REVERT opcode
    Revert,
    /// Execution ran out of gas
    OutOfGas,
    /// The designated INVALID instruction was hit
    InvalidInstruction,
    /// An undefined instruction was encountered
    UndefinedInstruction,
    /// The stack exceeded its 1024 item limit
    StackOverflow,
    /// An instruction required more stack items than available
    StackUnderflow,
    /// A jump targeted an invalid destination
    BadJumpDestination,
    /// Memory was read outside of its bounds
    InvalidMemoryAccess,
    /// The call depth limit was exceeded
    CallDepthExceeded,
    /// A state modification was attempted in a static call
    StaticModeViolation,
    /// A precompiled contract failed
    PrecompileFailure,
    /// Deployed code failed validation
    ContractValidationFailure,
    /// An argument was outside of the supported range
    ArgumentOutOfRange,
    /// A WebAssembly `unreachable` instruction was hit
    WasmUnreachableInstruction,
    /// A WebAssembly trap occurred
    WasmTrap,
    /// The caller cannot afford the transferred value
    InsufficientBalance,
    /// The EVM failed internally
    InternalError,
    /// Execution was rejected before it started
    Rejected,
    /// The EVM ran out of memory
    OutOfMemory,
    /// A raw status code without a known meaning
    Unknown(i32),
}

impl StatusCode {
    /// Converts an EVMC status code.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::Failure,
            2 => Self::Revert,
            3 => Self::OutOfGas,
            4 => Self::InvalidInstruction,
            5 => Self::UndefinedInstruction,
            6 => Self::StackOverflow,
            7 => Self::StackUnderflow,
            8 => Self::BadJumpDestination,
            9 => Self::InvalidMemoryAccess,
            10 => Self::CallDepthExceeded,
            11 => Self::StaticModeViolation,
            12 => Self::PrecompileFailure,
            13 => Self::ContractValidationFailure,
            14 => Self::ArgumentOutOfRange,
            15 => Self::WasmUnreachableInstruction,
            16 => Self::WasmTrap,
            17 => Self::InsufficientBalance,
            -1 => Self::InternalError,
            -2 => Self::Rejected,
            -3 => Self::OutOfMemory,
            code => Self::Unknown(code),
        }
    }

    /// Whether the message succeeded.
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    fn message(self) -> &'static str {
        match self {
            Self::Success => "",
            Self::Failure => "execution failed",
            Self::Revert => "execution reverted",
            Self::OutOfGas => "out of gas",
            Self::InvalidInstruction => "invalid instruction",
            Self::UndefinedInstruction => "invalid opcode",
            Self::StackOverflow => "stack overflow",
            Self::StackUnderflow => "stack underflow",
            Self::BadJumpDestination => "invalid jump destination",
            Self::InvalidMemoryAccess => "invalid memory access",
            Self::CallDepthExceeded => "call depth exceeded",
            Self::StaticModeViolation => "static mode violation",
            Self::PrecompileFailure => "precompile failure",
            Self::ContractValidationFailure => "contract validation failure",
            Self::ArgumentOutOfRange => "argument out of range",
            Self::WasmUnreachableInstruction => "wasm unreachable instruction",
            Self::WasmTrap => "wasm trap",
            Self::InsufficientBalance => "insufficient balance",
            Self::InternalError => "internal error",
            Self::Rejected => "rejected",
            Self::OutOfMemory => "out of memory",
            Self::Unknown(_) => "unknown error code",
        }
    }
}

impl From<InstructionResult> for StatusCode {
    fn from(result: InstructionResult) -> Self {
        match result {
            InstructionResult::Stop | InstructionResult::Return | InstructionResult::SelfDestruct => {
                Self::Success
            }
            InstructionResult::Revert => Self::Revert,
            InstructionResult::OutOfGas
            | InstructionResult::MemoryOOG
            | InstructionResult::MemoryLimitOOG
            | InstructionResult::PrecompileOOG
            | InstructionResult::InvalidOperandOOG => Self::OutOfGas,
            InstructionResult::InvalidFEOpcode => Self::InvalidInstruction,
            InstructionResult::OpcodeNotFound | InstructionResult::NotActivated => {
                Self::UndefinedInstruction
            }
            InstructionResult::StackOverflow => Self::StackOverflow,
            InstructionResult::StackUnderflow => Self::StackUnderflow,
            InstructionResult::InvalidJump => Self::BadJumpDestination,
            InstructionResult::OutOfOffset => Self::InvalidMemoryAccess,
            InstructionResult::CallTooDeep => Self::CallDepthExceeded,
            InstructionResult::StateChangeDuringStaticCall
            | InstructionResult::CallNotAllowedInsideStatic => Self::StaticModeViolation,
            InstructionResult::PrecompileError => Self::PrecompileFailure,
            InstructionResult::CreateCollision
            | InstructionResult::CreateContractSizeLimit
            | InstructionResult::CreateContractStartingWithEF
            | InstructionResult::CreateInitCodeSizeLimit => Self::ContractValidationFailure,
            InstructionResult::OutOfFunds => Self::InsufficientBalance,
            InstructionResult::FatalExternalError => Self::InternalError,
            _ => Self::Failure,
        }
    }
}

impl From<&HaltReason> for StatusCode {
    fn from(reason: &HaltReason) -> Self {
        match reason {
            HaltReason::OutOfGas(_) => Self::OutOfGas,
            HaltReason::InvalidFEOpcode => Self::InvalidInstruction,
            HaltReason::OpcodeNotFound | HaltReason::NotActivated => Self::UndefinedInstruction,
            HaltReason::StackOverflow => Self::StackOverflow,
            HaltReason::StackUnderflow => Self::StackUnderflow,
            HaltReason::InvalidJump => Self::BadJumpDestination,
            HaltReason::OutOfOffset => Self::InvalidMemoryAccess,
            HaltReason::CallTooDeep => Self::CallDepthExceeded,
            HaltReason::StateChangeDuringStaticCall | HaltReason::CallNotAllowedInsideStatic => {
                Self::StaticModeViolation
            }
            HaltReason::PrecompileError => Self::PrecompileFailure,
            HaltReason::CreateCollision
            | HaltReason::CreateContractSizeLimit
            | HaltReason::CreateContractStartingWithEF
            | HaltReason::CreateInitCodeSizeLimit => Self::ContractValidationFailure,
            HaltReason::OutOfFunds => Self::InsufficientBalance,
            _ => Self::Failure,
        }
    }
}

const REASON_OFFSET: usize = 4 + 32;
const REASON_DATA_OFFSET: usize = REASON_OFFSET + 32;

/// Decodes the reason string from `Error(string)` encoded return data.
///
/// The layout is selector(4) ‖ offset(32) ‖ length(32) ‖ payload. Data too
/// short to hold the announced payload yields `None`.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let length = data.get(REASON_OFFSET..REASON_DATA_OFFSET)?;
    let length = usize::try_from(U256::try_from_be_slice(length)?).ok()?;
    let end = REASON_DATA_OFFSET.checked_add(length)?;
    let reason = data.get(REASON_DATA_OFFSET..end)?;

    Some(String::from_utf8_lossy(reason).into_owned())
}

/// Returns the message describing a status code. With `full`, a reason
/// decoded from the return data is appended.
pub fn get_error_message(status: StatusCode, data: &[u8], full: bool) -> String {
    let message = status.message();
    match decode_revert_reason(data) {
        Some(reason) if full => format!("{message}: {reason}"),
        _ => message.to_owned(),
    }
}
