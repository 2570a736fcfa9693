//! Call traces in the format of the `trace` namespace.

use retrace_primitives::{Address, Bytes, U256};

/// Kind of a message call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    /// CALL
    Call,
    /// CALLCODE
    CallCode,
    /// DELEGATECALL
    DelegateCall,
    /// STATICCALL
    StaticCall,
}

/// A message call.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAction {
    /// Caller
    pub from: Address,
    /// Kind of call
    pub call_type: CallType,
    /// Gas available to the callee
    #[serde(with = "alloy_serde::quantity")]
    pub gas: u64,
    /// Call data
    pub input: Bytes,
    /// Callee
    pub to: Address,
    /// Transferred value
    pub value: U256,
}

/// A contract creation.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAction {
    /// Creator
    pub from: Address,
    /// Gas available to the init code
    #[serde(with = "alloy_serde::quantity")]
    pub gas: u64,
    /// Init code
    pub init: Bytes,
    /// Endowment
    pub value: U256,
}

/// A self-destruct.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuicideAction {
    /// Destroyed contract
    pub address: Address,
    /// Beneficiary of the remaining balance
    pub refund_address: Address,
    /// Remaining balance
    pub balance: U256,
}

/// What a trace records.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum Action {
    /// A message call
    Call(CallAction),
    /// A contract creation
    Create(CreateAction),
    /// A self-destruct
    Suicide(SuicideAction),
}

impl Action {
    /// Account that initiated the action.
    pub fn from(&self) -> Address {
        match self {
            Self::Call(action) => action.from,
            Self::Create(action) => action.from,
            Self::Suicide(action) => action.address,
        }
    }

    /// Kind of the action.
    pub fn trace_type(&self) -> TraceType {
        match self {
            Self::Call(_) => TraceType::Call,
            Self::Create(_) => TraceType::Create,
            Self::Suicide(_) => TraceType::Suicide,
        }
    }
}

/// Result of a successful message call.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOutput {
    /// Gas used by the call
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
    /// Return data
    pub output: Bytes,
}

/// Result of a successful contract creation.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutput {
    /// Address of the new contract
    pub address: Address,
    /// Deployed code
    pub code: Bytes,
    /// Gas used by the init code
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
}

/// Result of a successful action.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum TraceOutput {
    /// Result of a message call
    Call(CallOutput),
    /// Result of a contract creation
    Create(CreateOutput),
}

/// Kind of trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceType {
    /// Message call
    Call,
    /// Contract creation
    Create,
    /// Self-destruct
    Suicide,
}

/// A call frame, flattened into its position in the call tree.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    /// What the frame did
    pub action: Action,
    /// Why the frame failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Result of a successful frame
    pub result: Option<TraceOutput>,
    /// Number of direct children
    pub subtraces: usize,
    /// Child indices leading from the root to the frame
    pub trace_address: Vec<usize>,
    /// Kind of the frame
    #[serde(rename = "type")]
    pub trace_type: TraceType,
}

impl Trace {
    /// Account the action was directed at: the callee, the created contract
    /// or the beneficiary of a self-destruct.
    pub fn to(&self) -> Option<Address> {
        match (&self.action, &self.result) {
            (Action::Call(action), _) => Some(action.to),
            (Action::Create(_), Some(TraceOutput::Create(output))) => Some(output.address),
            (Action::Create(_), _) => None,
            (Action::Suicide(action), _) => Some(action.refund_address),
        }
    }
}
