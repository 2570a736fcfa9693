//! Parameters and results of the `trace` namespace.

use retrace_block::BlockNumberOrHash;
use retrace_primitives::{Address, B256, Bytes};
use retrace_tracing::{StateDiff, Trace};
use retrace_transaction::Call;

/// Kinds of traces requested for a transaction.
///
/// Deserialized from a list such as `["trace", "stateDiff"]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraceConfig {
    /// Record the call tree
    pub trace: bool,
    /// Record state changes
    pub state_diff: bool,
    /// Record a VM trace; accepted but always reported as `null`
    pub vm_trace: bool,
}

impl TraceConfig {
    /// Configuration recording only the call tree.
    pub const fn trace_only() -> Self {
        Self {
            trace: true,
            state_diff: false,
            vm_trace: false,
        }
    }
}

impl TraceConfig {
    fn from_kinds<'kind>(kinds: impl IntoIterator<Item = &'kind str>) -> Self {
        let mut config = Self::default();
        for kind in kinds {
            match kind {
                "trace" => config.trace = true,
                "stateDiff" => config.state_diff = true,
                "vmTrace" => config.vm_trace = true,
                other => log::debug!("ignoring unknown trace type `{other}`"),
            }
        }
        config
    }
}

impl<'de> serde::Deserialize<'de> for TraceConfig {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kinds = Vec::<String>::deserialize(deserializer)?;
        Ok(Self::from_kinds(kinds.iter().map(String::as_str)))
    }
}

/// Trace type marking a `trace_callMany` call as isolated.
pub const ISOLATED_TRACE_TYPE: &str = "isolated";

/// A call of `trace_callMany`, deserialized from `[call, traceTypes]`.
///
/// Listing [`ISOLATED_TRACE_TYPE`] among the trace types isolates the call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraceCall {
    /// The call
    pub call: Call,
    /// Requested traces
    pub config: TraceConfig,
    /// Keep the call's state changes away from subsequent calls
    pub isolated: bool,
}

impl<'de> serde::Deserialize<'de> for TraceCall {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (call, kinds) = <(Call, Vec<String>)>::deserialize(deserializer)?;

        let isolated = kinds.iter().any(|kind| kind == ISOLATED_TRACE_TYPE);
        let config = TraceConfig::from_kinds(
            kinds
                .iter()
                .map(String::as_str)
                .filter(|kind| *kind != ISOLATED_TRACE_TYPE),
        );
        Ok(Self {
            call,
            config,
            isolated,
        })
    }
}

/// Traces of one transaction or call.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceCallTraces {
    /// Return or revert data
    pub output: Bytes,
    /// State changes, if requested
    pub state_diff: Option<StateDiff>,
    /// Call tree, empty unless requested
    pub trace: Vec<Trace>,
    /// Always `null`
    pub vm_trace: Option<()>,
}

/// Traces of a single call, or the reason it was rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraceCallResult {
    /// Traces of the call
    pub traces: TraceCallTraces,
    /// Set when the call failed its pre-check
    pub pre_check_error: Option<String>,
}

/// Traces of a sequence of calls, or the reason one was rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraceManyCallResult {
    /// Traces of every call, in order
    pub traces: Vec<TraceCallTraces>,
    /// Set when one of the calls failed its pre-check
    pub pre_check_error: Option<String>,
}

/// Traces of a transaction replayed as part of its block.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceCallResultWithHash {
    /// Traces of the transaction
    #[serde(flatten)]
    pub traces: TraceCallTraces,
    /// Hash of the transaction
    pub transaction_hash: B256,
    /// Set when the transaction failed its pre-check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_check_error: Option<String>,
}

/// A trace positioned within the chain.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedTrace {
    /// The trace
    #[serde(flatten)]
    pub trace: Trace,
    /// Hash of the containing block
    pub block_hash: B256,
    /// Number of the containing block
    pub block_number: u64,
    /// Hash of the traced transaction
    pub transaction_hash: B256,
    /// Index of the traced transaction within its block
    pub transaction_position: usize,
}

/// How the address filters of a [`TraceFilter`] combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// A trace matches either address list
    #[default]
    Union,
    /// A trace matches both address lists
    Intersection,
}

/// Parameters of `trace_filter`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceFilter {
    /// First block to trace; the genesis block if absent
    #[serde(default)]
    pub from_block: Option<BlockNumberOrHash>,
    /// Last block to trace; the latest block if absent
    #[serde(default)]
    pub to_block: Option<BlockNumberOrHash>,
    /// Senders to match
    #[serde(default)]
    pub from_address: Vec<Address>,
    /// Recipients to match
    #[serde(default)]
    pub to_address: Vec<Address>,
    /// How the address lists combine
    #[serde(default)]
    pub mode: FilterMode,
    /// Number of matching traces to skip
    #[serde(default)]
    pub after: Option<u64>,
    /// Maximum number of traces to return
    #[serde(default)]
    pub count: Option<u64>,
}

impl TraceFilter {
    /// Whether `trace` matches the address lists.
    pub fn matches(&self, trace: &Trace) -> bool {
        let from_matches = self.from_address.contains(&trace.action.from());
        let to_matches = trace
            .to()
            .is_some_and(|to| self.to_address.contains(&to));

        match self.mode {
            FilterMode::Union => {
                (self.from_address.is_empty() && self.to_address.is_empty())
                    || from_matches
                    || to_matches
            }
            FilterMode::Intersection => {
                (self.from_address.is_empty() || from_matches)
                    && (self.to_address.is_empty() || to_matches)
            }
        }
    }
}

impl std::fmt::Display for TraceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fromBlock: {:?} toBlock: {:?} #fromAddress: {} #toAddress: {} mode: {:?} after: {:?} count: {:?}",
            self.from_block,
            self.to_block,
            self.from_address.len(),
            self.to_address.len(),
            self.mode,
            self.after,
            self.count
        )
    }
}

#[cfg(test)]
mod tests {
    use retrace_primitives::{U256, address};
    use retrace_tracing::{
        Action, TraceType,
        trace::{CallAction, CallType, SuicideAction},
    };
    use serde_json::json;

    use super::*;

    const ALICE: Address = address!("0x00000000000000000000000000000000000000a1");
    const BOB: Address = address!("0x00000000000000000000000000000000000000b0");

    fn call_trace(from: Address, to: Address) -> Trace {
        Trace {
            action: Action::Call(CallAction {
                from,
                call_type: CallType::Call,
                gas: 0,
                input: Bytes::new(),
                to,
                value: U256::ZERO,
            }),
            error: None,
            result: None,
            subtraces: 0,
            trace_address: Vec::new(),
            trace_type: TraceType::Call,
        }
    }

    #[test]
    fn deserialize_trace_config() -> anyhow::Result<()> {
        let config: TraceConfig = serde_json::from_value(json!(["trace", "vmTrace"]))?;
        assert_eq!(
            config,
            TraceConfig {
                trace: true,
                state_diff: false,
                vm_trace: true,
            }
        );

        let config: TraceConfig = serde_json::from_value(json!([]))?;
        assert_eq!(config, TraceConfig::default());
        Ok(())
    }

    #[test]
    fn deserialize_trace_call() -> anyhow::Result<()> {
        let call: TraceCall = serde_json::from_value(json!([
            {"from": ALICE, "to": BOB, "value": "0x1"},
            ["stateDiff"]
        ]))?;

        assert_eq!(call.call.to, Some(BOB));
        assert_eq!(call.call.value, Some(U256::from(1)));
        assert!(call.config.state_diff);
        assert!(!call.isolated);

        let call: TraceCall = serde_json::from_value(json!([
            {"from": ALICE, "to": BOB},
            ["trace", "isolated"]
        ]))?;
        assert!(call.isolated);
        assert_eq!(call.config, TraceConfig::trace_only());
        Ok(())
    }

    #[test]
    fn deserialize_trace_filter() -> anyhow::Result<()> {
        let filter: TraceFilter = serde_json::from_value(json!({
            "fromBlock": "0x1",
            "toBlock": "latest",
            "toAddress": [BOB],
            "mode": "intersection",
            "count": 10
        }))?;

        assert_eq!(filter.from_block, Some(BlockNumberOrHash::Number(1)));
        assert_eq!(filter.to_block, Some(BlockNumberOrHash::latest()));
        assert_eq!(filter.to_address, vec![BOB]);
        assert_eq!(filter.mode, FilterMode::Intersection);
        assert_eq!(filter.after, None);
        assert_eq!(filter.count, Some(10));
        Ok(())
    }

    #[test]
    fn filter_modes() {
        let union = TraceFilter {
            from_address: vec![ALICE],
            to_address: vec![ALICE],
            ..TraceFilter::default()
        };
        assert!(union.matches(&call_trace(ALICE, BOB)));
        assert!(union.matches(&call_trace(BOB, ALICE)));
        assert!(!union.matches(&call_trace(BOB, BOB)));

        let intersection = TraceFilter {
            from_address: vec![ALICE],
            to_address: vec![BOB],
            mode: FilterMode::Intersection,
            ..TraceFilter::default()
        };
        assert!(intersection.matches(&call_trace(ALICE, BOB)));
        assert!(!intersection.matches(&call_trace(ALICE, ALICE)));

        assert!(TraceFilter::default().matches(&call_trace(BOB, BOB)));
    }

    #[test]
    fn suicide_matches_refund_address() {
        let trace = Trace {
            action: Action::Suicide(SuicideAction {
                address: ALICE,
                refund_address: BOB,
                balance: U256::ZERO,
            }),
            error: None,
            result: None,
            subtraces: 0,
            trace_address: vec![0],
            trace_type: TraceType::Suicide,
        };

        let filter = TraceFilter {
            to_address: vec![BOB],
            ..TraceFilter::default()
        };
        assert!(filter.matches(&trace));
    }

    #[test]
    fn serialize_call_traces() -> anyhow::Result<()> {
        let traces = TraceCallTraces::default();
        assert_eq!(
            serde_json::to_value(&traces)?,
            json!({"output": "0x", "stateDiff": null, "trace": [], "vmTrace": null})
        );
        Ok(())
    }
}
