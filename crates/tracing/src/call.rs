use retrace_evm::{
    Message, MessageKind, MessageResult, StatusCode, Tracer, get_error_message,
};
use retrace_primitives::{Address, SpecId, U256};

use crate::trace::{
    Action, CallAction, CallOutput, CallType, CreateAction, CreateOutput, SuicideAction, Trace,
    TraceOutput,
};

/// Records the call tree of a transaction as flattened [`Trace`]s, in the
/// order the frames started.
#[derive(Debug, Default)]
pub struct CallTracer {
    traces: Vec<Trace>,
    open: Vec<usize>,
}

impl CallTracer {
    /// The traces recorded so far.
    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Takes the recorded traces, leaving the tracer empty.
    pub fn take_traces(&mut self) -> Vec<Trace> {
        self.open.clear();
        std::mem::take(&mut self.traces)
    }

    fn push(&mut self, action: Action) -> usize {
        let trace_address = match self.open.last().and_then(|&parent| self.traces.get_mut(parent)) {
            Some(parent) => {
                let mut trace_address = parent.trace_address.clone();
                trace_address.push(parent.subtraces);
                parent.subtraces += 1;
                trace_address
            }
            None => Vec::new(),
        };

        self.traces.push(Trace {
            trace_type: action.trace_type(),
            action,
            error: None,
            result: None,
            subtraces: 0,
            trace_address,
        });
        self.traces.len() - 1
    }
}

impl Tracer for CallTracer {
    fn on_execution_start(&mut self, _revision: SpecId, message: &Message) {
        let call_type = match message.kind {
            MessageKind::Create | MessageKind::Create2 => {
                let index = self.push(Action::Create(CreateAction {
                    from: message.caller,
                    gas: message.gas,
                    init: message.input.clone(),
                    value: message.value,
                }));
                self.open.push(index);
                return;
            }
            MessageKind::Call => CallType::Call,
            MessageKind::CallCode => CallType::CallCode,
            MessageKind::DelegateCall => CallType::DelegateCall,
            MessageKind::StaticCall => CallType::StaticCall,
        };

        let index = self.push(Action::Call(CallAction {
            from: message.caller,
            call_type,
            gas: message.gas,
            input: message.input.clone(),
            to: message.recipient,
            value: message.value,
        }));
        self.open.push(index);
    }

    fn on_execution_end(&mut self, result: &MessageResult) {
        let Some(trace) = self
            .open
            .pop()
            .and_then(|index| self.traces.get_mut(index))
        else {
            log::warn!("call tracer received an unmatched frame end");
            return;
        };

        if result.status.is_success() {
            trace.result = Some(match &trace.action {
                Action::Create(_) => TraceOutput::Create(CreateOutput {
                    address: result.created_address.unwrap_or_default(),
                    code: result.output.clone(),
                    gas_used: result.gas_used,
                }),
                Action::Call(_) | Action::Suicide(_) => TraceOutput::Call(CallOutput {
                    gas_used: result.gas_used,
                    output: result.output.clone(),
                }),
            });
        } else if result.status == StatusCode::Revert {
            trace.error = Some("Reverted".to_owned());
        } else {
            trace.error = Some(get_error_message(result.status, &[], false));
        }
    }

    fn on_self_destruct(&mut self, address: Address, beneficiary: Address, value: U256) {
        self.push(Action::Suicide(SuicideAction {
            address,
            refund_address: beneficiary,
            balance: value,
        }));
    }

    fn reset(&mut self) {
        self.traces.clear();
        self.open.clear();
    }
}

#[cfg(test)]
mod tests {
    use retrace_primitives::{Bytes, address, bytes};

    use super::*;
    use crate::trace::TraceType;

    const SENDER: Address = address!("0x0715a7794a1dc8e42615f059dd6e406a6594651a");
    const CONTRACT: Address = address!("0x5e1f0c9ddbe3cb57b80c933fab5151627d7966fa");
    const CREATED: Address = address!("0x52728289eba496b6080d57d0250a90663a07e556");

    fn message(kind: MessageKind, depth: usize, caller: Address, recipient: Address) -> Message {
        Message {
            kind,
            depth,
            caller,
            recipient,
            code_address: recipient,
            value: U256::ZERO,
            input: Bytes::new(),
            gas: 1_000,
        }
    }

    fn result(status: StatusCode, created_address: Option<Address>) -> MessageResult {
        MessageResult {
            status,
            gas_used: 100,
            output: bytes!("0x6000"),
            created_address,
        }
    }

    #[test]
    fn nested_frames_get_trace_addresses() {
        let mut tracer = CallTracer::default();

        tracer.on_execution_start(SpecId::LONDON, &message(MessageKind::Call, 0, SENDER, CONTRACT));
        tracer.on_execution_start(
            SpecId::LONDON,
            &message(MessageKind::StaticCall, 1, CONTRACT, SENDER),
        );
        tracer.on_execution_end(&result(StatusCode::Success, None));
        tracer.on_execution_start(
            SpecId::LONDON,
            &message(MessageKind::Create2, 1, CONTRACT, Address::ZERO),
        );
        tracer.on_execution_start(
            SpecId::LONDON,
            &message(MessageKind::DelegateCall, 2, CREATED, CONTRACT),
        );
        tracer.on_execution_end(&result(StatusCode::OutOfGas, None));
        tracer.on_execution_end(&result(StatusCode::Success, Some(CREATED)));
        tracer.on_self_destruct(CONTRACT, SENDER, U256::from(5));
        tracer.on_execution_end(&result(StatusCode::Revert, None));

        let traces = tracer.take_traces();
        let shape: Vec<_> = traces
            .iter()
            .map(|trace| (trace.trace_type, trace.trace_address.clone(), trace.subtraces))
            .collect();
        assert_eq!(
            shape,
            vec![
                (TraceType::Call, vec![], 3),
                (TraceType::Call, vec![0], 0),
                (TraceType::Create, vec![1], 1),
                (TraceType::Call, vec![1, 0], 0),
                (TraceType::Suicide, vec![2], 0),
            ]
        );

        let errors: Vec<_> = traces.iter().map(|trace| trace.error.as_deref()).collect();
        assert_eq!(errors, vec![Some("Reverted"), None, None, Some("out of gas"), None]);

        assert_eq!(traces.get(2).and_then(Trace::to), Some(CREATED));
        assert_eq!(traces.get(4).and_then(Trace::to), Some(SENDER));
        assert!(traces.first().is_some_and(|trace| trace.result.is_none()));
        assert!(tracer.traces().is_empty());
    }

    #[test]
    fn reset_discards_frames() {
        let mut tracer = CallTracer::default();
        tracer.on_execution_start(SpecId::LONDON, &message(MessageKind::Call, 0, SENDER, CONTRACT));
        tracer.reset();

        tracer.on_execution_start(SpecId::LONDON, &message(MessageKind::Call, 0, SENDER, CONTRACT));
        tracer.on_execution_end(&result(StatusCode::Success, None));

        assert_eq!(tracer.traces().len(), 1);
        assert!(tracer.traces().first().is_some_and(|trace| trace.trace_address.is_empty()));
    }
}
