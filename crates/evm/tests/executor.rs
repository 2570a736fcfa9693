use std::sync::Arc;

use parking_lot::Mutex;
use retrace_block::Header;
use retrace_chain_config::ChainConfig;
use retrace_evm::{
    EvmExecutor, ExecutionResult, ExecutorError, Message, MessageResult, PreCheckError, SharedTracer,
    StatusCode, Step, Tracer,
};
use retrace_kv::Database as _;
use retrace_primitives::{Address, B256, Bytes, SpecId, U256, address, b256, hex};
use retrace_state_api::{EvmState, StateError, account::StoredAccount};
use retrace_state_remote::{CachedRemoteState, RemoteState, StateReader};
use retrace_test_utils::{MemoryChain, fixtures::DEV_CHAIN_CONFIG};
use retrace_transaction::{Call, Transaction};
use revm_database_interface::DatabaseRef;
use tokio::runtime;

const SENDER: Address = address!("0x0715a7794a1dc8e42615f059dd6e406a6594651a");
const RECIPIENT: Address = address!("0x00000000000000000000000000000000000000bb");
const REVERTER: Address = address!("0x00000000000000000000000000000000000000cc");
const CLEARER: Address = address!("0x00000000000000000000000000000000000000dd");
const SLOT: B256 = b256!("0x0000000000000000000000000000000000000000000000000000000000000001");

const BALANCE: u64 = 10_000_000;
const GAS_PRICE: u128 = 10;

/// Copies an `Error(string)` payload from the end of the code and reverts
/// with it.
const REVERT_WITH_REASON: &str = concat!(
    "6064600c600039",
    "60646000fd",
    "08c379a0",
    "0000000000000000000000000000000000000000000000000000000000000020",
    "0000000000000000000000000000000000000000000000000000000000000020",
    "4f776e61626c653a2063616c6c6572206973206e6f7420746865206f776e6572",
);

/// Clears storage slot 1.
const CLEAR_SLOT: &str = "600060015500";

fn contract(chain: &mut MemoryChain, address: Address, code: &str) -> anyhow::Result<()> {
    let code_hash = chain.insert_code(&hex::decode(code)?);
    chain.change_account(
        0,
        address,
        Some(StoredAccount {
            nonce: 1,
            incarnation: 1,
            code_hash,
            ..StoredAccount::default()
        }),
    );
    Ok(())
}

fn test_chain() -> anyhow::Result<MemoryChain> {
    let mut chain = MemoryChain::new(DEV_CHAIN_CONFIG);
    chain.change_account(
        0,
        SENDER,
        Some(StoredAccount {
            balance: U256::from(BALANCE),
            ..StoredAccount::default()
        }),
    );
    contract(&mut chain, REVERTER, REVERT_WITH_REASON)?;
    contract(&mut chain, CLEARER, CLEAR_SLOT)?;
    chain.change_storage(0, CLEARER, 1, SLOT, U256::from(1));
    Ok(chain)
}

async fn executor(
    chain: &MemoryChain,
) -> anyhow::Result<(EvmExecutor<Arc<CachedRemoteState>>, Header)> {
    let chain_config = ChainConfig::from_genesis_json(None, DEV_CHAIN_CONFIG.as_bytes())?;
    let transaction = chain.database().begin().await?;
    let state = CachedRemoteState::new(RemoteState::new(
        runtime::Handle::current(),
        StateReader::new(transaction, 1),
    ));

    let executor = EvmExecutor::new(Arc::new(chain_config), Arc::new(state));
    Ok((executor, chain.next_header()))
}

fn call(to: Address, value: u64) -> Transaction {
    Call {
        from: Some(SENDER),
        to: Some(to),
        gas: Some(100_000),
        gas_price: Some(GAS_PRICE),
        value: Some(U256::from(value)),
        ..Call::default()
    }
    .to_transaction()
}

#[derive(Debug, Default)]
struct Recorder {
    events: Vec<String>,
}

impl Tracer for Recorder {
    fn on_execution_start(&mut self, _revision: SpecId, message: &Message) {
        self.events
            .push(format!("start {} {:?} {}", message.depth, message.kind, message.recipient));
    }

    fn on_instruction_start(&mut self, step: &Step<'_>) {
        if step.pc == 0 {
            self.events.push(format!("step {}", step.depth));
        }
    }

    fn on_execution_end(&mut self, result: &MessageResult) {
        self.events.push(format!("end {:?}", result.status));
    }

    fn on_transaction_end(
        &mut self,
        post_state: &EvmState,
        pre_state: &dyn DatabaseRef<Error = StateError>,
    ) -> Result<(), StateError> {
        let before = pre_state
            .basic_ref(SENDER)
            .ok()
            .flatten()
            .map(|account| account.balance);
        let after = post_state.get(&SENDER).map(|account| account.info.balance);
        self.events.push(format!("transaction end {before:?} {after:?}"));
        Ok(())
    }
}

struct FailingTracer;

impl Tracer for FailingTracer {
    fn on_transaction_end(
        &mut self,
        _post_state: &EvmState,
        _pre_state: &dyn DatabaseRef<Error = StateError>,
    ) -> Result<(), StateError> {
        Err(StateError::Other("pre-state unavailable".to_owned()))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn transfer_succeeds() -> anyhow::Result<()> {
    let chain = test_chain()?;
    let (mut executor, header) = executor(&chain).await?;

    let result = executor
        .call(&header, &call(RECIPIENT, 1_000), &[], true, false)
        .await?;

    assert_eq!(
        result,
        ExecutionResult::Success {
            gas_used: 21_000,
            output: Bytes::new(),
            logs: Vec::new(),
            created_address: None,
        }
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn committed_changes_are_visible_to_later_calls() -> anyhow::Result<()> {
    let chain = test_chain()?;
    let (mut executor, header) = executor(&chain).await?;
    let transfer = call(RECIPIENT, 5_000_000);

    assert!(executor.call(&header, &transfer, &[], true, false).await?.is_success());
    // Uncommitted changes are discarded by the next call
    assert!(executor.call(&header, &transfer, &[], true, false).await?.is_success());
    executor.commit();

    let result = executor.call(&header, &transfer, &[], true, false).await?;
    assert!(matches!(
        result,
        ExecutionResult::PreCheckFailed(PreCheckError::InsufficientFunds { .. })
    ));

    executor.reset();
    assert!(executor.call(&header, &transfer, &[], true, false).await?.is_success());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn insufficient_funds_fail_pre_check() -> anyhow::Result<()> {
    let chain = test_chain()?;
    let (mut executor, header) = executor(&chain).await?;

    let result = executor
        .call(&header, &call(RECIPIENT, BALANCE), &[], true, false)
        .await?;

    let ExecutionResult::PreCheckFailed(error) = result else {
        panic!("expected a pre-check failure, got {result:?}");
    };
    assert_eq!(error.code(), 1000);
    assert_eq!(
        error.to_string(),
        "insufficient funds for gas * price + value: address 0x0715a7794a1dc8e42615f059dd6e406a6594651a have 10000000 want 11000000"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn gas_bailout_skips_balance_check() -> anyhow::Result<()> {
    let chain = test_chain()?;
    let (mut executor, header) = executor(&chain).await?;

    let transaction = Call {
        from: Some(SENDER),
        to: Some(RECIPIENT),
        gas_price: Some(1_000),
        ..Call::default()
    }
    .to_transaction();

    let result = executor.call(&header, &transaction, &[], true, true).await?;
    assert!(result.is_success(), "{result:?}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn revert_reports_reason() -> anyhow::Result<()> {
    let chain = test_chain()?;
    let (mut executor, header) = executor(&chain).await?;

    let result = executor
        .call(&header, &call(REVERTER, 0), &[], true, false)
        .await?;

    let ExecutionResult::Failed {
        status,
        output,
        message,
        ..
    } = result
    else {
        panic!("expected a failure, got {result:?}");
    };
    assert_eq!(status, StatusCode::Revert);
    assert_eq!(output.len(), 100);
    assert_eq!(message, "execution reverted: Ownable: caller is not the owner");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn tracers_observe_nested_events() -> anyhow::Result<()> {
    let chain = test_chain()?;
    let (mut executor, header) = executor(&chain).await?;

    let first = Arc::new(Mutex::new(Recorder::default()));
    let second = Arc::new(Mutex::new(Recorder::default()));
    let tracers: Vec<SharedTracer> = vec![first.clone(), second.clone()];

    executor
        .call(&header, &call(REVERTER, 0), &tracers, true, false)
        .await?;

    let events = first.lock().events.clone();
    assert_eq!(
        events.get(..3),
        Some(
            &[
                format!("start 0 Call {REVERTER}"),
                "step 0".to_owned(),
                "end Revert".to_owned(),
            ][..]
        )
    );
    assert!(
        events
            .get(3)
            .is_some_and(|event| event.starts_with("transaction end Some(10000000) Some(")),
        "{events:?}"
    );
    assert_eq!(events.len(), 4);
    assert_eq!(events, second.lock().events);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn gas_excludes_refund_when_requested() -> anyhow::Result<()> {
    let chain = test_chain()?;
    let (mut executor, header) = executor(&chain).await?;
    let transaction = call(CLEARER, 0);

    let with_refund = executor.call(&header, &transaction, &[], true, false).await?;
    let without_refund = executor.call(&header, &transaction, &[], false, false).await?;

    assert!(with_refund.is_success());
    assert_eq!(without_refund.gas_used() - with_refund.gas_used(), 4_800);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_tracer_aborts_execution() -> anyhow::Result<()> {
    let chain = test_chain()?;
    let (mut executor, header) = executor(&chain).await?;
    let tracers: Vec<SharedTracer> = vec![Arc::new(Mutex::new(FailingTracer))];

    let result = executor
        .call(&header, &call(RECIPIENT, 1_000), &tracers, true, false)
        .await;
    assert!(
        matches!(
            &result,
            Err(ExecutorError::State(StateError::Other(message))) if message == "pre-state unavailable"
        ),
        "{result:?}"
    );

    // The executor stays usable and nothing was kept for commit
    executor.commit();
    let result = executor.call(&header, &call(RECIPIENT, 1_000), &[], true, false).await?;
    assert!(result.is_success());
    Ok(())
}
