use std::sync::Arc;

use parking_lot::Mutex;
use retrace_chain_config::ChainConfig;
use retrace_evm::{EvmExecutor, SharedTracer};
use retrace_kv::Database as _;
use retrace_primitives::{Address, B256, U256, address, hex};
use retrace_state_api::account::StoredAccount;
use retrace_state_remote::{CachedRemoteState, RemoteState, StateReader};
use retrace_test_utils::{MemoryChain, fixtures::DEV_CHAIN_CONFIG};
use retrace_tracing::{AccessListTracer, compare};
use retrace_transaction::{AccessList, AccessListItem, Call};
use tokio::runtime;

const SENDER: Address = address!("0x0715a7794a1dc8e42615f059dd6e406a6594651a");
const TARGET: Address = address!("0x00000000000000000000000000000000000000bb");
const PROBED: Address = address!("0x00000000000000000000000000000000000000e1");
const CALLEE: Address = address!("0x00000000000000000000000000000000000000e2");
const IDENTITY: Address = address!("0x0000000000000000000000000000000000000004");

/// Touches storage slot 5 and the accounts around it.
const ACCESSOR: &str = concat!(
    // SLOAD slot 5, then SSTORE 1 into it
    "60055450",
    "6001600555",
    // BALANCE of 0x..e1
    "60e13150",
    // EXTCODESIZE of the sender and BALANCE of itself
    "730715a7794a1dc8e42615f059dd6e406a6594651a3b50",
    "303150",
    // STATICCALL 0x..e2 and the identity precompile
    "600060006000600060e25afa50",
    "60006000600060006004",
    "5afa50",
    "00",
);

async fn traced_access_list(code: &str) -> anyhow::Result<AccessList> {
    let mut chain = MemoryChain::new(DEV_CHAIN_CONFIG);
    chain.change_account(
        0,
        SENDER,
        Some(StoredAccount {
            balance: U256::from(1_000_000_000u64),
            ..StoredAccount::default()
        }),
    );
    let code_hash = chain.insert_code(&hex::decode(code)?);
    chain.change_account(
        0,
        TARGET,
        Some(StoredAccount {
            nonce: 1,
            incarnation: 1,
            code_hash,
            ..StoredAccount::default()
        }),
    );

    let chain_config = ChainConfig::from_genesis_json(None, DEV_CHAIN_CONFIG.as_bytes())?;
    let state = CachedRemoteState::new(RemoteState::new(
        runtime::Handle::current(),
        StateReader::new(chain.database().begin().await?, 1),
    ));
    let mut executor = EvmExecutor::new(Arc::new(chain_config), Arc::new(state));

    let transaction = Call {
        from: Some(SENDER),
        to: Some(TARGET),
        gas: Some(100_000),
        gas_price: Some(10),
        ..Call::default()
    }
    .to_transaction();

    let tracer = Arc::new(Mutex::new(AccessListTracer::new(SENDER, Some(TARGET))));
    let tracers: Vec<SharedTracer> = vec![tracer.clone()];
    let result = executor
        .call(&chain.next_header(), &transaction, &tracers, true, false)
        .await?;
    assert!(result.is_success(), "{result:?}");

    let access_list = tracer.lock().access_list().clone();
    Ok(access_list)
}

#[tokio::test(flavor = "multi_thread")]
async fn access_list_of_executed_call() -> anyhow::Result<()> {
    let access_list = traced_access_list(ACCESSOR).await?;

    let item = |address, storage_keys| AccessListItem {
        address,
        storage_keys,
    };
    assert_eq!(
        access_list.0,
        vec![
            item(TARGET, vec![B256::from(U256::from(5))]),
            item(PROBED, Vec::new()),
            item(CALLEE, Vec::new()),
            item(IDENTITY, Vec::new()),
        ]
    );
    assert!(!access_list.0.iter().any(|item| item.address == SENDER));

    let reordered = AccessList(access_list.0.iter().rev().cloned().collect());
    assert!(compare(&access_list, &reordered));
    Ok(())
}
