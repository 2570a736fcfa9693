use retrace_kv::Database as _;
use retrace_primitives::{Address, B256, Bytecode, KECCAK_EMPTY, U256, address, b256};
use retrace_state_api::{State as _, StateError, account::StoredAccount};
use retrace_state_remote::{CachedRemoteState, RemoteState, StateReader};
use retrace_test_utils::{MemoryChain, fixtures::DEV_CHAIN_CONFIG};
use revm_database_interface::DatabaseRef as _;
use tokio::runtime;

const ACCOUNT: Address = address!("0x00000000000000000000000000000000000000aa");
const LOCATION: B256 = b256!("0x0000000000000000000000000000000000000000000000000000000000000001");

fn balance(value: u64) -> StoredAccount {
    StoredAccount {
        nonce: 1,
        balance: U256::from(value),
        incarnation: 1,
        ..StoredAccount::default()
    }
}

/// Account and slot change in every block: block `n` sets the balance to
/// `100 * (n + 1)` and the slot to `n + 1`.
fn chain_with_history() -> MemoryChain {
    let mut chain = MemoryChain::new(DEV_CHAIN_CONFIG);
    chain.change_account(0, ACCOUNT, Some(balance(100)));
    chain.change_storage(0, ACCOUNT, 1, LOCATION, U256::from(1));

    for number in 1..=2 {
        chain.insert_block(chain.next_header(), Vec::new());
        chain.change_account(number, ACCOUNT, Some(balance(100 * (number + 1))));
        chain.change_storage(number, ACCOUNT, 1, LOCATION, U256::from(number + 1));
    }

    chain
}

async fn reader(chain: &MemoryChain, block_number: u64) -> anyhow::Result<StateReader> {
    let transaction = chain.database().begin().await?;
    Ok(StateReader::new(transaction, block_number))
}

#[tokio::test(flavor = "multi_thread")]
async fn reads_state_before_block() -> anyhow::Result<()> {
    let chain = chain_with_history();

    for (block_number, expected) in [(1, 100u64), (2, 200), (3, 300)] {
        let reader = reader(&chain, block_number).await?;

        let account = reader.read_account(&ACCOUNT).await?;
        assert_eq!(
            account.map(|account| account.balance),
            Some(U256::from(expected)),
            "balance before block {block_number}"
        );

        let slot = reader.read_storage(&ACCOUNT, 1, &LOCATION).await?;
        assert_eq!(slot, U256::from(block_number), "slot before block {block_number}");
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn account_created_later_is_absent() -> anyhow::Result<()> {
    let mut chain = MemoryChain::new(DEV_CHAIN_CONFIG);
    chain.insert_block(chain.next_header(), Vec::new());
    chain.change_account(1, ACCOUNT, Some(balance(1)));

    assert_eq!(reader(&chain, 1).await?.read_account(&ACCOUNT).await?, None);
    assert_eq!(
        reader(&chain, 2).await?.read_account(&ACCOUNT).await?,
        Some(balance(1))
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_account_is_visible_before_deletion() -> anyhow::Result<()> {
    let mut chain = MemoryChain::new(DEV_CHAIN_CONFIG);
    chain.change_account(0, ACCOUNT, Some(balance(5)));
    chain.insert_block(chain.next_header(), Vec::new());
    chain.change_account(1, ACCOUNT, None);

    assert_eq!(
        reader(&chain, 1).await?.read_account(&ACCOUNT).await?,
        Some(balance(5))
    );
    assert_eq!(reader(&chain, 2).await?.read_account(&ACCOUNT).await?, None);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_change_set_is_an_error() -> anyhow::Result<()> {
    let chain = chain_with_history();
    chain.database().delete(
        retrace_kv::tables::ACCOUNT_CHANGE_SET,
        &retrace_kv::keys::block_key(1),
    );

    let error = reader(&chain, 1)
        .await?
        .read_account(&ACCOUNT)
        .await
        .expect_err("change set was removed");
    assert_eq!(
        error,
        StateError::MissingChangeSet {
            address: ACCOUNT,
            block_number: 1
        }
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn reads_code() -> anyhow::Result<()> {
    let mut chain = MemoryChain::new(DEV_CHAIN_CONFIG);
    let code_hash = chain.insert_code(&[0x60, 0x00, 0x60, 0x00, 0xf3]);

    let reader = reader(&chain, 1).await?;
    assert_eq!(
        &reader.read_code(&code_hash).await?[..],
        &[0x60, 0x00, 0x60, 0x00, 0xf3]
    );
    assert!(reader.read_code(&KECCAK_EMPTY).await?.is_empty());
    assert_eq!(
        reader.read_code(&B256::repeat_byte(1)).await,
        Err(StateError::InvalidCodeHash(B256::repeat_byte(1)))
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_state_blocks_on_worker_and_blocking_threads() -> anyhow::Result<()> {
    let chain = chain_with_history();
    let state = RemoteState::new(runtime::Handle::current(), reader(&chain, 2).await?);

    let info = state.basic(ACCOUNT)?.expect("account exists");
    assert_eq!(info.balance, U256::from(200));
    assert_eq!(state.storage(ACCOUNT, U256::from(1))?, U256::from(2));
    assert_eq!(state.block_hash(1)?, chain.block_hash(1).expect("block 1 exists"));
    assert_eq!(state.block_hash(9), Err(StateError::MissingBlockHash(9)));

    let storage = tokio::task::spawn_blocking(move || state.storage(ACCOUNT, U256::from(1))).await??;
    assert_eq!(storage, U256::from(2));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cached_state_serves_repeated_reads_locally() -> anyhow::Result<()> {
    let mut chain = chain_with_history();
    let code = [0x60, 0x01];
    let code_hash = chain.insert_code(&code);

    let state = CachedRemoteState::new(RemoteState::new(
        runtime::Handle::current(),
        reader(&chain, 3).await?,
    ));

    let first = state.basic_ref(ACCOUNT)?;
    let slot = state.storage_ref(ACCOUNT, U256::from(1))?;
    let bytecode = state.code_by_hash_ref(code_hash)?;
    let hash = state.block_hash_ref(2)?;

    chain.database().disconnect();

    assert_eq!(state.basic_ref(ACCOUNT)?, first);
    assert_eq!(state.storage_ref(ACCOUNT, U256::from(1))?, slot);
    assert_eq!(state.code_by_hash_ref(code_hash)?, bytecode);
    assert_eq!(state.block_hash_ref(2)?, hash);
    assert_eq!(bytecode, Bytecode::new_raw(code.to_vec().into()));

    assert!(matches!(
        state.basic_ref(Address::repeat_byte(7)),
        Err(StateError::Remote(_))
    ));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn storage_of_missing_account_is_zero() -> anyhow::Result<()> {
    let chain = MemoryChain::new(DEV_CHAIN_CONFIG);
    let state = RemoteState::new(runtime::Handle::current(), reader(&chain, 1).await?);

    assert_eq!(state.storage(ACCOUNT, U256::from(1))?, U256::ZERO);
    assert_eq!(state.basic(ACCOUNT)?, None);
    assert_eq!(state.code_by_hash(KECCAK_EMPTY)?, Bytecode::default());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cloned_reader_shares_transaction() -> anyhow::Result<()> {
    let chain = chain_with_history();
    let reader = reader(&chain, 2).await?;
    let clone = reader.clone();

    assert_eq!(clone.block_number(), 2);
    assert_eq!(
        clone.read_account(&ACCOUNT).await?.map(|account| account.balance),
        Some(U256::from(200))
    );
    assert_eq!(
        format!("{reader:?}"),
        "StateReader { block_number: 2, .. }"
    );
    Ok(())
}

#[test]
fn reader_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<StateReader>();
    assert_send_sync::<CachedRemoteState>();
}
